//! Hybrid retrieval over the lexical and vector indexes.

use lectern_core::{
    LecternError, Result,
    config::{FusionWeights, MAX_TOP_K, RetrievalConfig},
    traits::{Embedder, LexicalIndex, VectorIndex},
    types::{Query, RetrievalCandidate, SearchHit},
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::fusion::ScoreFusion;

/// Hits requested from each index by default.
pub const DEFAULT_CANDIDATE_POOL: usize = 10;

/// Lowest scores that still count as a match, applied before fusion.
///
/// A hit must score strictly above its floor. Min-max normalization rescales
/// whatever survives, so without a floor a list of near-zero similarities
/// fuses to full weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreFloors {
    /// Floor for lexical relevance.
    pub lexical: f32,
    /// Floor for cosine similarity.
    pub vector: f32,
}

impl Default for ScoreFloors {
    fn default() -> Self {
        Self {
            lexical: 0.0,
            vector: RetrievalConfig::DEFAULT_MIN_VECTOR_SCORE,
        }
    }
}

/// Result of one hybrid retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutcome {
    /// Fused candidates, best first.
    pub candidates: Vec<RetrievalCandidate>,
    /// Names of indexes that failed and were skipped.
    pub failed_indexes: Vec<String>,
}

impl RetrievalOutcome {
    /// Whether one index failed and the other carried the query.
    pub fn is_degraded(&self) -> bool {
        !self.failed_indexes.is_empty()
    }
}

/// Runs lexical and vector search concurrently and fuses the results.
///
/// If one side fails (including the embedding call that feeds the vector
/// index), retrieval continues with the other. Only when both fail does the
/// query fail, with [`LecternError::SearchUnavailable`].
#[derive(Debug, Clone)]
pub struct HybridRetriever {
    lexical: Arc<dyn LexicalIndex>,
    vector: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    fusion: ScoreFusion,
    floors: ScoreFloors,
    candidate_pool: usize,
    max_query_chars: usize,
}

impl HybridRetriever {
    /// Create a retriever with default fusion weights.
    pub fn new(
        lexical: Arc<dyn LexicalIndex>,
        vector: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let max_query_chars = embedder.max_input_chars().unwrap_or(8000);
        Self {
            lexical,
            vector,
            embedder,
            fusion: ScoreFusion::default(),
            floors: ScoreFloors::default(),
            candidate_pool: DEFAULT_CANDIDATE_POOL,
            max_query_chars,
        }
    }

    /// Set the fusion weights.
    #[must_use]
    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.fusion = ScoreFusion::new(weights);
        self
    }

    /// Set the score floors.
    #[must_use]
    pub fn with_floors(mut self, floors: ScoreFloors) -> Self {
        self.floors = floors;
        self
    }

    /// Set the per-index candidate pool.
    #[must_use]
    pub fn with_candidate_pool(mut self, candidate_pool: usize) -> Self {
        self.candidate_pool = candidate_pool.max(1);
        self
    }

    /// Set the longest question embedded, in characters.
    #[must_use]
    pub fn with_max_query_chars(mut self, max_query_chars: usize) -> Self {
        self.max_query_chars = max_query_chars.max(1);
        self
    }

    /// Apply a retrieval configuration.
    #[must_use]
    pub fn with_config(self, config: &RetrievalConfig) -> Self {
        self.with_weights(config.fusion)
            .with_candidate_pool(config.candidate_pool)
            .with_floors(ScoreFloors {
                lexical: config.min_lexical_score,
                vector: config.min_vector_score,
            })
    }

    /// The fuser in use.
    pub fn fusion(&self) -> &ScoreFusion {
        &self.fusion
    }

    /// Retrieve up to `top_k` (clamped to `1..=20`) fused candidates.
    #[instrument(skip(self, query), fields(owner = %query.owner_id))]
    pub async fn retrieve(&self, query: &Query, top_k: usize) -> Result<RetrievalOutcome> {
        let top_k = top_k.clamp(1, MAX_TOP_K);
        let pool = self.candidate_pool.max(top_k);

        let (lexical, vector) = tokio::join!(
            self.lexical.lexical_search(query, pool),
            self.vector_search(query, pool)
        );

        let mut failed_indexes = Vec::new();
        let (lexical, vector) = match (lexical, vector) {
            (Err(lexical_err), Err(vector_err)) => {
                warn!(%lexical_err, %vector_err, "Both search indexes failed");
                return Err(LecternError::search_unavailable(format!(
                    "{}: {lexical_err}; {}: {vector_err}",
                    self.lexical.name(),
                    self.vector.name()
                )));
            }
            (Ok(lexical), Ok(vector)) => (lexical, vector),
            (Ok(lexical), Err(err)) => {
                warn!(index = self.vector.name(), error = %err, "Vector search failed, using lexical results only");
                failed_indexes.push(self.vector.name().to_string());
                (lexical, Vec::new())
            }
            (Err(err), Ok(vector)) => {
                warn!(index = self.lexical.name(), error = %err, "Lexical search failed, using vector results only");
                failed_indexes.push(self.lexical.name().to_string());
                (Vec::new(), vector)
            }
        };

        let lexical_hits = lexical.len();
        let vector_hits = vector.len();
        let lexical = above(lexical, self.floors.lexical);
        let vector = above(vector, self.floors.vector);

        let candidates = self.fusion.fuse(&lexical, &vector, top_k);
        debug!(
            lexical_hits,
            vector_hits,
            lexical_kept = lexical.len(),
            vector_kept = vector.len(),
            candidates = candidates.len(),
            "Fused retrieval results"
        );

        Ok(RetrievalOutcome {
            candidates,
            failed_indexes,
        })
    }

    /// Embed the question once, then query the vector index.
    async fn vector_search(&self, query: &Query, limit: usize) -> Result<Vec<SearchHit>> {
        let text = truncate_chars(&query.text, self.max_query_chars);
        let embedding = self.embedder.embed(text).await?;
        if embedding.len() != self.embedder.dimension() {
            return Err(LecternError::embedding(format!(
                "{} returned {} dimensions, expected {}",
                self.embedder.model_name(),
                embedding.len(),
                self.embedder.dimension()
            )));
        }
        self.vector.vector_search(query, &embedding, limit).await
    }
}

fn above(mut hits: Vec<SearchHit>, floor: f32) -> Vec<SearchHit> {
    hits.retain(|hit| hit.score > floor);
    hits
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
