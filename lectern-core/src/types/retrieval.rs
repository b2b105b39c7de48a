//! Retrieval results and the assembled context handed to generation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::library::ArticleReference;

/// Separator placed between passages in the rendered context.
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// One result of a single index, scored on that index's native scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Source article.
    pub article_id: Uuid,
    /// Article title.
    pub title: String,
    /// Passage text that matched.
    pub excerpt: String,
    /// Native relevance score, higher is better.
    pub score: f32,
}

impl SearchHit {
    /// Create a hit.
    pub fn new<T: Into<String>, E: Into<String>>(
        article_id: Uuid,
        title: T,
        excerpt: E,
        score: f32,
    ) -> Self {
        Self {
            article_id,
            title: title.into(),
            excerpt: excerpt.into(),
            score,
        }
    }
}

/// A merged, fused-scored passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    /// Source article.
    pub article_id: Uuid,
    /// Article title.
    pub title: String,
    /// Passage text.
    pub excerpt: String,
    /// Raw lexical score, if the lexical index returned this article.
    pub lexical_score: Option<f32>,
    /// Raw vector score, if the vector index returned this article.
    pub vector_score: Option<f32>,
    /// Combined ranking score. Always finite.
    pub fused_score: f32,
}

impl RetrievalCandidate {
    /// Citation for this candidate.
    pub fn reference(&self) -> ArticleReference {
        ArticleReference {
            id: self.article_id,
            title: self.title.clone(),
        }
    }
}

/// A passage included in the generation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPassage {
    /// The single article this text came from.
    pub article_id: Uuid,
    /// Article title.
    pub title: String,
    /// Included text, possibly truncated.
    pub text: String,
    /// Zero-based rank of the candidate this passage came from.
    pub rank: usize,
    /// Token cost of `text`.
    pub tokens: usize,
    /// Whether `text` was cut to fit the budget.
    pub truncated: bool,
}

/// Bounded, provenance-preserving context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Included passages in rank order.
    pub passages: Vec<ContextPassage>,
    /// Sum of passage token costs. Never exceeds `budget`.
    pub token_count: usize,
    /// Budget the context was assembled under.
    pub budget: usize,
}

impl AssembledContext {
    /// An empty context for the given budget.
    pub fn empty(budget: usize) -> Self {
        Self {
            passages: Vec::new(),
            token_count: 0,
            budget,
        }
    }

    /// Whether nothing was included.
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Number of passages.
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Ids of every article with text in this context.
    pub fn article_ids(&self) -> HashSet<Uuid> {
        self.passages.iter().map(|p| p.article_id).collect()
    }

    /// Ordered, deduplicated citations of every included article.
    pub fn references(&self) -> Vec<ArticleReference> {
        let mut seen = HashSet::new();
        self.passages
            .iter()
            .filter(|p| seen.insert(p.article_id))
            .map(|p| ArticleReference {
                id: p.article_id,
                title: p.title.clone(),
            })
            .collect()
    }

    /// Render passages as the prompt context block.
    pub fn render(&self) -> String {
        self.passages
            .iter()
            .map(|p| format!("### {}\n\n{}", p.title, p.text))
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR)
    }
}
