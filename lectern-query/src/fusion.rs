//! Score fusion for hybrid retrieval.
//!
//! Lexical relevance and cosine similarity live on different scales, so each
//! list is min-max normalized on its own before the weighted sum:
//!
//! ```text
//! norm(s)  = (s - min) / (max - min)      (1.0 when max == min)
//! fused    = w_lexical * norm(lexical) + w_vector * norm(vector)
//! ```
//!
//! A score missing from one list contributes zero. Non-finite raw scores are
//! discarded before normalization. Ties on the fused score are broken by
//! article id, so the output order is a pure function of the inputs.

use lectern_core::{
    config::FusionWeights,
    types::{RetrievalCandidate, SearchHit},
};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Weighted min-max fusion of a lexical and a vector result list.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreFusion {
    weights: FusionWeights,
}

#[derive(Debug)]
struct Merged {
    title: String,
    excerpt: String,
    excerpt_score: f32,
    lexical: Option<(f32, f32)>,
    vector: Option<(f32, f32)>,
}

impl ScoreFusion {
    /// Create a fuser with the given weights.
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    /// The weights in use.
    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Merge both lists into at most `top_k` candidates, best first.
    ///
    /// Each article appears once. When an article has several passages, the
    /// highest-scoring one supplies the excerpt.
    pub fn fuse(
        &self,
        lexical: &[SearchHit],
        vector: &[SearchHit],
        top_k: usize,
    ) -> Vec<RetrievalCandidate> {
        let lexical = normalize_list(lexical);
        let vector = normalize_list(vector);

        let mut merged: BTreeMap<Uuid, Merged> = BTreeMap::new();
        for (hit, raw, norm) in lexical {
            merged.insert(
                hit.article_id,
                Merged {
                    title: hit.title.clone(),
                    excerpt: hit.excerpt.clone(),
                    excerpt_score: norm,
                    lexical: Some((raw, norm)),
                    vector: None,
                },
            );
        }
        for (hit, raw, norm) in vector {
            let entry = merged.entry(hit.article_id).or_insert_with(|| Merged {
                title: hit.title.clone(),
                excerpt: hit.excerpt.clone(),
                excerpt_score: f32::NEG_INFINITY,
                lexical: None,
                vector: None,
            });
            entry.vector = Some((raw, norm));
            if norm >= entry.excerpt_score {
                entry.excerpt.clone_from(&hit.excerpt);
                entry.excerpt_score = norm;
            }
        }

        let mut candidates: Vec<RetrievalCandidate> = merged
            .into_iter()
            .map(|(article_id, m)| {
                let fused = self.weights.lexical * m.lexical.map_or(0.0, |(_, n)| n)
                    + self.weights.vector * m.vector.map_or(0.0, |(_, n)| n);
                RetrievalCandidate {
                    article_id,
                    title: m.title,
                    excerpt: m.excerpt,
                    lexical_score: m.lexical.map(|(raw, _)| raw),
                    vector_score: m.vector.map(|(raw, _)| raw),
                    fused_score: fused,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.fused_score
                .total_cmp(&a.fused_score)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });
        candidates.truncate(top_k);
        candidates
    }
}

/// Min-max normalize scores into `[0, 1]`. A constant list maps to `1.0`.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let (min, max) = scores
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s), hi.max(s))
        });
    let range = max - min;
    scores
        .iter()
        .map(|&s| if range > 0.0 { (s - min) / range } else { 1.0 })
        .collect()
}

/// Best passage per article with finite scores, paired with raw and
/// normalized score.
fn normalize_list(hits: &[SearchHit]) -> Vec<(&SearchHit, f32, f32)> {
    let mut best: BTreeMap<Uuid, &SearchHit> = BTreeMap::new();
    for hit in hits.iter().filter(|h| h.score.is_finite()) {
        best.entry(hit.article_id)
            .and_modify(|current| {
                if hit.score > current.score {
                    *current = hit;
                }
            })
            .or_insert(hit);
    }

    let hits: Vec<&SearchHit> = best.into_values().collect();
    let raw: Vec<f32> = hits.iter().map(|h| h.score).collect();
    let normalized = min_max_normalize(&raw);
    hits.into_iter()
        .zip(raw)
        .zip(normalized)
        .map(|((hit, raw), norm)| (hit, raw, norm))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn hit(n: u128, score: f32) -> SearchHit {
        SearchHit::new(id(n), format!("doc {n}"), format!("text {n}"), score)
    }

    #[test]
    fn test_min_max_normalize() {
        assert_eq!(min_max_normalize(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(min_max_normalize(&[0.7, 0.7]), vec![1.0, 1.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn test_documents_in_both_lists_keep_both_scores() {
        let fusion = ScoreFusion::default();
        let lexical = vec![hit(1, 12.0), hit(2, 4.0)];
        let vector = vec![hit(2, 0.9), hit(3, 0.5)];

        let fused = fusion.fuse(&lexical, &vector, 10);
        let two = fused.iter().find(|c| c.article_id == id(2)).unwrap();
        assert_eq!(two.lexical_score, Some(4.0));
        assert_eq!(two.vector_score, Some(0.9));

        let three = fused.iter().find(|c| c.article_id == id(3)).unwrap();
        assert_eq!(three.lexical_score, None);
        assert_eq!(three.vector_score, Some(0.5));
        assert!(fused.iter().all(|c| c.fused_score.is_finite()));
    }

    #[test]
    fn test_weighted_ranking_is_exact() {
        // lexical norm: 1 -> 1.0, 2 -> 0.0; vector norm: 2 -> 1.0, 3 -> 0.0
        // fused: 1 = 0.4, 2 = 0.6, 3 = 0.0
        let fusion = ScoreFusion::new(FusionWeights::new(0.4, 0.6));
        let fused = fusion.fuse(
            &[hit(1, 12.0), hit(2, 4.0)],
            &[hit(2, 0.9), hit(3, 0.5)],
            10,
        );
        let order: Vec<Uuid> = fused.iter().map(|c| c.article_id).collect();
        assert_eq!(order, vec![id(2), id(1), id(3)]);
        assert!((fused[0].fused_score - 0.6).abs() < 1e-6);
        assert!((fused[1].fused_score - 0.4).abs() < 1e-6);
        assert!(fused[2].fused_score.abs() < 1e-6);
    }

    #[test]
    fn test_ties_break_on_article_id_and_are_repeatable() {
        let fusion = ScoreFusion::default();
        let lexical = vec![hit(9, 1.0), hit(5, 1.0), hit(7, 1.0)];
        let first = fusion.fuse(&lexical, &[], 10);
        for _ in 0..20 {
            assert_eq!(fusion.fuse(&lexical, &[], 10), first);
        }
        let order: Vec<Uuid> = first.iter().map(|c| c.article_id).collect();
        assert_eq!(order, vec![id(5), id(7), id(9)]);
    }

    #[test]
    fn test_duplicate_passages_keep_best_excerpt() {
        let fusion = ScoreFusion::default();
        let mut weak = hit(1, 0.2);
        weak.excerpt = "weak passage".into();
        let mut strong = hit(1, 0.8);
        strong.excerpt = "strong passage".into();

        let fused = fusion.fuse(&[], &[weak, strong, hit(2, 0.1)], 10);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].excerpt, "strong passage");
        assert_eq!(fused[0].vector_score, Some(0.8));
    }

    #[test]
    fn test_nan_scores_are_dropped() {
        let fusion = ScoreFusion::default();
        let fused = fusion.fuse(&[hit(1, f32::NAN), hit(2, 3.0)], &[], 10);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].article_id, id(2));
    }

    #[test]
    fn test_truncates_to_top_k() {
        let fusion = ScoreFusion::default();
        let lexical: Vec<SearchHit> = (0..30).map(|n| hit(n, n as f32)).collect();
        let fused = fusion.fuse(&lexical, &[], 5);
        assert_eq!(fused.len(), 5);
        assert_eq!(fused[0].article_id, id(29));
    }
}
