//! Budgeted context assembly.
//!
//! Candidates are taken greedily in rank order. A candidate is included whole
//! or not at all, and assembly stops at the first candidate that no longer
//! fits, with one exception: when the top candidate alone exceeds the budget,
//! its text is cut to fit so the context is never empty for a non-empty
//! ranking.

use lectern_core::{
    config::ContextConfig,
    traits::{ApproximateTokenCounter, TokenCounter},
    types::{AssembledContext, ContextPassage, RetrievalCandidate},
};
use std::sync::Arc;
use tracing::debug;

/// Marker inserted where an over-long excerpt was shortened.
pub const TRUNCATION_MARKER: &str = "\n\n[... content truncated for length ...]\n\n";

/// Builds an [`AssembledContext`] under a token budget.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    counter: Arc<dyn TokenCounter>,
    max_tokens: usize,
    excerpt_chars: usize,
}

impl ContextAssembler {
    /// Create an assembler with the approximate token counter.
    pub fn new(max_tokens: usize) -> Self {
        Self {
            counter: Arc::new(ApproximateTokenCounter::default()),
            max_tokens,
            excerpt_chars: ContextConfig::default().excerpt_chars,
        }
    }

    /// Create an assembler from configuration.
    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.max_tokens).with_excerpt_chars(config.excerpt_chars)
    }

    /// Use a different token counter.
    #[must_use]
    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// Set the per-excerpt character cap applied before budgeting.
    #[must_use]
    pub fn with_excerpt_chars(mut self, excerpt_chars: usize) -> Self {
        self.excerpt_chars = excerpt_chars.max(1);
        self
    }

    /// The token budget.
    pub fn budget(&self) -> usize {
        self.max_tokens
    }

    /// Select passages from `candidates` (best first).
    pub fn assemble(&self, candidates: &[RetrievalCandidate]) -> AssembledContext {
        let mut context = AssembledContext::empty(self.max_tokens);

        for (rank, candidate) in candidates.iter().enumerate() {
            // A blank excerpt still attributes the article by its title.
            let source = match candidate.excerpt.trim() {
                "" => candidate.title.trim(),
                excerpt => excerpt,
            };
            let text = shape_excerpt(source, self.excerpt_chars);
            if text.is_empty() {
                continue;
            }
            let tokens = self.counter.count(&text);

            if context.token_count + tokens <= self.max_tokens {
                context.token_count += tokens;
                context.passages.push(ContextPassage {
                    article_id: candidate.article_id,
                    title: candidate.title.clone(),
                    text,
                    rank,
                    tokens,
                    truncated: false,
                });
                continue;
            }

            if context.is_empty() {
                if let Some((text, tokens)) = self.fit(&text) {
                    context.token_count = tokens;
                    context.passages.push(ContextPassage {
                        article_id: candidate.article_id,
                        title: candidate.title.clone(),
                        text,
                        rank,
                        tokens,
                        truncated: true,
                    });
                }
            }
            break;
        }

        debug!(
            passages = context.len(),
            tokens = context.token_count,
            budget = self.max_tokens,
            "Assembled context"
        );
        context
    }

    /// Cut `text` until it costs at most the whole budget.
    fn fit(&self, text: &str) -> Option<(String, usize)> {
        let mut allowance = self.max_tokens;
        while allowance > 0 {
            let cut = self.counter.truncate(text, allowance);
            let tokens = self.counter.count(&cut);
            if !cut.is_empty() && tokens <= self.max_tokens {
                return Some((cut, tokens));
            }
            allowance -= 1;
        }
        None
    }
}

/// Cap an excerpt at `max_chars`, keeping its head and tail.
///
/// The first 70% of the allowance comes from the start of the text and the
/// remaining 30% from its end, joined by [`TRUNCATION_MARKER`].
pub fn shape_excerpt(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let head_chars = max_chars * 7 / 10;
    let tail_chars = max_chars - head_chars;

    let head: String = text.chars().take(head_chars).collect();
    let tail: String = text.chars().skip(total - tail_chars).collect();
    format!("{}{TRUNCATION_MARKER}{}", head.trim_end(), tail.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn candidate(n: u128, excerpt: &str) -> RetrievalCandidate {
        RetrievalCandidate {
            article_id: Uuid::from_u128(n),
            title: format!("doc {n}"),
            excerpt: excerpt.to_string(),
            lexical_score: None,
            vector_score: Some(1.0),
            fused_score: 1.0,
        }
    }

    #[test]
    fn test_includes_whole_candidates_in_rank_order() {
        // 40 chars = 10 tokens each with the approximate counter.
        let assembler = ContextAssembler::new(25);
        let text = "x".repeat(40);
        let candidates = vec![candidate(1, &text), candidate(2, &text), candidate(3, &text)];

        let context = assembler.assemble(&candidates);
        assert_eq!(context.len(), 2);
        assert_eq!(context.token_count, 20);
        assert!(context.passages.iter().all(|p| !p.truncated));
        assert_eq!(context.passages[0].article_id, Uuid::from_u128(1));
        assert_eq!(context.passages[1].rank, 1);
    }

    #[test]
    fn test_stops_at_first_candidate_that_does_not_fit() {
        let assembler = ContextAssembler::new(15);
        let candidates = vec![
            candidate(1, &"a".repeat(40)),
            candidate(2, &"b".repeat(40)),
            candidate(3, &"c".repeat(4)),
        ];
        let context = assembler.assemble(&candidates);
        let ids: Vec<_> = context.passages.iter().map(|p| p.article_id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(1)]);
    }

    #[test]
    fn test_oversized_first_candidate_is_truncated_not_dropped() {
        let assembler = ContextAssembler::new(5).with_excerpt_chars(10_000);
        let context = assembler.assemble(&[candidate(1, &"y".repeat(400)), candidate(2, "z")]);

        assert_eq!(context.len(), 1);
        let first = &context.passages[0];
        assert!(first.truncated);
        assert_eq!(first.article_id, Uuid::from_u128(1));
        assert!(context.token_count <= 5);
        assert_eq!(first.text.len(), 20);
    }

    #[test]
    fn test_blank_top_excerpt_falls_back_to_title() {
        let assembler = ContextAssembler::new(100);
        let context = assembler.assemble(&[candidate(1, "  \n "), candidate(2, "second passage")]);

        assert_eq!(context.len(), 2);
        assert_eq!(context.passages[0].article_id, Uuid::from_u128(1));
        assert_eq!(context.passages[0].text, "doc 1");
        assert_eq!(context.passages[0].rank, 0);
    }

    #[cfg(feature = "tiktoken")]
    #[test]
    fn test_budget_holds_with_bpe_counter() {
        use lectern_core::traits::{TiktokenCounter, TokenCounter};

        let counter = Arc::new(TiktokenCounter::cl100k().unwrap());
        let assembler = ContextAssembler::new(60)
            .with_counter(counter.clone())
            .with_excerpt_chars(10_000);
        let passage = "Transformers replace recurrence with attention over every token pair. ";
        let candidates: Vec<RetrievalCandidate> =
            (1..=6).map(|n| candidate(n, &passage.repeat(2))).collect();

        let context = assembler.assemble(&candidates);
        assert!(!context.is_empty());
        assert!(context.token_count <= 60);
        let counted: usize = context.passages.iter().map(|p| counter.count(&p.text)).sum();
        assert_eq!(counted, context.token_count);

        let oversized = assembler.assemble(&[candidate(1, &passage.repeat(40))]);
        assert!(oversized.passages[0].truncated);
        assert!(counter.count(&oversized.passages[0].text) <= 60);
    }

    #[test]
    fn test_empty_candidates_give_empty_context() {
        let context = ContextAssembler::new(100).assemble(&[]);
        assert!(context.is_empty());
        assert_eq!(context.budget, 100);
    }

    #[test]
    fn test_shape_excerpt_keeps_head_and_tail() {
        let text = format!("{}{}", "h".repeat(80), "t".repeat(20));
        let shaped = shape_excerpt(&text, 50);
        assert!(shaped.starts_with(&"h".repeat(35)));
        assert!(shaped.ends_with(&"t".repeat(15)));
        assert!(shaped.contains("[... content truncated for length ...]"));
        assert_eq!(shape_excerpt("short", 50), "short");
    }
}
