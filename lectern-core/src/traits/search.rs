//! Search index traits.
//!
//! Both indexes are read-only views over the owner's completed articles.
//! Each returns at most `limit` hits, best first, scored on its own scale.

use async_trait::async_trait;

use crate::{
    Result,
    types::{Query, SearchHit},
};

/// Full-text index over title, summary, body and tags.
#[async_trait]
pub trait LexicalIndex: Send + Sync + std::fmt::Debug {
    /// Ranked keyword search for the query's text within its owner's library.
    async fn lexical_search(&self, query: &Query, limit: usize) -> Result<Vec<SearchHit>>;

    /// Index name used in logs and errors.
    fn name(&self) -> &str {
        "lexical"
    }
}

/// Nearest-neighbour index over per-article embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    /// Top similarity matches for `embedding` within the query owner's library.
    ///
    /// Scores are similarities, higher is better.
    async fn vector_search(
        &self,
        query: &Query,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Index name used in logs and errors.
    fn name(&self) -> &str {
        "vector"
    }
}
