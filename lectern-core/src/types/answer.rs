//! Answer payloads: generated answers, streamed events and metadata results.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::Pin;

use super::library::{ArticleReference, ArticleSummary};
use crate::Result;

/// Text returned when retrieval finds nothing to ground an answer on.
pub const NO_RELEVANT_DOCUMENTS: &str =
    "I couldn't find any relevant documents in your library to answer this question.";

/// A natural-language answer with its citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text.
    pub text: String,
    /// Ordered, deduplicated citations. Only articles that were in the
    /// generation context appear here.
    pub references: Vec<ArticleReference>,
}

impl Answer {
    /// Create an answer.
    pub fn new<S: Into<String>>(text: S, references: Vec<ArticleReference>) -> Self {
        Self {
            text: text.into(),
            references,
        }
    }

    /// The fixed empty-context answer.
    pub fn no_relevant_documents() -> Self {
        Self::new(NO_RELEVANT_DOCUMENTS, Vec::new())
    }

    /// Whether this is the empty-context answer.
    pub fn is_no_relevant_documents(&self) -> bool {
        self.references.is_empty() && self.text == NO_RELEVANT_DOCUMENTS
    }
}

/// One event of a streamed answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AnswerEvent {
    /// Next text increment.
    Delta(String),
    /// Terminal event carrying the citation list.
    Citations(Vec<ArticleReference>),
}

/// A streamed answer: zero or more deltas, then exactly one citations event.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<AnswerEvent>> + Send>>;

/// Aggregate library statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStats {
    /// All articles regardless of status.
    pub total: u64,
    /// Counts per processing status.
    pub by_status: BTreeMap<String, u64>,
    /// Counts per source type, completed articles only.
    pub by_source_type: BTreeMap<String, u64>,
    /// Number of categories.
    pub categories: u64,
    /// Number of tags.
    pub tags: u64,
    /// Articles saved in the last seven days.
    pub added_this_week: u64,
}

/// A category with its article count and children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    /// Category name.
    pub name: String,
    /// Articles filed directly under this category.
    pub count: u64,
    /// Subcategories.
    #[serde(default)]
    pub children: Vec<CategoryNode>,
}

/// Structured result of a metadata operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetadataResult {
    /// A single count.
    Count {
        /// What was counted, e.g. `articles tagged "rust"`.
        subject: String,
        /// The count.
        count: u64,
    },
    /// Counts grouped along one dimension, largest first.
    Breakdown {
        /// Grouping dimension label.
        dimension: String,
        /// `(group, count)` pairs.
        groups: Vec<(String, u64)>,
    },
    /// The category taxonomy.
    CategoryTree {
        /// Number of categories in the tree.
        total: u64,
        /// Top-level categories.
        roots: Vec<CategoryNode>,
    },
    /// A listing of articles.
    Articles {
        /// Listing heading.
        heading: String,
        /// Total matches before any limit.
        total: u64,
        /// Listed articles.
        articles: Vec<ArticleSummary>,
    },
    /// Overall statistics.
    Summary(LibraryStats),
    /// The requested entity does not exist. Distinct from a zero count.
    NotFound {
        /// Entity type, e.g. `category`.
        entity: String,
        /// Requested name.
        name: String,
    },
}

impl MetadataResult {
    /// Build a not-found result.
    pub fn not_found<E: Into<String>, N: Into<String>>(entity: E, name: N) -> Self {
        Self::NotFound {
            entity: entity.into(),
            name: name.into(),
        }
    }

    /// The count carried by a `Count` result.
    pub fn count(&self) -> Option<u64> {
        match self {
            Self::Count { count, .. } => Some(*count),
            _ => None,
        }
    }

    /// Whether this is a not-found result.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Citations for listing results; empty for everything else.
    pub fn references(&self) -> Vec<ArticleReference> {
        match self {
            Self::Articles { articles, .. } => articles
                .iter()
                .map(|a| ArticleReference {
                    id: a.id,
                    title: a.title.clone(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_relevant_documents_answer() {
        let answer = Answer::no_relevant_documents();
        assert!(answer.references.is_empty());
        assert!(answer.is_no_relevant_documents());
        assert!(!Answer::new("hello", Vec::new()).is_no_relevant_documents());
    }

    #[test]
    fn test_not_found_is_not_zero() {
        let missing = MetadataResult::not_found("category", "cooking");
        let zero = MetadataResult::Count {
            subject: "articles in category \"cooking\"".into(),
            count: 0,
        };
        assert!(missing.is_not_found());
        assert_eq!(missing.count(), None);
        assert_eq!(zero.count(), Some(0));
        assert_ne!(missing, zero);
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(AnswerEvent::Delta("Hi".into())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "delta", "data": "Hi"}));
    }
}
