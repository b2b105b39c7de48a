//! Structured-store access for metadata operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Result,
    types::{ArticleFilter, ArticleSummary, Category, CategoryNode, Dimension, LibraryStats},
};

/// The names an owner's library defines.
///
/// A name that exists here but has no articles is a real, empty entity; a name
/// that does not exist here is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Categories, including empty ones.
    pub categories: Vec<Category>,
    /// Tag names.
    pub tags: Vec<String>,
    /// Color label names.
    pub colors: Vec<String>,
}

impl Vocabulary {
    /// Canonical spelling of a category name, matched case-insensitively.
    pub fn resolve_category(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.name.as_str())
    }

    /// Canonical spelling of a tag name.
    ///
    /// Tags are often written with spaces in questions ("machine learning")
    /// and hyphens in the library, so both forms are tried.
    pub fn resolve_tag(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        let hyphenated = name.replace(' ', "-");
        self.tags
            .iter()
            .find(|t| t.eq_ignore_ascii_case(name) || t.eq_ignore_ascii_case(&hyphenated))
            .map(String::as_str)
    }

    /// Canonical spelling of a color label.
    pub fn resolve_color(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.colors
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

/// Read-only aggregate and listing queries over one owner's library.
///
/// Only completed articles are counted or listed, except by
/// [`library_stats`](Self::library_stats), which also reports other statuses.
#[async_trait]
pub trait LibraryCatalog: Send + Sync + std::fmt::Debug {
    /// Names defined in the owner's library.
    async fn vocabulary(&self, owner: Uuid) -> Result<Vocabulary>;

    /// Number of articles matching `filter`.
    async fn count_articles(&self, owner: Uuid, filter: &ArticleFilter) -> Result<u64>;

    /// Matching articles, newest first, at most `limit`.
    async fn list_articles(
        &self,
        owner: Uuid,
        filter: &ArticleFilter,
        limit: usize,
    ) -> Result<Vec<ArticleSummary>>;

    /// Article counts grouped along `dimension`, largest first and then by
    /// name. Groups with no articles are omitted.
    async fn group_counts(&self, owner: Uuid, dimension: Dimension) -> Result<Vec<(String, u64)>>;

    /// Category tree with per-category article counts.
    async fn category_tree(&self, owner: Uuid) -> Result<Vec<CategoryNode>>;

    /// Source URLs of all articles that have one.
    async fn source_urls(&self, owner: Uuid) -> Result<Vec<String>>;

    /// Aggregate statistics.
    async fn library_stats(&self, owner: Uuid) -> Result<LibraryStats>;

    /// Catalog name used in logs.
    fn name(&self) -> &str {
        "catalog"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocabulary() -> Vocabulary {
        Vocabulary {
            categories: vec![Category::root("Research"), Category::child("NLP", "Research")],
            tags: vec!["machine-learning".into(), "rust".into()],
            colors: vec!["Blue".into()],
        }
    }

    #[test]
    fn test_resolution_is_case_insensitive() {
        let vocab = vocabulary();
        assert_eq!(vocab.resolve_category("research"), Some("Research"));
        assert_eq!(vocab.resolve_category("nlp "), Some("NLP"));
        assert_eq!(vocab.resolve_color("BLUE"), Some("Blue"));
        assert_eq!(vocab.resolve_category("cooking"), None);
    }

    #[test]
    fn test_tag_resolution_accepts_spaces() {
        let vocab = vocabulary();
        assert_eq!(vocab.resolve_tag("Machine Learning"), Some("machine-learning"));
        assert_eq!(vocab.resolve_tag("rust"), Some("rust"));
        assert_eq!(vocab.resolve_tag("go"), None);
    }
}
