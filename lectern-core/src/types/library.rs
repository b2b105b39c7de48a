//! Library records: articles, categories and their public projections.
//!
//! These mirror the structured store the ingestion pipeline writes to. The
//! answering engine only ever reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Where an article was saved from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SourceType {
    /// A web page.
    Url,
    /// An uploaded PDF document.
    Pdf,
    /// An arXiv paper.
    Arxiv,
    /// A video transcript.
    Video,
}

/// Ingestion state of an article.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProcessingStatus {
    /// Waiting for extraction.
    Pending,
    /// Extraction in progress.
    Processing,
    /// Searchable.
    #[default]
    Completed,
    /// Extraction failed.
    Failed,
}

/// A saved document in a user's library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning user.
    pub owner_id: Uuid,
    /// Display title.
    pub title: String,
    /// Generated summary, if extraction produced one.
    #[serde(default)]
    pub summary: Option<String>,
    /// Extracted body text.
    #[serde(default)]
    pub body: Option<String>,
    /// Where the article came from.
    #[serde(default)]
    pub original_url: Option<String>,
    /// Kind of source.
    pub source_type: SourceType,
    /// Ingestion state.
    #[serde(default)]
    pub status: ProcessingStatus,
    /// Color label name.
    #[serde(default)]
    pub color: Option<String>,
    /// Category names the article is filed under.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Tag names.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the owner has marked it as read.
    #[serde(default)]
    pub is_read: bool,
    /// When the article was saved.
    pub created_at: DateTime<Utc>,
    /// Document embedding produced at ingestion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Article {
    /// Create a completed URL article with a fresh id, saved now.
    pub fn new<S: Into<String>>(owner_id: Uuid, title: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: title.into(),
            summary: None,
            body: None,
            original_url: None,
            source_type: SourceType::Url,
            status: ProcessingStatus::Completed,
            color: None,
            categories: Vec::new(),
            tags: Vec::new(),
            is_read: false,
            created_at: Utc::now(),
            embedding: None,
        }
    }

    /// Set the id.
    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Set the summary.
    #[must_use]
    pub fn with_summary<S: Into<String>>(mut self, summary: S) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Set the body text.
    #[must_use]
    pub fn with_body<S: Into<String>>(mut self, body: S) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the source URL.
    #[must_use]
    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.original_url = Some(url.into());
        self
    }

    /// Set the source type.
    #[must_use]
    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    /// Set the processing status.
    #[must_use]
    pub fn with_status(mut self, status: ProcessingStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the color label.
    #[must_use]
    pub fn with_color<S: Into<String>>(mut self, color: S) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Add a category.
    #[must_use]
    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set the read flag.
    #[must_use]
    pub fn with_read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }

    /// Set the creation time.
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Attach the ingestion-time embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Whether the article is visible to search and metadata queries of `owner`.
    pub fn is_searchable_by(&self, owner: Uuid) -> bool {
        self.owner_id == owner && self.status == ProcessingStatus::Completed
    }

    /// Public projection used in listings.
    pub fn summary_view(&self) -> ArticleSummary {
        ArticleSummary {
            id: self.id,
            title: self.title.clone(),
            source_type: self.source_type,
            original_url: self.original_url.clone(),
            created_at: self.created_at,
            is_read: self.is_read,
        }
    }

    /// Citation for this article.
    pub fn reference(&self) -> ArticleReference {
        ArticleReference {
            id: self.id,
            title: self.title.clone(),
        }
    }
}

/// A category in the owner's two-level taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category name.
    pub name: String,
    /// Parent category name, `None` for top-level categories.
    #[serde(default)]
    pub parent: Option<String>,
}

impl Category {
    /// A top-level category.
    pub fn root<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    /// A subcategory of `parent`.
    pub fn child<S: Into<String>, P: Into<String>>(name: S, parent: P) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
        }
    }
}

/// Article fields exposed by metadata listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    /// Article id.
    pub id: Uuid,
    /// Article title.
    pub title: String,
    /// Kind of source.
    pub source_type: SourceType,
    /// Source URL.
    pub original_url: Option<String>,
    /// When it was saved.
    pub created_at: DateTime<Utc>,
    /// Read flag.
    pub is_read: bool,
}

/// A citation returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleReference {
    /// Article id.
    pub id: Uuid,
    /// Article title.
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_source_type_parses_case_insensitively() {
        assert_eq!(SourceType::from_str("PDF").unwrap(), SourceType::Pdf);
        assert_eq!(SourceType::from_str("video").unwrap(), SourceType::Video);
        assert!(SourceType::from_str("podcast").is_err());
        assert_eq!(SourceType::Arxiv.to_string(), "arxiv");
    }

    #[test]
    fn test_searchable_requires_owner_and_completed() {
        let owner = Uuid::new_v4();
        let article = Article::new(owner, "A");
        assert!(article.is_searchable_by(owner));
        assert!(!article.is_searchable_by(Uuid::new_v4()));

        let pending = Article::new(owner, "B").with_status(ProcessingStatus::Pending);
        assert!(!pending.is_searchable_by(owner));
    }

    #[test]
    fn test_article_deserializes_with_defaults() {
        let json = r#"{
            "id": "6f1c1d5e-8a44-4e3b-9d2c-0d8f5b6a7c11",
            "owner_id": "0b8f6c1e-2d3a-4b5c-8d9e-1f2a3b4c5d6e",
            "title": "Attention Is All You Need",
            "source_type": "arxiv",
            "created_at": "2024-05-01T12:00:00Z"
        }"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.status, ProcessingStatus::Completed);
        assert!(article.tags.is_empty());
        assert!(article.embedding.is_none());
    }
}
