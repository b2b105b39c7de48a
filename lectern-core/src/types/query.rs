//! Query and intent types.
//!
//! A [`Query`] is created once per request and never mutated. The classifier
//! turns it into a [`QueryIntent`], which decides the route through the engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use super::library::{Article, SourceType};

/// A question asked against one owner's library.
///
/// # Examples
///
/// ```rust
/// use lectern_core::types::Query;
/// use uuid::Uuid;
///
/// let query = Query::new(Uuid::new_v4(), "What did I save about Rust async?")
///     .with_session("session-42");
/// assert_eq!(query.session_id.as_deref(), Some("session-42"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Raw question text.
    pub text: String,
    /// Owner whose library is searched.
    pub owner_id: Uuid,
    /// Optional session identity for audit logs.
    pub session_id: Option<String>,
    /// When the question was received.
    pub issued_at: DateTime<Utc>,
}

impl Query {
    /// Create a query issued now.
    pub fn new<S: Into<String>>(owner_id: Uuid, text: S) -> Self {
        Self {
            text: text.into(),
            owner_id,
            session_id: None,
            issued_at: Utc::now(),
        }
    }

    /// Attach a session id.
    #[must_use]
    pub fn with_session<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Override the issue time.
    #[must_use]
    pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = issued_at;
        self
    }
}

/// Coarse route chosen for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryKind {
    /// Retrieval plus grounded generation.
    Content,
    /// A direct structured-store operation.
    Metadata,
}

/// The closed set of metadata operations.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum MetadataOperation {
    /// Number of articles in the library.
    TotalCount,
    /// Per-category counts, or the count for one category or tag.
    CountByCategory,
    /// Per-tag counts, or the count for one tag.
    CountByTag,
    /// Counts per source type.
    CountByMediaType,
    /// Counts per color label.
    CountByColor,
    /// The category tree.
    ListCategories,
    /// All tags with usage counts.
    ListTags,
    /// Articles matching a combination of filters.
    ListByFilter,
    /// Articles saved within a date range.
    ArticlesInDateRange,
    /// Most recently saved articles.
    RecentArticles,
    /// Most frequent source domains.
    TopSources,
    /// Overall library statistics.
    LibrarySummary,
}

/// A single operation parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer parameter.
    Integer(i64),
    /// Boolean parameter.
    Bool(bool),
    /// Calendar date parameter.
    Date(NaiveDate),
    /// Free-text parameter.
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Date(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Named parameters of a metadata request, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamValues(BTreeMap<String, ParamValue>);

impl ParamValues {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing any previous value.
    #[must_use]
    pub fn with<K: Into<String>>(mut self, name: K, value: ParamValue) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Add a text parameter.
    #[must_use]
    pub fn with_text<K: Into<String>, V: Into<String>>(self, name: K, value: V) -> Self {
        self.with(name, ParamValue::Text(value.into()))
    }

    /// Add an integer parameter.
    #[must_use]
    pub fn with_integer<K: Into<String>>(self, name: K, value: i64) -> Self {
        self.with(name, ParamValue::Integer(value))
    }

    /// Insert a parameter in place.
    pub fn insert<K: Into<String>>(&mut self, name: K, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    /// Raw access.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Whether the parameter is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Text value of a parameter.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            ParamValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Integer value, accepting numeric text.
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.0.get(name)? {
            ParamValue::Integer(value) => Some(*value),
            ParamValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean value, accepting `"true"`/`"false"`.
    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.0.get(name)? {
            ParamValue::Bool(value) => Some(*value),
            ParamValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Date value, accepting ISO-8601 text.
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.0.get(name)? {
            ParamValue::Date(value) => Some(*value),
            ParamValue::Text(value) => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// Iterate over parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ParamValue)> for ParamValues {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A resolved metadata operation with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRequest {
    /// Operation to execute.
    pub operation: MetadataOperation,
    /// Validated parameters.
    #[serde(default)]
    pub params: ParamValues,
}

impl MetadataRequest {
    /// Create a request without parameters.
    pub fn new(operation: MetadataOperation) -> Self {
        Self {
            operation,
            params: ParamValues::new(),
        }
    }

    /// Create a request with parameters.
    pub fn with_params(operation: MetadataOperation, params: ParamValues) -> Self {
        Self { operation, params }
    }
}

/// Classification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryIntent {
    /// Retrieve and synthesize.
    Content,
    /// Execute exactly one metadata operation.
    Metadata(MetadataRequest),
}

impl QueryIntent {
    /// Coarse route of this intent.
    pub fn kind(&self) -> QueryKind {
        match self {
            Self::Content => QueryKind::Content,
            Self::Metadata(_) => QueryKind::Metadata,
        }
    }

    /// The metadata request, if any.
    pub fn metadata(&self) -> Option<&MetadataRequest> {
        match self {
            Self::Content => None,
            Self::Metadata(request) => Some(request),
        }
    }
}

/// Grouping dimension for aggregate counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    /// Group by category name.
    Category,
    /// Group by tag name.
    Tag,
    /// Group by source type.
    SourceType,
    /// Group by color label.
    Color,
}

/// Structured filter over a library's articles.
///
/// Name comparisons are case-insensitive. `added_after` is inclusive and
/// `added_before` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFilter {
    /// Category name.
    pub category: Option<String>,
    /// Tag name.
    pub tag: Option<String>,
    /// Color label name.
    pub color: Option<String>,
    /// Source type.
    pub source_type: Option<SourceType>,
    /// Read flag.
    pub is_read: Option<bool>,
    /// Lower bound on save time.
    pub added_after: Option<DateTime<Utc>>,
    /// Upper bound on save time.
    pub added_before: Option<DateTime<Utc>>,
}

impl ArticleFilter {
    /// Filter matching every article.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter on one category.
    pub fn category<S: Into<String>>(name: S) -> Self {
        Self {
            category: Some(name.into()),
            ..Self::default()
        }
    }

    /// Filter on one tag.
    pub fn tag<S: Into<String>>(name: S) -> Self {
        Self {
            tag: Some(name.into()),
            ..Self::default()
        }
    }

    /// Whether no constraint is set.
    pub fn is_unconstrained(&self) -> bool {
        self == &Self::default()
    }

    /// Evaluate the filter against an article. Ownership and status are not
    /// checked here.
    pub fn matches(&self, article: &Article) -> bool {
        let eq = |a: &str, b: &str| a.eq_ignore_ascii_case(b);

        if let Some(category) = &self.category {
            if !article.categories.iter().any(|c| eq(c, category)) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !article.tags.iter().any(|t| eq(t, tag)) {
                return false;
            }
        }
        if let Some(color) = &self.color {
            if !article.color.as_deref().is_some_and(|c| eq(c, color)) {
                return false;
            }
        }
        if self.source_type.is_some_and(|st| st != article.source_type) {
            return false;
        }
        if self.is_read.is_some_and(|read| read != article.is_read) {
            return false;
        }
        if self.added_after.is_some_and(|after| article.created_at < after) {
            return false;
        }
        if self
            .added_before
            .is_some_and(|before| article.created_at >= before)
        {
            return false;
        }
        true
    }
}
