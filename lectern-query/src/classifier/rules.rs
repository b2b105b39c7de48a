//! Deterministic phrase-rule classifier.
//!
//! Needs no model call, so it works offline and in tests. Content phrasing
//! ("about", "related to", "what does ... say") always wins over metadata
//! phrasing; metadata questions are then mapped to one operation by a fixed
//! sequence of rules.

use async_trait::async_trait;
use lectern_core::{
    traits::Vocabulary,
    types::{MetadataOperation, ParamValue, ParamValues, Query, SourceType},
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, instrument};

use super::{Classification, QueryClassifier, resolve_request};

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("classifier patterns are valid regexes"))
        .collect()
}

fn pattern(p: &str) -> Regex {
    Regex::new(p).expect("classifier patterns are valid regexes")
}

static CONTENT_INDICATORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\babout\b",
        r"\brelated to\b",
        r"\bconcerning\b",
        r"\bon the topic of\b",
        r"\bwhat do.*(say|mention|discuss)\b",
        r"\bsummarize.*(content|articles about)\b",
        r"\bfind.*(arguments?|information|details)\b",
    ])
});

static METADATA_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bhow many\b",
        r"\bcount\b",
        r"\bnumber of\b",
        r"\btotal\b",
        r"\blist all\b",
        r"\bshow all\b",
        r"\bwhat are my\b",
        r"\bwhat (categories|tags|colors)\b",
        r"\bmost (common|frequent|used)\b",
        r"\btop \d+\b",
        r"\bunread\b",
        r"\bfrom (last|this) (week|month|year)\b",
        r"\barticles? (added|saved|from)\b.*\b(today|yesterday|last|this)\b",
        r"\blibrary (summary|overview|stats|statistics)\b",
        r"\bsummarize my library\b",
        r"\boverview of my\b",
    ])
});

static LIBRARY_SUMMARY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\b(library|collection)\b.*(summary|overview|stats)",
        r"\b(summarize|overview of)\b.*\b(library|articles)\b",
    ])
});

static HOW_MANY_ARTICLES: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\bhow many (articles?|items?|things)\b"));
static TAG_NAME: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r#"\b(?:tagged|with the tag|with tag)\s+(?:as\s+|with\s+)?["'`]?([a-z0-9][a-z0-9_.\-]*)"#)
});
static CATEGORY_NAME: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"\b(?:in|under)\s+(?:the\s+|my\s+)?(?:category|folder)\s+["'`]?([a-z0-9][a-z0-9_\-]*)"#,
        r#"\b(?:in|under)\s+(?:the\s+|my\s+)?["'`]?([a-z0-9][a-z0-9_\-]*)["'`]?\s+(?:category|folder)\b"#,
    ])
});
static IN_CATEGORY: LazyLock<Regex> = LazyLock::new(|| pattern(r"\bin\b.*\b(category|folder)\b"));
static WITH_TAG: LazyLock<Regex> = LazyLock::new(|| pattern(r"\bwith\b.*\btags?\b"));
static LIST_CATEGORIES: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\b(list|show|what are)\b.*\bcategor|\bwhat categories\b"));
static LIST_TAGS: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\b(list|show|what are)\b.*\btags?\b|\bwhat tags\b"));
static MEDIA_TYPE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\bhow many\b.*\b(papers?|videos?|pdfs?|web ?pages?|links?)\b"));
static MEDIA_BREAKDOWN: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\b(breakdown|distribution)\b.*\b(type|media|source)"));
static UNREAD: LazyLock<Regex> = LazyLock::new(|| pattern(r"\bunread\b|\bhaven'?t read\b"));
static PERIOD: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\b(last|this|past)\s+(week|month|year)\b"));
static RECENT: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\b(recent|latest|newest)\b.*\b(articles?|saves?|additions?)\b"));
static TOP_SOURCES: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"\b(top|most (common|used|frequent))\b.*\b(sources?|domains?|sites?|websites?)\b")
});
static TOP_N: LazyLock<Regex> = LazyLock::new(|| pattern(r"\btop (\d+)\b"));
static MENTIONS_CATEGORY: LazyLock<Regex> = LazyLock::new(|| pattern(r"\bcategor"));
static MENTIONS_TAG: LazyLock<Regex> = LazyLock::new(|| pattern(r"\btags?\b"));
static MENTIONS_COLOR: LazyLock<Regex> = LazyLock::new(|| pattern(r"\bcolou?rs?\b"));

/// Rule-based classifier.
#[derive(Debug, Clone)]
pub struct RuleBasedClassifier {
    strict_vocabulary: bool,
}

impl Default for RuleBasedClassifier {
    fn default() -> Self {
        Self {
            strict_vocabulary: true,
        }
    }
}

impl RuleBasedClassifier {
    /// Create a classifier with strict vocabulary checking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether unknown names fall back to content.
    #[must_use]
    pub fn with_strict_vocabulary(mut self, strict: bool) -> Self {
        self.strict_vocabulary = strict;
        self
    }

    /// Whether the question reads as a question about the library itself.
    pub fn is_metadata_question(question: &str) -> bool {
        let q = question.to_lowercase();
        let q = q.trim();
        if CONTENT_INDICATORS.iter().any(|re| re.is_match(q)) {
            return false;
        }
        METADATA_PATTERNS.iter().any(|re| re.is_match(q))
    }

    /// Map a metadata question to an operation and parameters.
    pub fn detect_operation(
        question: &str,
        vocabulary: &Vocabulary,
    ) -> (MetadataOperation, ParamValues) {
        let q = question.to_lowercase();
        let q = q.trim();
        let none = ParamValues::new();

        if LIBRARY_SUMMARY.iter().any(|re| re.is_match(q)) {
            return (MetadataOperation::LibrarySummary, none);
        }

        if HOW_MANY_ARTICLES.is_match(q) {
            if let Some(tag) = capture(&TAG_NAME, q) {
                return (
                    MetadataOperation::CountByCategory,
                    none.with_text("tag", tag),
                );
            }
            if let Some(category) = CATEGORY_NAME.iter().find_map(|re| capture(re, q)) {
                return (
                    MetadataOperation::CountByCategory,
                    none.with_text("category", category),
                );
            }
            if IN_CATEGORY.is_match(q) {
                return (MetadataOperation::CountByCategory, none);
            }
            if WITH_TAG.is_match(q) {
                return (MetadataOperation::CountByTag, none);
            }
            if let Some(color) = mentioned_color(q, vocabulary) {
                return (MetadataOperation::CountByColor, none.with_text("color", color));
            }
            if let Some(source_type) = mentioned_source_type(q) {
                return (
                    MetadataOperation::CountByMediaType,
                    none.with_text("source_type", source_type.to_string()),
                );
            }
            return (MetadataOperation::TotalCount, none);
        }

        if LIST_CATEGORIES.is_match(q) {
            return (MetadataOperation::ListCategories, none);
        }
        if LIST_TAGS.is_match(q) {
            return (MetadataOperation::ListTags, none);
        }

        if MEDIA_TYPE.is_match(q) {
            let params = match mentioned_source_type(q) {
                Some(source_type) => none.with_text("source_type", source_type.to_string()),
                None => none,
            };
            return (MetadataOperation::CountByMediaType, params);
        }
        if MEDIA_BREAKDOWN.is_match(q) {
            return (MetadataOperation::CountByMediaType, none);
        }

        if UNREAD.is_match(q) {
            let mut params = none.with("is_read", ParamValue::Bool(false));
            if let Some(tag) = capture(&TAG_NAME, q) {
                params = params.with_text("tag", tag);
            }
            if let Some(days) = period_days(q) {
                params = params.with_integer("days", days);
            }
            return (MetadataOperation::ListByFilter, params);
        }

        if let Some(days) = period_days(q) {
            return (
                MetadataOperation::ArticlesInDateRange,
                none.with_integer("days", days),
            );
        }

        if RECENT.is_match(q) {
            return (
                MetadataOperation::RecentArticles,
                none.with_integer("limit", 10),
            );
        }

        if TOP_SOURCES.is_match(q) {
            let limit = capture(&TOP_N, q)
                .and_then(|n| n.parse::<i64>().ok())
                .unwrap_or(10);
            return (
                MetadataOperation::TopSources,
                none.with_integer("limit", limit),
            );
        }

        if MENTIONS_CATEGORY.is_match(q) {
            return (MetadataOperation::CountByCategory, none);
        }
        if MENTIONS_TAG.is_match(q) {
            return (MetadataOperation::CountByTag, none);
        }
        if MENTIONS_COLOR.is_match(q) {
            return (MetadataOperation::CountByColor, none);
        }

        (MetadataOperation::LibrarySummary, none)
    }
}

#[async_trait]
impl QueryClassifier for RuleBasedClassifier {
    #[instrument(skip(self, query, vocabulary))]
    async fn classify(&self, query: &Query, vocabulary: &Vocabulary) -> Classification {
        if !Self::is_metadata_question(&query.text) {
            debug!("No metadata phrasing, classified as content");
            return Classification::content();
        }
        let (operation, params) = Self::detect_operation(&query.text, vocabulary);
        debug!(%operation, "Detected metadata operation");
        resolve_request(operation, &params, vocabulary, self.strict_vocabulary)
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', '-']).to_string())
        .filter(|s| !s.is_empty())
}

fn mentioned_color(question: &str, vocabulary: &Vocabulary) -> Option<String> {
    question
        .split(|c: char| !c.is_alphanumeric())
        .find(|word| vocabulary.resolve_color(word).is_some())
        .map(str::to_string)
}

fn mentioned_source_type(question: &str) -> Option<SourceType> {
    question
        .split(|c: char| !c.is_alphanumeric())
        .find_map(|word| match word {
            "paper" | "papers" | "arxiv" => Some(SourceType::Arxiv),
            "video" | "videos" => Some(SourceType::Video),
            "pdf" | "pdfs" => Some(SourceType::Pdf),
            "link" | "links" | "webpage" | "webpages" => Some(SourceType::Url),
            _ => None,
        })
}

/// Look-back window named by "last week", "this month", "past year".
fn period_days(q: &str) -> Option<i64> {
    let period = PERIOD.captures(q)?.get(2)?;
    Some(match period.as_str() {
        "month" => 30,
        "year" => 365,
        _ => 7,
    })
}
