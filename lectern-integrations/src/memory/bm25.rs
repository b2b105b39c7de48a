//! BM25 keyword scoring.
//!
//! Document statistics are computed once per article. Collection statistics
//! (document frequencies, average length) are computed per search over the
//! querying owner's searchable articles only, so one owner's library never
//! influences another's ranking.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use uuid::Uuid;

/// BM25 algorithm parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation parameter (typically 1.2)
    pub k1: f32,

    /// Length normalization parameter (typically 0.75)
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Shortest term kept by the tokenizer.
const MIN_TERM_CHARS: usize = 2;

/// English function words dropped by the tokenizer, close to the list
/// PostgreSQL's `english` text search configuration ignores. Without them
/// every English question shares terms with every English article.
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "she", "should",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

static ENGLISH_STOP_WORDS_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

/// Whether `term` (already lowercased) is an English stop word.
pub fn is_stop_word(term: &str) -> bool {
    ENGLISH_STOP_WORDS_SET.contains(term)
}

/// Per-document term statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25Document {
    /// Article the statistics belong to.
    pub article_id: Uuid,
    length: usize,
    term_frequencies: HashMap<String, usize>,
}

impl Bm25Document {
    /// Tokenize `text` and count its terms.
    pub fn new(article_id: Uuid, text: &str) -> Self {
        let terms = tokenize(text);
        let mut term_frequencies = HashMap::new();
        for term in &terms {
            *term_frequencies.entry(term.clone()).or_insert(0) += 1;
        }
        Self {
            article_id,
            length: terms.len(),
            term_frequencies,
        }
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the document has no terms.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Lowercase alphanumeric terms of at least two characters, stop words
/// removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.chars().count() >= MIN_TERM_CHARS && !is_stop_word(term))
        .map(str::to_string)
        .collect()
}

/// Score `documents` against `query`, returning positive scores best first.
///
/// Ties are broken by article id so the ranking is deterministic. IDF uses
/// the `ln(1 + (N - n + 0.5) / (n + 0.5))` form, which stays positive even when
/// a term occurs in most of a small collection.
#[allow(clippy::cast_precision_loss)]
pub fn score(documents: &[&Bm25Document], query: &str, params: Bm25Params) -> Vec<(Uuid, f32)> {
    let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
    if query_terms.is_empty() || documents.is_empty() {
        return Vec::new();
    }

    let total_docs = documents.len() as f32;
    let total_length: usize = documents.iter().map(|d| d.length).sum();
    let avg_doc_length = (total_length as f32 / total_docs).max(1.0);

    let idf: HashMap<&str, f32> = query_terms
        .iter()
        .map(|term| {
            let doc_count = documents
                .iter()
                .filter(|d| d.term_frequencies.contains_key(term))
                .count() as f32;
            let idf = (1.0 + (total_docs - doc_count + 0.5) / (doc_count + 0.5)).ln();
            (term.as_str(), idf)
        })
        .collect();

    let mut results: Vec<(Uuid, f32)> = documents
        .iter()
        .filter_map(|doc| {
            let mut score = 0.0;
            for term in &query_terms {
                let tf = doc.term_frequencies.get(term).copied().unwrap_or(0) as f32;
                if tf > 0.0 {
                    let norm = 1.0 - params.b + params.b * (doc.length as f32 / avg_doc_length);
                    score += idf[term.as_str()] * (tf * (params.k1 + 1.0)) / (tf + params.k1 * norm);
                }
            }
            (score > 0.0).then_some((doc.article_id, score))
        })
        .collect();

    results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    results
}
