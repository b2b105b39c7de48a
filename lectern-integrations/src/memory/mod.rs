//! In-memory library backend.
//!
//! [`InMemoryLibrary`] implements all three read-side collaborators (lexical
//! index, vector index and catalog) over one shared article set. It is
//! suitable for development, tests and small single-user deployments, and can
//! be loaded from or saved to a JSON snapshot.

pub mod bm25;
mod catalog;
pub mod vector;

use async_trait::async_trait;
use lectern_core::{
    LecternError, Result,
    traits::{LexicalIndex, VectorIndex},
    types::{Article, Category, Query, SearchHit},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use bm25::{Bm25Document, Bm25Params};
use vector::cosine_similarity;

/// A category owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedCategory {
    /// Owning user.
    pub owner_id: Uuid,
    /// The category.
    #[serde(flatten)]
    pub category: Category,
}

/// Serializable contents of a library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    /// Declared categories. Categories referenced by articles but not declared
    /// here are treated as top-level.
    #[serde(default)]
    pub categories: Vec<OwnedCategory>,
    /// All articles.
    #[serde(default)]
    pub articles: Vec<Article>,
}

#[derive(Debug, Default)]
struct LibraryState {
    articles: Vec<Article>,
    categories: Vec<OwnedCategory>,
    documents: HashMap<Uuid, Bm25Document>,
}

impl LibraryState {
    fn upsert(&mut self, article: Article) {
        self.documents
            .insert(article.id, Bm25Document::new(article.id, &search_text(&article)));
        match self.articles.iter_mut().find(|a| a.id == article.id) {
            Some(existing) => *existing = article,
            None => self.articles.push(article),
        }
    }

    fn searchable(&self, owner: Uuid) -> impl Iterator<Item = &Article> {
        self.articles.iter().filter(move |a| a.is_searchable_by(owner))
    }
}

/// In-memory articles with BM25, cosine and catalog queries.
///
/// Keyword search returns only articles sharing a term with the question and
/// vector search only articles with positive cosine similarity, so a question
/// on an absent topic retrieves nothing.
///
/// # Examples
///
/// ```rust
/// use lectern_integrations::InMemoryLibrary;
/// use lectern_core::{traits::LexicalIndex, types::{Article, Query}};
/// use uuid::Uuid;
///
/// # tokio_test::block_on(async {
/// let owner = Uuid::new_v4();
/// let library = InMemoryLibrary::new();
/// library
///     .add_article(Article::new(owner, "Ownership in Rust").with_body("Borrowing rules."))
///     .await;
///
/// let hits = library
///     .lexical_search(&Query::new(owner, "borrowing"), 5)
///     .await
///     .unwrap();
/// assert_eq!(hits.len(), 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryLibrary {
    state: Arc<RwLock<LibraryState>>,
    params: Bm25Params,
}

impl InMemoryLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a library from a snapshot.
    pub fn from_snapshot(snapshot: LibrarySnapshot) -> Self {
        let mut state = LibraryState {
            categories: snapshot.categories,
            ..LibraryState::default()
        };
        for article in snapshot.articles {
            state.upsert(article);
        }
        info!(
            articles = state.articles.len(),
            categories = state.categories.len(),
            "Created InMemoryLibrary"
        );
        Self {
            state: Arc::new(RwLock::new(state)),
            params: Bm25Params::default(),
        }
    }

    /// Set the BM25 parameters.
    #[must_use]
    pub fn with_bm25_params(mut self, params: Bm25Params) -> Self {
        self.params = params;
        self
    }

    /// Load a JSON snapshot from `path`.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: LibrarySnapshot = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "Loaded library snapshot");
        Ok(Self::from_snapshot(snapshot))
    }

    /// Save the library as a JSON snapshot to `path`.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.snapshot().await)?;
        tokio::fs::write(path.as_ref(), content).await?;
        Ok(())
    }

    /// Copy out the current contents.
    pub async fn snapshot(&self) -> LibrarySnapshot {
        let state = self.state.read().await;
        LibrarySnapshot {
            categories: state.categories.clone(),
            articles: state.articles.clone(),
        }
    }

    /// Add an article, replacing any article with the same id.
    pub async fn add_article(&self, article: Article) {
        self.state.write().await.upsert(article);
    }

    /// Declare a category for `owner`. Redeclaring a name updates its parent.
    pub async fn add_category(&self, owner: Uuid, category: Category) {
        let mut state = self.state.write().await;
        let existing = state.categories.iter_mut().find(|c| {
            c.owner_id == owner && c.category.name.eq_ignore_ascii_case(&category.name)
        });
        match existing {
            Some(existing) => existing.category = category,
            None => state.categories.push(OwnedCategory {
                owner_id: owner,
                category,
            }),
        }
    }

    /// Remove an article. Returns whether it existed.
    pub async fn remove_article(&self, id: Uuid) -> bool {
        let mut state = self.state.write().await;
        state.documents.remove(&id);
        let before = state.articles.len();
        state.articles.retain(|a| a.id != id);
        state.articles.len() != before
    }

    /// Number of stored articles across all owners.
    pub async fn len(&self) -> usize {
        self.state.read().await.articles.len()
    }

    /// Whether the library is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LexicalIndex for InMemoryLibrary {
    #[instrument(skip(self, query), fields(owner = %query.owner_id))]
    async fn lexical_search(&self, query: &Query, limit: usize) -> Result<Vec<SearchHit>> {
        let state = self.state.read().await;
        let documents: Vec<&Bm25Document> = state
            .searchable(query.owner_id)
            .filter_map(|a| state.documents.get(&a.id))
            .collect();

        let ranked = bm25::score(&documents, &query.text, self.params);
        let articles: HashMap<Uuid, &Article> =
            state.searchable(query.owner_id).map(|a| (a.id, a)).collect();

        let hits: Vec<SearchHit> = ranked
            .into_iter()
            .take(limit)
            .filter_map(|(id, score)| {
                articles
                    .get(&id)
                    .map(|a| SearchHit::new(id, a.title.clone(), excerpt(a), score))
            })
            .collect();
        debug!(hits = hits.len(), candidates = documents.len(), "BM25 search finished");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "memory-bm25"
    }
}

#[async_trait]
impl VectorIndex for InMemoryLibrary {
    #[instrument(skip(self, query, embedding), fields(owner = %query.owner_id, dimension = embedding.len()))]
    async fn vector_search(
        &self,
        query: &Query,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if embedding.is_empty() {
            return Err(LecternError::validation("Query embedding is empty"));
        }
        let state = self.state.read().await;

        let mut scored: Vec<(&Article, f32)> = state
            .searchable(query.owner_id)
            .filter_map(|a| {
                let vector = a.embedding.as_deref()?;
                (vector.len() == embedding.len()).then(|| (a, cosine_similarity(embedding, vector)))
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));

        let hits: Vec<SearchHit> = scored
            .into_iter()
            .take(limit)
            .map(|(a, score)| SearchHit::new(a.id, a.title.clone(), excerpt(a), score))
            .collect();
        debug!(hits = hits.len(), "Cosine search finished");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "memory-cosine"
    }
}

/// Text indexed for keyword search: title, summary, body and tags.
fn search_text(article: &Article) -> String {
    let mut text = article.title.clone();
    for part in [article.summary.as_deref(), article.body.as_deref()]
        .into_iter()
        .flatten()
    {
        text.push('\n');
        text.push_str(part);
    }
    for tag in &article.tags {
        text.push(' ');
        text.push_str(tag);
    }
    text
}

/// Passage returned with a hit: summary and body, or the title alone.
pub(crate) fn excerpt(article: &Article) -> String {
    let parts: Vec<&str> = [article.summary.as_deref(), article.body.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        article.title.clone()
    } else {
        parts.join("\n\n")
    }
}
