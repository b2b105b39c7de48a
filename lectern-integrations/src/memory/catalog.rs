//! [`LibraryCatalog`] over the in-memory article set.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use lectern_core::{
    Result,
    traits::{LibraryCatalog, Vocabulary},
    types::{
        Article, ArticleFilter, ArticleSummary, Category, CategoryNode, Dimension, LibraryStats,
    },
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::instrument;
use uuid::Uuid;

use super::{InMemoryLibrary, LibraryState};
use crate::taxonomy::build_tree;

impl LibraryState {
    /// Declared categories plus any category an article is filed under.
    fn categories_of(&self, owner: Uuid) -> Vec<Category> {
        let mut categories: Vec<Category> = self
            .categories
            .iter()
            .filter(|c| c.owner_id == owner)
            .map(|c| c.category.clone())
            .collect();
        for article in self.articles.iter().filter(|a| a.owner_id == owner) {
            for name in &article.categories {
                if !categories.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
                    categories.push(Category::root(name.clone()));
                }
            }
        }
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        categories
    }

    fn matching<'a>(
        &'a self,
        owner: Uuid,
        filter: &'a ArticleFilter,
    ) -> impl Iterator<Item = &'a Article> + 'a {
        self.searchable(owner).filter(move |a| filter.matches(a))
    }
}

fn group_keys(article: &Article, dimension: Dimension) -> Vec<String> {
    match dimension {
        Dimension::Category => article.categories.clone(),
        Dimension::Tag => article.tags.clone(),
        Dimension::SourceType => vec![article.source_type.to_string()],
        Dimension::Color => article.color.iter().cloned().collect(),
    }
}

fn count(iter: impl Iterator) -> u64 {
    u64::try_from(iter.count()).unwrap_or(u64::MAX)
}

#[async_trait]
impl LibraryCatalog for InMemoryLibrary {
    async fn vocabulary(&self, owner: Uuid) -> Result<Vocabulary> {
        let state = self.state.read().await;
        let owned = || state.articles.iter().filter(move |a| a.owner_id == owner);

        let tags: BTreeSet<String> = owned().flat_map(|a| a.tags.iter().cloned()).collect();
        let colors: BTreeSet<String> = owned().filter_map(|a| a.color.clone()).collect();

        Ok(Vocabulary {
            categories: state.categories_of(owner),
            tags: tags.into_iter().collect(),
            colors: colors.into_iter().collect(),
        })
    }

    #[instrument(skip(self, filter))]
    async fn count_articles(&self, owner: Uuid, filter: &ArticleFilter) -> Result<u64> {
        let state = self.state.read().await;
        Ok(count(state.matching(owner, filter)))
    }

    #[instrument(skip(self, filter))]
    async fn list_articles(
        &self,
        owner: Uuid,
        filter: &ArticleFilter,
        limit: usize,
    ) -> Result<Vec<ArticleSummary>> {
        let state = self.state.read().await;
        let mut articles: Vec<&Article> = state.matching(owner, filter).collect();
        articles.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(articles
            .into_iter()
            .take(limit)
            .map(Article::summary_view)
            .collect())
    }

    async fn group_counts(&self, owner: Uuid, dimension: Dimension) -> Result<Vec<(String, u64)>> {
        let state = self.state.read().await;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for article in state.searchable(owner) {
            for key in group_keys(article, dimension) {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        let mut groups: Vec<(String, u64)> = counts.into_iter().collect();
        groups.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(groups)
    }

    async fn category_tree(&self, owner: Uuid) -> Result<Vec<CategoryNode>> {
        let state = self.state.read().await;
        let categories = state.categories_of(owner);
        Ok(build_tree(&categories, |name| {
            count(
                state
                    .searchable(owner)
                    .filter(|a| a.categories.iter().any(|c| c.eq_ignore_ascii_case(name))),
            )
        }))
    }

    async fn source_urls(&self, owner: Uuid) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .searchable(owner)
            .filter_map(|a| a.original_url.clone())
            .collect())
    }

    #[instrument(skip(self))]
    async fn library_stats(&self, owner: Uuid) -> Result<LibraryStats> {
        let state = self.state.read().await;
        let week_ago = Utc::now() - Duration::days(7);

        let mut stats = LibraryStats::default();
        let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_source_type: BTreeMap<String, u64> = BTreeMap::new();
        let mut tags: BTreeSet<&str> = BTreeSet::new();

        for article in state.articles.iter().filter(|a| a.owner_id == owner) {
            stats.total += 1;
            *by_status.entry(article.status.to_string()).or_insert(0) += 1;
            tags.extend(article.tags.iter().map(String::as_str));
            if article.is_searchable_by(owner) {
                *by_source_type
                    .entry(article.source_type.to_string())
                    .or_insert(0) += 1;
                if article.created_at >= week_ago {
                    stats.added_this_week += 1;
                }
            }
        }

        stats.by_status = by_status;
        stats.by_source_type = by_source_type;
        stats.categories = count(state.categories_of(owner).iter());
        stats.tags = count(tags.iter());
        Ok(stats)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
