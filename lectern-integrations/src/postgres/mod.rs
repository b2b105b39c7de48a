//! PostgreSQL library backend.
//!
//! Reads the tables the ingestion pipeline writes: `articles` (with a
//! `search_vector` tsvector and a pgvector `embedding` column), `categories`,
//! `article_categories`, `tags`, `article_tags` and `colors`. Keyword search
//! uses `ts_rank` over `plainto_tsquery('english', ..)`; vector search uses
//! pgvector cosine distance (`<=>`), reported as `max(0, 1 - distance)`.
//!
//! Every statement binds its parameters and filters on the owner.

use async_trait::async_trait;
use lectern_core::{
    LecternError, Result,
    traits::{LexicalIndex, LibraryCatalog, VectorIndex, Vocabulary},
    types::{
        ArticleFilter, ArticleSummary, Category, CategoryNode, Dimension, LibraryStats, Query,
        SearchHit, SourceType,
    },
};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgPoolOptions, postgres::PgRow};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::taxonomy::build_tree;

const COMPLETED: &str = "completed";

/// Passage text for a hit: summary and extracted text, or the title alone.
const EXCERPT_SQL: &str = "COALESCE(NULLIF(CONCAT_WS(E'\\n\\n', NULLIF(a.summary, ''), \
     NULLIF(a.extracted_text, '')), ''), a.title)";

/// Library backed by PostgreSQL with the pgvector extension.
#[derive(Debug, Clone)]
pub struct PgLibrary {
    pool: PgPool,
    min_similarity: f32,
}

impl PgLibrary {
    /// Connect to `database_url` with a pool of at most `max_connections`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| LecternError::storage(format!("Failed to create database pool: {e}")))?;
        info!(max_connections, "Connected PgLibrary");
        Ok(Self::with_pool(pool))
    }

    /// Use an existing pool.
    pub fn with_pool(pool: PgPool) -> Self {
        Self {
            pool,
            min_similarity: 0.0,
        }
    }

    /// Only return vector hits whose cosine similarity is strictly above
    /// `min_similarity`. Defaults to `0`, which drops orthogonal and opposed
    /// articles.
    #[must_use]
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Nearest completed articles by cosine distance, above `min_similarity`.
    fn vector_query(
        owner: Uuid,
        literal: &str,
        min_similarity: f32,
        limit: usize,
    ) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT a.id, a.title, {EXCERPT_SQL} AS excerpt, \
             GREATEST(0, 1 - (a.embedding <=> "
        ));
        builder
            .push_bind(literal.to_string())
            .push("::vector))::real AS score");
        Self::push_scope(&mut builder, owner);
        builder
            .push(" AND a.embedding IS NOT NULL AND 1 - (a.embedding <=> ")
            .push_bind(literal.to_string())
            .push("::vector) > ")
            .push_bind(f64::from(min_similarity))
            .push(" ORDER BY a.embedding <=> ")
            .push_bind(literal.to_string())
            .push("::vector, a.id ASC LIMIT ")
            .push_bind(limit_param(limit));
        builder
    }

    /// `FROM articles a WHERE ..` restricted to the owner's completed articles.
    fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, owner: Uuid) {
        builder
            .push(" FROM articles a WHERE a.user_id = ")
            .push_bind(owner)
            .push(" AND a.processing_status = ")
            .push_bind(COMPLETED);
    }

    /// Apply `filter` as `AND ..` clauses over the alias `a`.
    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ArticleFilter) {
        if let Some(category) = &filter.category {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM article_categories ac \
                     JOIN categories c ON c.id = ac.category_id \
                     WHERE ac.article_id = a.id AND LOWER(c.name) = LOWER(",
                )
                .push_bind(category.clone())
                .push("))");
        }
        if let Some(tag) = &filter.tag {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM article_tags at \
                     JOIN tags t ON t.id = at.tag_id \
                     WHERE at.article_id = a.id AND LOWER(t.name) = LOWER(",
                )
                .push_bind(tag.clone())
                .push("))");
        }
        if let Some(color) = &filter.color {
            builder
                .push(" AND a.color_id IN (SELECT id FROM colors WHERE LOWER(name) = LOWER(")
                .push_bind(color.clone())
                .push("))");
        }
        if let Some(source_type) = filter.source_type {
            builder
                .push(" AND a.source_type = ")
                .push_bind(source_type.to_string());
        }
        if let Some(is_read) = filter.is_read {
            builder.push(" AND a.is_read = ").push_bind(is_read);
        }
        if let Some(after) = filter.added_after {
            builder.push(" AND a.created_at >= ").push_bind(after);
        }
        if let Some(before) = filter.added_before {
            builder.push(" AND a.created_at < ").push_bind(before);
        }
    }

    /// Run a `name, count` grouping query bound to `(owner, COMPLETED)`.
    async fn fetch_groups(&self, sql: &str, owner: Uuid) -> Result<Vec<(String, u64)>> {
        let rows = sqlx::query(sql)
            .bind(owner)
            .bind(COMPLETED)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.iter()
            .map(|row| Ok((row.try_get("name").map_err(storage_error)?, get_count(row)?)))
            .collect()
    }

    /// Run a single-`count` query bound to `owner`.
    async fn scalar(&self, sql: &str, owner: Uuid) -> Result<u64> {
        let row = sqlx::query(sql)
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
        get_count(&row)
    }

    async fn categories(&self, owner: Uuid) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT c.name, p.name AS parent FROM categories c \
             LEFT JOIN categories p ON p.id = c.parent_id \
             WHERE c.user_id = $1 ORDER BY c.name",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter()
            .map(|row| {
                Ok(Category {
                    name: row.try_get("name").map_err(storage_error)?,
                    parent: row.try_get("parent").map_err(storage_error)?,
                })
            })
            .collect()
    }

    async fn names(&self, table: &str, owner: Uuid) -> Result<Vec<String>> {
        let sql = format!("SELECT name FROM {table} WHERE user_id = $1 ORDER BY name");
        let rows = sqlx::query(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.iter()
            .map(|row| row.try_get("name").map_err(storage_error))
            .collect()
    }
}

fn storage_error(error: sqlx::Error) -> LecternError {
    LecternError::storage(error.to_string())
}

fn get_count(row: &PgRow) -> Result<u64> {
    let count: i64 = row.try_get("count").map_err(storage_error)?;
    Ok(u64::try_from(count).unwrap_or(0))
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// pgvector text form, e.g. `[0.1,0.2]`.
fn vector_literal(embedding: &[f32]) -> String {
    let mut literal = String::with_capacity(embedding.len() * 8 + 2);
    literal.push('[');
    for (i, value) in embedding.iter().enumerate() {
        if i > 0 {
            literal.push(',');
        }
        let _ = write!(literal, "{value}");
    }
    literal.push(']');
    literal
}

fn hit_from_row(row: &PgRow) -> Result<SearchHit> {
    Ok(SearchHit::new(
        row.try_get::<Uuid, _>("id").map_err(storage_error)?,
        row.try_get::<String, _>("title").map_err(storage_error)?,
        row.try_get::<String, _>("excerpt").map_err(storage_error)?,
        row.try_get::<f32, _>("score").map_err(storage_error)?,
    ))
}

fn summary_from_row(row: &PgRow) -> Result<ArticleSummary> {
    let source_type: String = row.try_get("source_type").map_err(storage_error)?;
    Ok(ArticleSummary {
        id: row.try_get("id").map_err(storage_error)?,
        title: row.try_get("title").map_err(storage_error)?,
        source_type: SourceType::from_str(&source_type).unwrap_or_else(|_| {
            warn!(%source_type, "Unknown source type, listing as url");
            SourceType::Url
        }),
        original_url: row.try_get("original_url").map_err(storage_error)?,
        created_at: row.try_get("created_at").map_err(storage_error)?,
        is_read: row.try_get("is_read").map_err(storage_error)?,
    })
}

#[async_trait]
impl LexicalIndex for PgLibrary {
    #[instrument(skip(self, query), fields(owner = %query.owner_id))]
    async fn lexical_search(&self, query: &Query, limit: usize) -> Result<Vec<SearchHit>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT a.id, a.title, {EXCERPT_SQL} AS excerpt, \
             ts_rank(a.search_vector, plainto_tsquery('english', "
        ));
        builder.push_bind(query.text.clone()).push("))::real AS score");
        Self::push_scope(&mut builder, query.owner_id);
        builder
            .push(" AND a.search_vector @@ plainto_tsquery('english', ")
            .push_bind(query.text.clone())
            .push(") ORDER BY score DESC, a.id ASC LIMIT ")
            .push_bind(limit_param(limit));

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LecternError::search("postgres-fulltext", e.to_string()))?;
        debug!(hits = rows.len(), "Full-text search finished");
        rows.iter().map(hit_from_row).collect()
    }

    fn name(&self) -> &str {
        "postgres-fulltext"
    }
}

#[async_trait]
impl VectorIndex for PgLibrary {
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
        let mut builder = Self::vector_query(
            query.owner_id,
            &vector_literal(embedding),
            self.min_similarity,
            limit,
        );

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LecternError::search("pgvector", e.to_string()))?;
        debug!(hits = rows.len(), "Vector search finished");
        rows.iter().map(hit_from_row).collect()
    }

    fn name(&self) -> &str {
        "pgvector"
    }
}

#[async_trait]
impl LibraryCatalog for PgLibrary {
    async fn vocabulary(&self, owner: Uuid) -> Result<Vocabulary> {
        Ok(Vocabulary {
            categories: self.categories(owner).await?,
            tags: self.names("tags", owner).await?,
            colors: self.names("colors", owner).await?,
        })
    }

    #[instrument(skip(self, filter))]
    async fn count_articles(&self, owner: Uuid, filter: &ArticleFilter) -> Result<u64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) AS count");
        Self::push_scope(&mut builder, owner);
        Self::push_filter(&mut builder, filter);
        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
        get_count(&row)
    }

    #[instrument(skip(self, filter))]
    async fn list_articles(
        &self,
        owner: Uuid,
        filter: &ArticleFilter,
        limit: usize,
    ) -> Result<Vec<ArticleSummary>> {
        let mut builder = QueryBuilder::new(
            "SELECT a.id, a.title, a.source_type, a.original_url, a.created_at, a.is_read",
        );
        Self::push_scope(&mut builder, owner);
        Self::push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY a.created_at DESC, a.id ASC LIMIT ")
            .push_bind(limit_param(limit));
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.iter().map(summary_from_row).collect()
    }

    async fn group_counts(&self, owner: Uuid, dimension: Dimension) -> Result<Vec<(String, u64)>> {
        let sql = match dimension {
            Dimension::Category => {
                "SELECT c.name, COUNT(DISTINCT a.id) AS count FROM categories c \
                 JOIN article_categories ac ON ac.category_id = c.id \
                 JOIN articles a ON a.id = ac.article_id \
                 WHERE a.user_id = $1 AND a.processing_status = $2 \
                 GROUP BY c.name ORDER BY count DESC, c.name"
            }
            Dimension::Tag => {
                "SELECT t.name, COUNT(DISTINCT a.id) AS count FROM tags t \
                 JOIN article_tags at ON at.tag_id = t.id \
                 JOIN articles a ON a.id = at.article_id \
                 WHERE a.user_id = $1 AND a.processing_status = $2 \
                 GROUP BY t.name ORDER BY count DESC, t.name"
            }
            Dimension::SourceType => {
                "SELECT a.source_type AS name, COUNT(*) AS count FROM articles a \
                 WHERE a.user_id = $1 AND a.processing_status = $2 \
                 GROUP BY a.source_type ORDER BY count DESC, a.source_type"
            }
            Dimension::Color => {
                "SELECT co.name, COUNT(*) AS count FROM articles a \
                 JOIN colors co ON co.id = a.color_id \
                 WHERE a.user_id = $1 AND a.processing_status = $2 \
                 GROUP BY co.name ORDER BY count DESC, co.name"
            }
        };
        self.fetch_groups(sql, owner).await
    }

    async fn category_tree(&self, owner: Uuid) -> Result<Vec<CategoryNode>> {
        let categories = self.categories(owner).await?;
        let counts: HashMap<String, u64> = self
            .group_counts(owner, Dimension::Category)
            .await?
            .into_iter()
            .collect();
        Ok(build_tree(&categories, |name| {
            counts.get(name).copied().unwrap_or(0)
        }))
    }

    async fn source_urls(&self, owner: Uuid) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT a.original_url FROM articles a \
             WHERE a.user_id = $1 AND a.processing_status = $2 AND a.original_url IS NOT NULL",
        )
        .bind(owner)
        .bind(COMPLETED)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        rows.iter()
            .map(|row| row.try_get("original_url").map_err(storage_error))
            .collect()
    }

    #[instrument(skip(self))]
    async fn library_stats(&self, owner: Uuid) -> Result<LibraryStats> {
        let rows = sqlx::query(
            "SELECT processing_status AS name, COUNT(*) AS count FROM articles \
             WHERE user_id = $1 GROUP BY processing_status",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        let by_status = rows
            .iter()
            .map(|row| Ok((row.try_get("name").map_err(storage_error)?, get_count(row)?)))
            .collect::<Result<BTreeMap<String, u64>>>()?;
        let by_source_type: BTreeMap<String, u64> = self
            .group_counts(owner, Dimension::SourceType)
            .await?
            .into_iter()
            .collect();

        Ok(LibraryStats {
            total: by_status.values().sum(),
            by_status,
            by_source_type,
            categories: self
                .scalar("SELECT COUNT(*) AS count FROM categories WHERE user_id = $1", owner)
                .await?,
            tags: self
                .scalar("SELECT COUNT(*) AS count FROM tags WHERE user_id = $1", owner)
                .await?,
            added_this_week: self
                .scalar(
                    "SELECT COUNT(*) AS count FROM articles \
                     WHERE user_id = $1 AND processing_status = 'completed' \
                     AND created_at >= NOW() - INTERVAL '7 days'",
                    owner,
                )
                .await?,
        })
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[0.5, -1.0, 2.25]), "[0.5,-1,2.25]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn test_filter_binds_every_value() {
        let filter = ArticleFilter {
            tag: Some("rust".into()),
            is_read: Some(false),
            ..ArticleFilter::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS count");
        PgLibrary::push_scope(&mut builder, Uuid::nil());
        PgLibrary::push_filter(&mut builder, &filter);
        let sql = builder.sql();
        assert!(sql.contains("a.user_id = $1"));
        assert!(sql.contains("LOWER(t.name) = LOWER($3)"));
        assert!(sql.contains("a.is_read = $4"));
        assert!(!sql.contains("rust"));
    }

    #[test]
    fn test_vector_query_applies_similarity_floor() {
        let builder = PgLibrary::vector_query(Uuid::nil(), "[1,0]", 0.2, 5);
        let sql = builder.sql();
        // $1 literal, $2 owner, $3 status, $4 literal, $5 floor, $6 literal, $7 limit
        assert!(sql.contains("AND 1 - (a.embedding <=> $4::vector) > $5"));
        assert!(sql.contains("ORDER BY a.embedding <=> $6::vector, a.id ASC LIMIT $7"));
        assert!(!sql.contains("0.2"));
    }
}
