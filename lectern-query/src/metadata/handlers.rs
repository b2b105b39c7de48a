//! One handler per metadata operation.
//!
//! Handlers receive parameters that already passed schema validation and
//! entity resolution, so a name parameter here always exists in the library.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use futures::future::BoxFuture;
use lectern_core::{
    Result,
    traits::LibraryCatalog,
    types::{ArticleFilter, CategoryNode, Dimension, MetadataResult, ParamValues, SourceType},
};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use super::schema::DEFAULT_LIST_LIMIT;

/// Signature shared by every handler in the dispatch table.
pub type Handler = for<'a> fn(
    &'a dyn LibraryCatalog,
    Uuid,
    &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>>;

pub(crate) fn total_count<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    _params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move {
        let count = catalog.count_articles(owner, &ArticleFilter::all()).await?;
        Ok(MetadataResult::Count {
            subject: "in your library".to_string(),
            count,
        })
    })
}

pub(crate) fn count_by_category<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move {
        let filter = filter_from_params(params);
        if filter.category.is_some() || filter.tag.is_some() {
            count_matching(catalog, owner, &filter).await
        } else {
            breakdown(catalog, owner, Dimension::Category).await
        }
    })
}

pub(crate) fn count_by_tag<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move {
        let filter = filter_from_params(params);
        if filter.tag.is_some() {
            count_matching(catalog, owner, &filter).await
        } else {
            breakdown(catalog, owner, Dimension::Tag).await
        }
    })
}

pub(crate) fn count_by_media_type<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move {
        let filter = filter_from_params(params);
        if filter.source_type.is_some() {
            count_matching(catalog, owner, &filter).await
        } else {
            breakdown(catalog, owner, Dimension::SourceType).await
        }
    })
}

pub(crate) fn count_by_color<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move {
        let filter = filter_from_params(params);
        if filter.color.is_some() {
            count_matching(catalog, owner, &filter).await
        } else {
            breakdown(catalog, owner, Dimension::Color).await
        }
    })
}

pub(crate) fn list_categories<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    _params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move {
        let roots = catalog.category_tree(owner).await?;
        let total = roots.iter().map(node_count).sum();
        Ok(MetadataResult::CategoryTree { total, roots })
    })
}

pub(crate) fn list_tags<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    _params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move {
        let vocabulary = catalog.vocabulary(owner).await?;
        let counts: HashMap<String, u64> = catalog
            .group_counts(owner, Dimension::Tag)
            .await?
            .into_iter()
            .collect();

        // Unused tags are still tags; list them with zero.
        let mut groups: Vec<(String, u64)> = vocabulary
            .tags
            .into_iter()
            .map(|tag| {
                let count = counts.get(&tag).copied().unwrap_or(0);
                (tag, count)
            })
            .collect();
        sort_groups(&mut groups);

        Ok(MetadataResult::Breakdown {
            dimension: Dimension::Tag.to_string(),
            groups,
        })
    })
}

pub(crate) fn list_by_filter<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move {
        let filter = filter_from_params(params);
        let heading = format!("Articles {}", describe_filter(&filter));
        listing(catalog, owner, &filter, limit_param(params), heading).await
    })
}

pub(crate) fn articles_in_date_range<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move {
        let mut filter = ArticleFilter::all();
        apply_date_params(params, &mut filter);

        let heading = match (params.integer("days"), filter.added_after, filter.added_before) {
            (Some(days), _, None) => format!("Articles saved in the last {days} days"),
            (_, Some(after), Some(before)) => format!(
                "Articles saved between {} and {}",
                after.format("%Y-%m-%d"),
                before.format("%Y-%m-%d")
            ),
            (_, Some(after), None) => format!("Articles saved since {}", after.format("%Y-%m-%d")),
            (_, None, Some(before)) => {
                format!("Articles saved before {}", before.format("%Y-%m-%d"))
            }
            (_, None, None) => "Articles".to_string(),
        };
        listing(catalog, owner, &filter, limit_param(params), heading).await
    })
}

pub(crate) fn recent_articles<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move {
        listing(
            catalog,
            owner,
            &ArticleFilter::all(),
            limit_param(params),
            "Most recently saved articles".to_string(),
        )
        .await
    })
}

pub(crate) fn top_sources<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for raw in catalog.source_urls(owner).await? {
            if let Some(domain) = source_domain(&raw) {
                *counts.entry(domain).or_default() += 1;
            }
        }

        let mut groups: Vec<(String, u64)> = counts.into_iter().collect();
        sort_groups(&mut groups);
        groups.truncate(limit_param(params));

        Ok(MetadataResult::Breakdown {
            dimension: "source".to_string(),
            groups,
        })
    })
}

pub(crate) fn library_summary<'a>(
    catalog: &'a dyn LibraryCatalog,
    owner: Uuid,
    _params: &'a ParamValues,
) -> BoxFuture<'a, Result<MetadataResult>> {
    Box::pin(async move { Ok(MetadataResult::Summary(catalog.library_stats(owner).await?)) })
}

async fn count_matching(
    catalog: &dyn LibraryCatalog,
    owner: Uuid,
    filter: &ArticleFilter,
) -> Result<MetadataResult> {
    let count = catalog.count_articles(owner, filter).await?;
    Ok(MetadataResult::Count {
        subject: describe_filter(filter),
        count,
    })
}

async fn breakdown(
    catalog: &dyn LibraryCatalog,
    owner: Uuid,
    dimension: Dimension,
) -> Result<MetadataResult> {
    let mut groups = catalog.group_counts(owner, dimension).await?;
    sort_groups(&mut groups);
    Ok(MetadataResult::Breakdown {
        dimension: dimension.to_string(),
        groups,
    })
}

async fn listing(
    catalog: &dyn LibraryCatalog,
    owner: Uuid,
    filter: &ArticleFilter,
    limit: usize,
    heading: String,
) -> Result<MetadataResult> {
    let total = catalog.count_articles(owner, filter).await?;
    let articles = catalog.list_articles(owner, filter, limit).await?;
    Ok(MetadataResult::Articles {
        heading,
        total,
        articles,
    })
}

fn filter_from_params(params: &ParamValues) -> ArticleFilter {
    let mut filter = ArticleFilter {
        category: params.text("category").map(str::to_string),
        tag: params.text("tag").map(str::to_string),
        color: params.text("color").map(str::to_string),
        source_type: params
            .text("source_type")
            .and_then(|s| SourceType::from_str(s).ok()),
        is_read: params.boolean("is_read"),
        ..ArticleFilter::default()
    };
    apply_date_params(params, &mut filter);
    filter
}

/// `days` looks back from now; an explicit `after` takes precedence over it.
fn apply_date_params(params: &ParamValues, filter: &mut ArticleFilter) {
    if let Some(days) = params.integer("days") {
        filter.added_after = Some(Utc::now() - Duration::days(days));
    }
    if let Some(after) = params.date("after") {
        filter.added_after = Some(start_of_day(after));
    }
    if let Some(before) = params.date("before") {
        filter.added_before = Some(start_of_day(before));
    }
}

/// Human-readable qualifier for what a filter selects.
pub(crate) fn describe_filter(filter: &ArticleFilter) -> String {
    let mut parts = Vec::new();
    if let Some(category) = &filter.category {
        parts.push(format!("in category \"{category}\""));
    }
    if let Some(tag) = &filter.tag {
        parts.push(format!("tagged \"{tag}\""));
    }
    if let Some(color) = &filter.color {
        parts.push(format!("labelled {color}"));
    }
    if let Some(source_type) = filter.source_type {
        parts.push(format!("of type {source_type}"));
    }
    match filter.is_read {
        Some(true) => parts.push("marked as read".to_string()),
        Some(false) => parts.push("not yet read".to_string()),
        None => {}
    }
    match (filter.added_after, filter.added_before) {
        (Some(after), Some(before)) => parts.push(format!(
            "saved between {} and {}",
            after.format("%Y-%m-%d"),
            before.format("%Y-%m-%d")
        )),
        (Some(after), None) => parts.push(format!("saved since {}", after.format("%Y-%m-%d"))),
        (None, Some(before)) => parts.push(format!("saved before {}", before.format("%Y-%m-%d"))),
        (None, None) => {}
    }
    if parts.is_empty() {
        "in your library".to_string()
    } else {
        parts.join(" and ")
    }
}

fn limit_param(params: &ParamValues) -> usize {
    let limit = params.integer("limit").unwrap_or(DEFAULT_LIST_LIMIT);
    usize::try_from(limit).unwrap_or(1).max(1)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn node_count(node: &CategoryNode) -> u64 {
    1 + node.children.iter().map(node_count).sum::<u64>()
}

/// Largest first, then alphabetical, so equal counts render stably.
fn sort_groups(groups: &mut [(String, u64)]) {
    groups.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

/// Host of a source URL without a leading `www.`.
pub(crate) fn source_domain(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_ascii_lowercase())
}
