//! Deterministic text rendering of metadata results.
//!
//! Metadata answers never go through the generative model, so this is the
//! exact text the user sees.

use lectern_core::types::{CategoryNode, LibraryStats, MetadataResult};
use std::fmt::Write as _;

/// Most groups listed in a breakdown.
pub const MAX_RENDERED_GROUPS: usize = 20;

/// Render a result for display.
pub fn render(result: &MetadataResult) -> String {
    match result {
        MetadataResult::Count { subject, count } => {
            format!("You have {count} {} {subject}.", noun(*count))
        }
        MetadataResult::Breakdown { dimension, groups } => render_breakdown(dimension, groups),
        MetadataResult::CategoryTree { total, roots } => render_tree(*total, roots),
        MetadataResult::Articles {
            heading,
            total,
            articles,
        } => {
            if articles.is_empty() {
                return format!("{heading}: none found.");
            }
            let mut out = format!("{heading} ({total} total):\n");
            for article in articles {
                let _ = writeln!(
                    out,
                    "- {} ({}, {})",
                    article.title,
                    article.source_type,
                    article.created_at.format("%Y-%m-%d")
                );
            }
            if *total > articles.len() as u64 {
                let _ = writeln!(out, "...and {} more.", *total - articles.len() as u64);
            }
            out.trim_end().to_string()
        }
        MetadataResult::Summary(stats) => render_summary(stats),
        MetadataResult::NotFound { entity, name } => {
            format!("There is no {entity} named \"{name}\" in your library.")
        }
    }
}

fn noun(count: u64) -> &'static str {
    if count == 1 { "article" } else { "articles" }
}

fn render_breakdown(dimension: &str, groups: &[(String, u64)]) -> String {
    if groups.is_empty() {
        return format!("No articles found by {dimension}.");
    }
    let mut out = format!("Articles by {dimension}:\n");
    for (name, count) in groups.iter().take(MAX_RENDERED_GROUPS) {
        let _ = writeln!(out, "- {name}: {count} {}", noun(*count));
    }
    if groups.len() > MAX_RENDERED_GROUPS {
        let _ = writeln!(out, "...and {} more.", groups.len() - MAX_RENDERED_GROUPS);
    }
    out.trim_end().to_string()
}

fn render_tree(total: u64, roots: &[CategoryNode]) -> String {
    if roots.is_empty() {
        return "You have no categories yet.".to_string();
    }
    let mut out = format!("You have {total} categories:\n");
    for root in roots {
        let _ = writeln!(out, "- {} ({} {})", root.name, root.count, noun(root.count));
        for child in &root.children {
            let _ = writeln!(out, "  └─ {} ({} {})", child.name, child.count, noun(child.count));
        }
    }
    out.trim_end().to_string()
}

fn render_summary(stats: &LibraryStats) -> String {
    let mut out = String::from("Library summary:\n");
    let _ = writeln!(out, "- Total articles: {}", stats.total);
    let _ = writeln!(out, "- Added this week: {}", stats.added_this_week);
    let _ = writeln!(out, "- Categories: {}", stats.categories);
    let _ = writeln!(out, "- Tags: {}", stats.tags);
    if !stats.by_source_type.is_empty() {
        out.push_str("\nBy type:\n");
        for (source_type, count) in &stats.by_source_type {
            let _ = writeln!(out, "- {source_type}: {count}");
        }
    }
    if !stats.by_status.is_empty() {
        out.push_str("\nBy status:\n");
        for (status, count) in &stats.by_status {
            let _ = writeln!(out, "- {status}: {count}");
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_count_rendering() {
        let result = MetadataResult::Count {
            subject: "tagged \"machine-learning\"".into(),
            count: 7,
        };
        assert_eq!(
            render(&result),
            "You have 7 articles tagged \"machine-learning\"."
        );

        let single = MetadataResult::Count {
            subject: "in your library".into(),
            count: 1,
        };
        assert_eq!(render(&single), "You have 1 article in your library.");
    }

    #[test]
    fn test_not_found_rendering_differs_from_zero() {
        let missing = render(&MetadataResult::not_found("category", "Cooking"));
        let zero = render(&MetadataResult::Count {
            subject: "in category \"Cooking\"".into(),
            count: 0,
        });
        assert_eq!(missing, "There is no category named \"Cooking\" in your library.");
        assert_eq!(zero, "You have 0 articles in category \"Cooking\".");
    }

    #[test]
    fn test_tree_rendering() {
        let roots = vec![CategoryNode {
            name: "Research".into(),
            count: 3,
            children: vec![CategoryNode {
                name: "NLP".into(),
                count: 1,
                children: Vec::new(),
            }],
        }];
        assert_eq!(
            render(&MetadataResult::CategoryTree { total: 2, roots }),
            "You have 2 categories:\n- Research (3 articles)\n  └─ NLP (1 article)"
        );
    }

    #[test]
    fn test_breakdown_is_capped() {
        let groups: Vec<(String, u64)> = (0..25).map(|i| (format!("tag{i:02}"), 1)).collect();
        let text = render(&MetadataResult::Breakdown {
            dimension: "tag".into(),
            groups,
        });
        assert!(text.contains("tag19"));
        assert!(!text.contains("tag20"));
        assert!(text.ends_with("...and 5 more."));
    }
}
