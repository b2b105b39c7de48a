//! Category tree assembly shared by the library backends.

use lectern_core::types::{Category, CategoryNode};

/// Build the two-level category tree.
///
/// A category whose parent is unknown is promoted to the top level, so no
/// category is ever dropped. `direct_count` returns the number of articles
/// filed directly under a category name.
pub(crate) fn build_tree(
    categories: &[Category],
    direct_count: impl Fn(&str) -> u64,
) -> Vec<CategoryNode> {
    let known = |name: &str| categories.iter().any(|c| c.name.eq_ignore_ascii_case(name));

    categories
        .iter()
        .filter(|c| c.parent.as_deref().is_none_or(|parent| !known(parent)))
        .map(|root| CategoryNode {
            name: root.name.clone(),
            count: direct_count(&root.name),
            children: categories
                .iter()
                .filter(|c| {
                    c.parent
                        .as_deref()
                        .is_some_and(|p| p.eq_ignore_ascii_case(&root.name))
                })
                .map(|child| CategoryNode {
                    name: child.name.clone(),
                    count: direct_count(&child.name),
                    children: Vec::new(),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orphans_are_promoted() {
        let categories = vec![
            Category::root("Research"),
            Category::child("NLP", "research"),
            Category::child("Baking", "Cooking"),
        ];
        let tree = build_tree(&categories, |name| u64::from(name == "NLP"));
        let names: Vec<&str> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Research", "Baking"]);
        assert_eq!(tree[0].children[0].count, 1);
    }
}
