use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::models::{Category, FlowType, Page};

pub const INCOME_ROOT_ID: &str = "2-1";
pub const EXPENSE_ROOT_ID: &str = "2-2";
pub const INCOME_FALLBACK_ID: &str = "2-1-999";
pub const EXPENSE_FALLBACK_ID: &str = "2-2-999";

/// Text that marks a page as the top-level income/expense summary ("total income").
pub const DEFAULT_SUMMARY_MARKER: &str = "収入総額";

pub fn root_id(flow: FlowType) -> &'static str {
    match flow {
        FlowType::Income => INCOME_ROOT_ID,
        FlowType::Expense => EXPENSE_ROOT_ID,
    }
}

pub fn fallback_id(flow: FlowType) -> &'static str {
    match flow {
        FlowType::Income => INCOME_FALLBACK_ID,
        FlowType::Expense => EXPENSE_FALLBACK_ID,
    }
}

fn fixed_categories() -> Vec<Category> {
    let node = |id: &str, name: &str, parent: Option<&str>, direction| Category {
        id: id.to_string(),
        name: name.to_string(),
        parent_id: parent.map(str::to_string),
        direction,
    };
    vec![
        node(INCOME_ROOT_ID, "総収入", None, FlowType::Income),
        node(INCOME_FALLBACK_ID, "no parent(income)", Some(INCOME_ROOT_ID), FlowType::Income),
        node(EXPENSE_ROOT_ID, "総支出", None, FlowType::Expense),
        node(EXPENSE_FALLBACK_ID, "no parent(expense)", Some(EXPENSE_ROOT_ID), FlowType::Expense),
    ]
}

// ---------------------------------------------------------------------------
// Summary page detection
// ---------------------------------------------------------------------------

pub fn is_summary_page(page: &Page, marker: &str) -> bool {
    page.rows.iter().any(|row| {
        row.full_data
            .values()
            .any(|v| matches!(v, Value::String(s) if s.contains(marker)))
    })
}

/// Flags each page by position. Pages sharing a page number are judged independently.
pub fn find_summary_pages(pages: &[Page], marker: &str) -> Vec<bool> {
    pages
        .iter()
        .map(|page| {
            let found = is_summary_page(page, marker);
            if found {
                tracing::info!(page = %page.label(), "found summary page");
            }
            found
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Category tree
// ---------------------------------------------------------------------------

/// Categories in creation order plus the `(direction, name) -> id` mapping.
#[derive(Debug, Clone)]
pub struct CategoryTree {
    pub categories: Vec<Category>,
    mapping: HashMap<(FlowType, String), String>,
}

impl CategoryTree {
    /// Starts with the fixed categories, mapped under their own names so rows
    /// naming a root or fallback reuse it.
    fn new() -> Self {
        let categories = fixed_categories();
        let mapping = categories
            .iter()
            .map(|c| ((c.direction, c.name.clone()), c.id.clone()))
            .collect();
        Self { categories, mapping }
    }

    pub fn get(&self, flow: FlowType, name: &str) -> Option<&str> {
        self.mapping
            .get(&(flow, name.to_string()))
            .map(String::as_str)
    }

    /// Mapped id for the key, or the direction's fallback bucket.
    pub fn resolve(&self, flow: FlowType, name: &str) -> &str {
        self.get(flow, name).unwrap_or(fallback_id(flow))
    }

    #[cfg(test)]
    pub fn mapped_len(&self) -> usize {
        self.mapping.len()
    }

    fn insert(&mut self, category: Category) {
        self.mapping.insert(
            (category.direction, category.name.clone()),
            category.id.clone(),
        );
        self.categories.push(category);
    }
}

/// Loose relation between a summary-page category and another category name.
pub fn reference_matches(reference: &str, category: &str) -> bool {
    category.starts_with(reference)
        || reference.starts_with(category)
        || reference.split_whitespace().any(|token| category.contains(token))
}

fn top_level_references(pages: &[Page], summary: &[bool]) -> Vec<(FlowType, String)> {
    let mut seen = HashSet::new();
    let mut references = Vec::new();
    for (page, _) in pages.iter().zip(summary).filter(|(_, is_summary)| **is_summary) {
        for (flow, name) in page.rows.iter().filter_map(|r| r.key()) {
            if seen.insert((flow, name.to_string())) {
                references.push((flow, name.to_string()));
            }
        }
    }
    references
}

fn find_parent(
    tree: &CategoryTree,
    references: &[(FlowType, String)],
    flow: FlowType,
    name: &str,
) -> String {
    // The first matching reference decides, even when it has no id yet.
    let matched = references
        .iter()
        .find(|(ref_flow, ref_name)| *ref_flow == flow && reference_matches(ref_name, name));
    match matched.and_then(|(ref_flow, ref_name)| tree.get(*ref_flow, ref_name)) {
        Some(parent) => parent.to_string(),
        None => {
            tracing::debug!(%flow, category = name, "no parent category, using fallback");
            fallback_id(flow).to_string()
        }
    }
}

/// Builds the category tree from every page, in page then row order.
pub fn build_categories(pages: &[Page], marker: &str) -> CategoryTree {
    let summary = find_summary_pages(pages, marker);
    let references = top_level_references(pages, &summary);

    let mut tree = CategoryTree::new();
    let mut next_index: u32 = 1;

    for (page, &is_summary) in pages.iter().zip(&summary) {
        for (flow, name) in page.rows.iter().filter_map(|r| r.key()) {
            if tree.get(flow, name).is_some() {
                continue;
            }
            let parent_id = if is_summary {
                root_id(flow).to_string()
            } else {
                find_parent(&tree, &references, flow, name)
            };
            let id = format!("{parent_id}-{next_index}");
            next_index += 1;
            tree.insert(Category {
                id,
                name: name.to_string(),
                parent_id: Some(parent_id),
                direction: flow,
            });
        }
    }

    tracing::debug!(
        categories = tree.categories.len(),
        references = references.len(),
        "built category tree"
    );
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Row;
    use serde_json::json;

    fn row(flow: FlowType, category: &str) -> Row {
        Row {
            flow_type: Some(flow),
            category: Some(category.to_string()),
            ..Row::default()
        }
    }

    fn summary_row(flow: FlowType, category: &str) -> Row {
        let mut r = row(flow, category);
        r.full_data.insert("x".into(), json!("収入総額 1000"));
        r
    }

    fn find<'a>(tree: &'a CategoryTree, flow: FlowType, name: &str) -> &'a Category {
        tree.categories
            .iter()
            .find(|c| c.direction == flow && c.name == name)
            .unwrap()
    }

    #[test]
    fn test_fixed_categories_always_present() {
        let tree = build_categories(&[], DEFAULT_SUMMARY_MARKER);
        let ids: Vec<_> = tree.categories.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["2-1", "2-1-999", "2-2", "2-2-999"]);
        assert_eq!(tree.categories[0].name, "総収入");
        assert_eq!(tree.categories[1].parent_id.as_deref(), Some("2-1"));
        assert_eq!(tree.categories[3].parent_id.as_deref(), Some("2-2"));
        assert!(tree.categories[2].parent_id.is_none());
    }

    #[test]
    fn test_detects_summary_page_by_marker() {
        let plain = Page::new(1, vec![row(FlowType::Income, "寄付")]);
        let summary = Page::new(2, vec![summary_row(FlowType::Income, "寄付")]);
        assert!(!is_summary_page(&plain, DEFAULT_SUMMARY_MARKER));
        assert!(is_summary_page(&summary, DEFAULT_SUMMARY_MARKER));
    }

    #[test]
    fn test_marker_in_non_string_field_is_ignored() {
        let mut r = row(FlowType::Income, "寄付");
        r.full_data.insert("x".into(), json!(["収入総額"]));
        let page = Page::new(1, vec![r]);
        assert!(!is_summary_page(&page, DEFAULT_SUMMARY_MARKER));
    }

    #[test]
    fn test_summary_flags_follow_page_position() {
        let pages = vec![
            Page::new("unknown", vec![summary_row(FlowType::Income, "寄付")]),
            Page::new("unknown", vec![row(FlowType::Income, "会費")]),
        ];
        assert_eq!(find_summary_pages(&pages, DEFAULT_SUMMARY_MARKER), [true, false]);
    }

    #[test]
    fn test_summary_rows_parented_to_root() {
        let pages = vec![Page::new(
            1,
            vec![summary_row(FlowType::Income, "寄付"), row(FlowType::Expense, "経常経費")],
        )];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        let donation = find(&tree, FlowType::Income, "寄付");
        assert_eq!(donation.id, "2-1-1");
        assert_eq!(donation.parent_id.as_deref(), Some("2-1"));
        let expense = find(&tree, FlowType::Expense, "経常経費");
        assert_eq!(expense.id, "2-2-2");
        assert_eq!(expense.parent_id.as_deref(), Some("2-2"));
    }

    #[test]
    fn test_prefix_match_links_to_summary_category() {
        let pages = vec![
            Page::new(1, vec![summary_row(FlowType::Income, "寄付")]),
            Page::new(2, vec![row(FlowType::Income, "寄付（個人）")]),
        ];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        let child = find(&tree, FlowType::Income, "寄付（個人）");
        assert_eq!(child.parent_id.as_deref(), Some("2-1-1"));
        assert_eq!(child.id, "2-1-1-2");
    }

    #[test]
    fn test_substring_match_links_to_summary_category() {
        let pages = vec![
            Page::new(1, vec![summary_row(FlowType::Income, "寄付")]),
            Page::new(2, vec![row(FlowType::Income, "個人からの寄付")]),
        ];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        let child = find(&tree, FlowType::Income, "個人からの寄付");
        assert_eq!(child.parent_id.as_deref(), Some("2-1-1"));
    }

    #[test]
    fn test_category_prefix_of_reference_matches() {
        let pages = vec![
            Page::new(1, vec![summary_row(FlowType::Expense, "政治活動費")]),
            Page::new(2, vec![row(FlowType::Expense, "政治")]),
        ];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        assert_eq!(find(&tree, FlowType::Expense, "政治").parent_id.as_deref(), Some("2-2-1"));
    }

    #[test]
    fn test_reference_matches_rules() {
        assert!(reference_matches("寄付", "寄付金"));
        assert!(reference_matches("寄付金", "寄付"));
        assert!(reference_matches("事業 収入", "機関紙の事業"));
        assert!(!reference_matches("寄付", "会費"));
        assert!(!reference_matches("Dues", "dues paid"));
    }

    #[test]
    fn test_unrelated_category_goes_to_fallback() {
        let pages = vec![
            Page::new(1, vec![summary_row(FlowType::Income, "寄付")]),
            Page::new(
                2,
                vec![row(FlowType::Income, "会費"), row(FlowType::Expense, "人件費")],
            ),
        ];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        assert_eq!(find(&tree, FlowType::Income, "会費").parent_id.as_deref(), Some("2-1-999"));
        let unrelated = find(&tree, FlowType::Expense, "人件費");
        assert_eq!(unrelated.parent_id.as_deref(), Some("2-2-999"));
    }

    #[test]
    fn test_match_requires_same_direction() {
        let pages = vec![
            Page::new(1, vec![summary_row(FlowType::Income, "寄付")]),
            Page::new(2, vec![row(FlowType::Expense, "寄付金")]),
        ];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        let other_direction = find(&tree, FlowType::Expense, "寄付金");
        assert_eq!(other_direction.parent_id.as_deref(), Some("2-2-999"));
    }

    #[test]
    fn test_counter_is_shared_across_parents() {
        let pages = vec![
            Page::new(
                1,
                vec![summary_row(FlowType::Income, "寄付"), row(FlowType::Expense, "経費")],
            ),
            Page::new(2, vec![row(FlowType::Income, "会費"), row(FlowType::Income, "寄付金")]),
        ];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        let ids: Vec<_> = tree.categories[4..].iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["2-1-1", "2-2-2", "2-1-999-3", "2-1-1-4"]);
    }

    #[test]
    fn test_repeated_key_creates_one_category() {
        let pages = vec![
            Page::new(1, vec![row(FlowType::Income, "会費")]),
            Page::new(2, vec![row(FlowType::Income, "会費")]),
        ];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        assert_eq!(tree.categories.len(), 5);
        assert_eq!(tree.mapped_len(), 5);
        assert_eq!(tree.get(FlowType::Income, "会費"), Some("2-1-999-1"));
    }

    #[test]
    fn test_first_seen_key_keeps_its_parent() {
        // Seen on a plain page first, so the summary page does not re-link it.
        let pages = vec![
            Page::new(1, vec![row(FlowType::Income, "寄付")]),
            Page::new(2, vec![summary_row(FlowType::Income, "寄付")]),
        ];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        assert_eq!(tree.categories.len(), 5);
        assert_eq!(find(&tree, FlowType::Income, "寄付").parent_id.as_deref(), Some("2-1-999"));
    }

    #[test]
    fn test_unassigned_reference_falls_back() {
        let pages = vec![
            Page::new(1, vec![row(FlowType::Income, "個人からの寄付")]),
            Page::new(2, vec![summary_row(FlowType::Income, "寄付")]),
        ];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        let child = find(&tree, FlowType::Income, "個人からの寄付");
        assert_eq!(child.parent_id.as_deref(), Some("2-1-999"));
        assert_eq!(find(&tree, FlowType::Income, "寄付").id, "2-1-2");
    }

    #[test]
    fn test_rows_without_key_are_ignored() {
        let mut no_category = row(FlowType::Income, "x");
        no_category.category = None;
        let no_flow = Row {
            category: Some("寄付".into()),
            ..Row::default()
        };
        let pages = vec![Page::new(1, vec![no_category, no_flow])];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        assert_eq!(tree.categories.len(), 4);
    }

    #[test]
    fn test_empty_category_is_a_valid_key() {
        let pages = vec![Page::new(1, vec![row(FlowType::Expense, " ")])];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        assert_eq!(tree.get(FlowType::Expense, " "), Some("2-2-999-1"));
    }

    #[test]
    fn test_same_name_in_both_directions_stays_distinct() {
        let pages = vec![Page::new(
            1,
            vec![row(FlowType::Income, "その他"), row(FlowType::Expense, "その他")],
        )];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        assert_eq!(tree.get(FlowType::Income, "その他"), Some("2-1-999-1"));
        assert_eq!(tree.get(FlowType::Expense, "その他"), Some("2-2-999-2"));
    }

    #[test]
    fn test_rows_naming_fixed_categories_reuse_them() {
        let pages = vec![
            Page::new(1, vec![summary_row(FlowType::Income, "総収入")]),
            Page::new(
                2,
                vec![
                    row(FlowType::Expense, "総支出"),
                    row(FlowType::Income, "no parent(income)"),
                    row(FlowType::Expense, "no parent(expense)"),
                ],
            ),
        ];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        assert_eq!(tree.categories.len(), 4);
        assert_eq!(tree.get(FlowType::Income, "総収入"), Some("2-1"));
        assert_eq!(tree.get(FlowType::Expense, "総支出"), Some("2-2"));
        assert_eq!(tree.get(FlowType::Income, "no parent(income)"), Some("2-1-999"));
        assert_eq!(tree.get(FlowType::Expense, "no parent(expense)"), Some("2-2-999"));
    }

    #[test]
    fn test_fixed_name_in_other_direction_is_new() {
        let pages = vec![Page::new(1, vec![row(FlowType::Expense, "総収入")])];
        let tree = build_categories(&pages, DEFAULT_SUMMARY_MARKER);
        assert_eq!(tree.get(FlowType::Expense, "総収入"), Some("2-2-999-1"));
    }

    #[test]
    fn test_custom_marker() {
        let mut r = row(FlowType::Income, "寄付");
        r.full_data.insert("title".into(), json!("SUMMARY"));
        let pages = vec![Page::new(1, vec![r])];
        let tree = build_categories(&pages, "SUMMARY");
        assert_eq!(tree.get(FlowType::Income, "寄付"), Some("2-1-1"));
    }
}
