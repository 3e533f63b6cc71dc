use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::importer::extract_number;
use crate::models::{FlowType, OutputDocument};
use crate::resolver::{
    EXPENSE_FALLBACK_ID, EXPENSE_ROOT_ID, INCOME_FALLBACK_ID, INCOME_ROOT_ID,
};

pub struct CategoryLine {
    pub id: String,
    pub name: String,
    pub direction: FlowType,
    pub depth: usize,
    /// Transactions filed directly under this category.
    pub count: usize,
    /// Sum of values for this category and everything below it.
    pub total: f64,
}

pub struct TreeReport {
    pub lines: Vec<CategoryLine>,
    pub total_income: f64,
    pub total_expense: f64,
    pub uncounted_values: usize,
}

/// Numbers and numeric strings count toward totals; anything else does not.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => extract_number(s).and_then(|v| v.as_f64()),
        _ => None,
    }
}

pub fn get_tree_report(doc: &OutputDocument) -> TreeReport {
    let parents: HashMap<&str, Option<&str>> = doc
        .categories
        .iter()
        .map(|c| (c.id.as_str(), c.parent_id.as_deref()))
        .collect();
    let index: HashMap<&str, usize> = doc
        .categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();

    // Parent chains are bounded by the category count so a cyclic document cannot hang.
    let limit = doc.categories.len();
    let ancestors = |id: &str| -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            let Some(&i) = index.get(cid) else { break };
            if chain.len() > limit {
                break;
            }
            chain.push(i);
            current = parents.get(cid).copied().flatten();
        }
        chain
    };

    let mut counts = vec![0usize; doc.categories.len()];
    let mut totals = vec![0f64; doc.categories.len()];
    let mut uncounted_values = 0;
    for txn in &doc.transactions {
        let chain = ancestors(&txn.category_id);
        if let Some(&direct) = chain.first() {
            counts[direct] += 1;
        }
        let amount = match txn.value.as_ref().map(numeric_value) {
            Some(Some(v)) => v,
            Some(None) => {
                uncounted_values += 1;
                continue;
            }
            None => continue,
        };
        for i in chain {
            totals[i] += amount;
        }
    }

    let lines: Vec<CategoryLine> = doc
        .categories
        .iter()
        .enumerate()
        .map(|(i, c)| CategoryLine {
            id: c.id.clone(),
            name: c.name.clone(),
            direction: c.direction,
            depth: ancestors(&c.id).len().saturating_sub(1),
            count: counts[i],
            total: totals[i],
        })
        .collect();

    let root_total = |id: &str| index.get(id).map_or(0.0, |&i| totals[i]);
    TreeReport {
        total_income: root_total(INCOME_ROOT_ID),
        total_expense: root_total(EXPENSE_ROOT_ID),
        lines,
        uncounted_values,
    }
}

/// Every broken output invariant, as a readable message. Empty means the document is sound.
pub fn check_invariants(doc: &OutputDocument) -> Vec<String> {
    let mut problems = Vec::new();
    let by_id: HashMap<&str, _> = doc.categories.iter().map(|c| (c.id.as_str(), c)).collect();

    for (id, parent) in [
        (INCOME_ROOT_ID, None),
        (INCOME_FALLBACK_ID, Some(INCOME_ROOT_ID)),
        (EXPENSE_ROOT_ID, None),
        (EXPENSE_FALLBACK_ID, Some(EXPENSE_ROOT_ID)),
    ] {
        match by_id.get(id) {
            None => problems.push(format!("missing fixed category {id}")),
            Some(c) if c.parent_id.as_deref() != parent => {
                problems.push(format!("fixed category {id} has parent {:?}", c.parent_id))
            }
            Some(_) => {}
        }
    }

    let mut ids = HashSet::new();
    let mut keys = HashSet::new();
    for c in &doc.categories {
        if !ids.insert(c.id.as_str()) {
            problems.push(format!("duplicate category id {}", c.id));
        }
        if !keys.insert((c.direction, c.name.as_str())) {
            problems.push(format!("duplicate {} category {:?}", c.direction, c.name));
        }
        if let Some(parent) = c.parent_id.as_deref() {
            if !by_id.contains_key(parent) {
                problems.push(format!("category {} has unknown parent {parent}", c.id));
            }
        }
    }

    for (n, txn) in doc.transactions.iter().enumerate() {
        if !by_id.contains_key(txn.category_id.as_str()) {
            problems.push(format!("{} refers to unknown category {}", txn.id, txn.category_id));
        }
        let expected = format!("txn-{}", n + 1);
        if txn.id != expected {
            problems.push(format!(
                "transaction {} is out of sequence (expected {expected})",
                txn.id
            ));
        }
    }
    problems
}
