use crate::models::{Row, Transaction};
use crate::resolver::CategoryTree;

/// One transaction per keyed row, in input order. Ids count emitted transactions only.
///
/// Category ids are looked up by `(direction, name)`, so an income and an expense
/// category sharing a name never shadow each other.
pub fn build_transactions<'a, I>(rows: I, tree: &CategoryTree) -> Vec<Transaction>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut transactions = Vec::new();
    for row in rows {
        let Some((flow, category)) = row.key() else {
            continue;
        };
        transactions.push(Transaction {
            id: format!("txn-{}", transactions.len() + 1),
            category_id: tree.resolve(flow, category).to_string(),
            name: row.name.clone(),
            date: row.date.clone(),
            value: row.value.clone(),
        });
    }
    transactions
}
