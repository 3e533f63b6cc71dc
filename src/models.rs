use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Direction of a monetary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Income,
    Expense,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted line item, as handed over by a row source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    pub flow_type: Option<FlowType>,
    pub category: Option<String>,
    pub name: Option<String>,
    pub date: Option<String>,
    pub value: Option<Value>,
    #[serde(rename = "fullData")]
    pub full_data: Map<String, Value>,
}

impl Row {
    /// The `(direction, category)` key, or `None` for rows that never become transactions.
    pub fn key(&self) -> Option<(FlowType, &str)> {
        match (self.flow_type, self.category.as_deref()) {
            (Some(flow), Some(category)) => Some((flow, category)),
            _ => None,
        }
    }
}

/// One unit of extracted source data (a scanned page, a sheet, a CSV block).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    #[serde(rename = "page")]
    pub page_number: Value,
    #[serde(rename = "extracted_rows")]
    pub rows: Vec<Row>,
}

impl Page {
    pub fn new(page_number: impl Into<Value>, rows: Vec<Row>) -> Self {
        Self {
            page_number: page_number.into(),
            rows,
        }
    }

    pub fn label(&self) -> String {
        match &self.page_number {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(rename = "parent")]
    pub parent_id: Option<String>,
    pub direction: FlowType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub category_id: String,
    pub name: Option<String>,
    pub date: Option<String>,
    pub value: Option<Value>,
}

/// The converted document written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    pub year: i32,
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,
}
