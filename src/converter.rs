use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::materializer::build_transactions;
use crate::models::{OutputDocument, Page};
use crate::resolver::{build_categories, DEFAULT_SUMMARY_MARKER};

pub const DEFAULT_YEAR: i32 = 2025;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub year: i32,
    pub summary_marker: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            year: DEFAULT_YEAR,
            summary_marker: DEFAULT_SUMMARY_MARKER.to_string(),
        }
    }
}

/// Pure transform from pages to the output document.
pub fn convert(pages: &[Page], options: &ConvertOptions) -> OutputDocument {
    let tree = build_categories(pages, &options.summary_marker);
    let transactions = build_transactions(pages.iter().flat_map(|p| &p.rows), &tree);
    OutputDocument {
        year: options.year,
        categories: tree.categories,
        transactions,
    }
}

/// Pretty JSON (non-ASCII kept as-is) with a trailing newline; creates parent dirs.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn read_document(path: &Path) -> Result<OutputDocument> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
