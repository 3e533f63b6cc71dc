use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{Result, ShushiError};
use crate::models::{FlowType, Page, Row};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Pulls the first number out of free text, ignoring thousands separators.
/// `"1,000円"` becomes `1000`, `"12.5%"` becomes `12.5`.
pub fn extract_number(raw: &str) -> Option<Value> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid number pattern"));
    let cleaned = raw.replace(',', "");
    let found = re.find(&cleaned)?.as_str();
    if found.contains('.') {
        found.parse::<f64>().ok().and_then(number_value)
    } else {
        found.parse::<i64>().ok().map(Value::from)
    }
}

/// Whole floats collapse to integers so `1000.0` serializes as `1000`.
fn number_value(val: f64) -> Option<Value> {
    if val.fract() == 0.0 && val.abs() < i64::MAX as f64 {
        Some(Value::from(val as i64))
    } else {
        serde_json::Number::from_f64(val).map(Value::Number)
    }
}

pub fn excel_serial_to_date(serial: f64) -> Option<String> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = base.checked_add_signed(chrono::Duration::try_days(serial as i64)?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn has_extension(file_path: &Path, extensions: &[&str]) -> bool {
    file_path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

// ---------------------------------------------------------------------------
// Source kinds, dispatched by enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceKind {
    PagesJson,
    Csv,
    #[cfg(feature = "xlsx")]
    Xlsx,
}

impl SourceKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::PagesJson => "pages_json",
            Self::Csv => "csv",
            #[cfg(feature = "xlsx")]
            Self::Xlsx => "xlsx",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PagesJson => "Extracted pages (JSON)",
            Self::Csv => "Tabular rows (CSV)",
            #[cfg(feature = "xlsx")]
            Self::Xlsx => "Workbook (XLSX)",
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::PagesJson => &["json"],
            Self::Csv => &["csv"],
            #[cfg(feature = "xlsx")]
            Self::Xlsx => &["xlsx", "xlsm"],
        }
    }

    pub fn detect(&self, file_path: &Path) -> bool {
        has_extension(file_path, self.extensions())
    }

    pub fn load(&self, file_path: &Path) -> Result<Vec<Page>> {
        match self {
            Self::PagesJson => load_pages_json(file_path),
            Self::Csv => load_csv(file_path),
            #[cfg(feature = "xlsx")]
            Self::Xlsx => load_xlsx(file_path),
        }
    }
}

pub const ALL_SOURCES: &[SourceKind] = &[
    SourceKind::PagesJson,
    SourceKind::Csv,
    #[cfg(feature = "xlsx")]
    SourceKind::Xlsx,
];

pub fn get_by_key(key: &str) -> Option<SourceKind> {
    ALL_SOURCES.iter().find(|s| s.key() == key).copied()
}

/// Detected kind for the file, falling back to the extraction-pipeline JSON.
pub fn get_for_file(file_path: &Path) -> SourceKind {
    ALL_SOURCES
        .iter()
        .find(|s| s.detect(file_path))
        .copied()
        .unwrap_or(SourceKind::PagesJson)
}

pub fn load_source(file_path: &Path, format_key: Option<&str>) -> Result<Vec<Page>> {
    let source = match format_key {
        Some(key) => get_by_key(key).ok_or_else(|| ShushiError::UnknownFormat(key.to_string()))?,
        None => get_for_file(file_path),
    };
    tracing::debug!(file = %file_path.display(), source = source.key(), "loading source");
    let pages = source.load(file_path)?;
    tracing::info!(
        file = %file_path.display(),
        pages = pages.len(),
        rows = pages.iter().map(|p| p.rows.len()).sum::<usize>(),
        "loaded {}",
        source.name()
    );
    Ok(pages)
}

// ---------------------------------------------------------------------------
// Pages JSON
// ---------------------------------------------------------------------------

fn load_pages_json(file_path: &Path) -> Result<Vec<Page>> {
    let content = std::fs::read_to_string(file_path)?;
    let data: Value = serde_json::from_str(&content)?;
    parse_pages(data)
}

/// Accepts a bare page array, `{"items": [...]}`, or `[{"items": [...]}]`.
fn unwrap_envelope(data: Value) -> Result<Vec<Value>> {
    let data = match data {
        Value::Array(mut items) if items.first().is_some_and(|v| v.get("items").is_some()) => {
            items.swap_remove(0)
        }
        other => other,
    };
    match data {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ShushiError::malformed("document", "object without an \"items\" array")),
        },
        _ => Err(ShushiError::malformed("document", "expected an array of pages")),
    }
}

pub fn parse_pages(data: Value) -> Result<Vec<Page>> {
    unwrap_envelope(data)?
        .into_iter()
        .enumerate()
        .map(|(index, value)| parse_page(index, value))
        .collect()
}

fn parse_page(index: usize, value: Value) -> Result<Page> {
    let location = format!("page #{index}");
    let Value::Object(mut obj) = value else {
        return Err(ShushiError::malformed(location, "page is not an object"));
    };
    let page_number = obj
        .remove("page")
        .filter(|v| !v.is_null())
        .unwrap_or_else(|| Value::from("unknown"));
    let rows = match obj.remove("extracted_rows") {
        Some(Value::Array(rows)) => rows,
        Some(_) => {
            return Err(ShushiError::malformed(
                location,
                "\"extracted_rows\" is not an array",
            ))
        }
        None => return Err(ShushiError::malformed(location, "missing \"extracted_rows\"")),
    };
    let rows = rows
        .into_iter()
        .enumerate()
        .map(|(r, value)| parse_row(&format!("{location} row #{r}"), value))
        .collect::<Result<Vec<_>>>()?;
    Ok(Page { page_number, rows })
}

fn optional_string(
    obj: &mut Map<String, Value>,
    key: &str,
    location: &str,
) -> Result<Option<String>> {
    match obj.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(ShushiError::malformed(
            location,
            format!("\"{key}\" must be a string, got {other}"),
        )),
    }
}

fn parse_flow(raw: &str, location: &str) -> Result<Option<FlowType>> {
    if raw.is_empty() {
        return Ok(None);
    }
    FlowType::parse(raw)
        .map(Some)
        .ok_or_else(|| ShushiError::malformed(location, format!("unknown flow_type {raw:?}")))
}

fn parse_row(location: &str, value: Value) -> Result<Row> {
    let Value::Object(mut obj) = value else {
        return Err(ShushiError::malformed(location, "row is not an object"));
    };
    let flow_type = match optional_string(&mut obj, "flow_type", location)? {
        Some(raw) => parse_flow(&raw, location)?,
        None => None,
    };
    let full_data = match obj.remove("fullData") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(ShushiError::malformed(location, "\"fullData\" is not an object")),
    };
    Ok(Row {
        flow_type,
        category: optional_string(&mut obj, "category", location)?,
        name: optional_string(&mut obj, "name", location)?,
        date: optional_string(&mut obj, "date", location)?,
        value: obj.remove("value").filter(|v| !v.is_null()),
        full_data,
    })
}

// ---------------------------------------------------------------------------
// Tabular sources (CSV / XLSX) share one header-driven row builder
// ---------------------------------------------------------------------------

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn tabular_row(cells: &[(&str, Value)], location: &str) -> Result<(Option<Value>, Row)> {
    let mut page = None;
    let mut row = Row::default();
    for (header, cell) in cells {
        if header.is_empty() {
            continue;
        }
        let raw = cell_text(cell);
        let text = raw.trim();
        if !text.is_empty() {
            match *header {
                "page" => {
                    page = Some(match cell {
                        Value::Number(_) => cell.clone(),
                        _ => text
                            .parse::<i64>()
                            .map(Value::from)
                            .unwrap_or_else(|_| Value::from(text)),
                    })
                }
                "flow_type" => row.flow_type = parse_flow(text, location)?,
                "category" => row.category = Some(text.to_string()),
                "name" => row.name = Some(text.to_string()),
                "date" => {
                    let serial = cell.as_f64().and_then(excel_serial_to_date);
                    row.date = Some(serial.unwrap_or_else(|| text.to_string()));
                }
                "value" => {
                    row.value = match cell {
                        Value::Number(_) => Some(cell.clone()),
                        _ => extract_number(text),
                    }
                }
                _ => {}
            }
        }
        row.full_data.insert(header.to_string(), Value::String(raw));
    }
    Ok((page, row))
}

/// Consecutive rows sharing a page value form one page; blank page cells stay on the current page.
fn group_pages(rows: Vec<(Option<Value>, Row)>, default_page: Value) -> Vec<Page> {
    let mut pages: Vec<Page> = Vec::new();
    for (page_number, row) in rows {
        if let Some(last) = pages.last_mut() {
            if page_number.as_ref().map_or(true, |n| *n == last.page_number) {
                last.rows.push(row);
                continue;
            }
        }
        let page_number = page_number.unwrap_or_else(|| default_page.clone());
        pages.push(Page::new(page_number, vec![row]));
    }
    pages
}

fn load_csv(file_path: &Path) -> Result<Vec<Page>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(file_path)?;
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let cells: Vec<(&str, Value)> = headers
            .iter()
            .map(String::as_str)
            .zip(record.iter().map(Value::from))
            .collect();
        // +2: one for the header, one for 1-based lines
        let location = format!("{} line {}", file_path.display(), i + 2);
        rows.push(tabular_row(&cells, &location)?);
    }
    Ok(group_pages(rows, Value::from(1)))
}

#[cfg(feature = "xlsx")]
fn xlsx_cell(data: &calamine::Data) -> Value {
    use calamine::Data;
    match data {
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => number_value(*f).unwrap_or(Value::Null),
        Data::String(s) | Data::DateTimeIso(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::String(b.to_string()),
        Data::DateTime(dt) => number_value(dt.as_f64()).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

#[cfg(feature = "xlsx")]
fn load_xlsx(file_path: &Path) -> Result<Vec<Page>> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| ShushiError::Xlsx(format!("Failed to open XLSX: {e}")))?;

    let mut pages = Vec::new();
    for sheet in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| ShushiError::Xlsx(format!("{sheet}: {e}")))?;
        let mut sheet_rows = range.rows();
        let Some(header) = sheet_rows.next() else {
            tracing::debug!(sheet = %sheet, "skipping empty sheet");
            continue;
        };
        let headers: Vec<String> = header
            .iter()
            .map(|c| cell_text(&xlsx_cell(c)).trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (i, data) in sheet_rows.enumerate() {
            let cells: Vec<(&str, Value)> = headers
                .iter()
                .map(String::as_str)
                .zip(data.iter().map(xlsx_cell))
                .collect();
            if cells.iter().all(|(_, v)| v.is_null()) {
                continue;
            }
            let location = format!("{} sheet {sheet} row {}", file_path.display(), i + 2);
            rows.push(tabular_row(&cells, &location)?);
        }
        pages.extend(group_pages(rows, Value::String(sheet.clone())));
    }
    Ok(pages)
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

pub struct MergeResult {
    pub pages: Vec<Page>,
    pub files: usize,
    pub skipped_duplicates: usize,
}

/// Expands directories into their recognised source files, sorted by name.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && ALL_SOURCES.iter().any(|s| s.detect(p)))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

pub fn merge_sources(files: &[PathBuf], format_key: Option<&str>) -> Result<MergeResult> {
    let mut seen = HashSet::new();
    let mut result = MergeResult {
        pages: Vec::new(),
        files: 0,
        skipped_duplicates: 0,
    };
    for file in files {
        let checksum = compute_checksum(file)?;
        if !seen.insert(checksum) {
            tracing::warn!(file = %file.display(), "skipping duplicate file (same checksum)");
            result.skipped_duplicates += 1;
            continue;
        }
        result.pages.extend(load_source(file, format_key)?);
        result.files += 1;
    }
    Ok(result)
}

/// Flat CSV of every row, one line per row.
pub fn write_rows_csv(pages: &[Page], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["page", "flow_type", "category", "name", "date", "value"])?;
    for page in pages {
        let label = page.label();
        for row in &page.rows {
            let value = row.value.as_ref().map(cell_text).unwrap_or_default();
            wtr.write_record([
                label.as_str(),
                row.flow_type.map_or("", |f| f.as_str()),
                row.category.as_deref().unwrap_or(""),
                row.name.as_deref().unwrap_or(""),
                row.date.as_deref().unwrap_or(""),
                value.as_str(),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}
