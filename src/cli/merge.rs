use std::path::PathBuf;

use crate::converter::write_json;
use crate::error::{Result, ShushiError};
use crate::importer::{collect_inputs, merge_sources, write_rows_csv};

pub fn run(inputs: &[String], output: &str, csv: Option<&str>, format: Option<&str>) -> Result<()> {
    let inputs: Vec<PathBuf> = inputs.iter().map(PathBuf::from).collect();
    let files = collect_inputs(&inputs)?;
    if files.is_empty() {
        return Err(ShushiError::Other("No source files found to merge".into()));
    }

    let result = merge_sources(&files, format)?;
    let output_path = PathBuf::from(output);
    write_json(&result.pages, &output_path)?;
    println!("Wrote {}", output_path.display());

    if let Some(csv) = csv {
        let csv_path = PathBuf::from(csv);
        write_rows_csv(&result.pages, &csv_path)?;
        println!("Wrote {}", csv_path.display());
    }

    let rows: usize = result.pages.iter().map(|p| p.rows.len()).sum();
    println!(
        "{} files merged, {} skipped (duplicates): {} pages / {} rows",
        result.files,
        result.skipped_duplicates,
        result.pages.len(),
        rows
    );
    Ok(())
}
