use std::path::PathBuf;

use crate::converter::{convert, write_json};
use crate::error::Result;
use crate::importer::load_source;
use crate::settings::load_settings;

pub fn run(input: &str, output: &str, year: Option<i32>, format: Option<&str>) -> Result<()> {
    let input_path = PathBuf::from(input);
    let output_path = PathBuf::from(output);
    let options = load_settings().convert_options(year);

    let pages = load_source(&input_path, format)?;
    let doc = convert(&pages, &options);
    write_json(&doc, &output_path)?;

    println!("Wrote {}", output_path.display());
    println!(
        "{} categories / {} transactions",
        doc.categories.len(),
        doc.transactions.len()
    );
    Ok(())
}
