use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::converter::read_document;
use crate::error::{Result, ShushiError};
use crate::fmt::yen;
use crate::models::FlowType;
use crate::reports::{check_invariants, get_tree_report};

pub fn run(document: &str) -> Result<()> {
    let doc = read_document(&PathBuf::from(document))?;
    let report = get_tree_report(&doc);

    let mut table = Table::new();
    table.set_header(vec!["ID", "Category", "Direction", "Count", "Total"]);
    for line in &report.lines {
        let name = format!("{}{}", "  ".repeat(line.depth), line.name);
        let name = if line.depth == 0 {
            name.as_str().bold()
        } else {
            name.as_str().normal()
        };
        let direction = match line.direction {
            FlowType::Income => "income".green(),
            FlowType::Expense => "expense".red(),
        };
        table.add_row(vec![
            Cell::new(&line.id),
            Cell::new(name),
            Cell::new(direction),
            Cell::new(line.count),
            Cell::new(yen(line.total)),
        ]);
    }
    println!("Categories ({})\n{table}", doc.year);
    println!("Total income:  {}", yen(report.total_income));
    println!("Total expense: {}", yen(report.total_expense));
    if report.uncounted_values > 0 {
        println!(
            "{} transactions with non-numeric values left out of totals",
            report.uncounted_values
        );
    }

    let problems = check_invariants(&doc);
    if problems.is_empty() {
        println!("{}", "All checks passed.".green());
        return Ok(());
    }
    for problem in &problems {
        println!("{} {problem}", "!".red().bold());
    }
    Err(ShushiError::Other(format!(
        "{} problem(s) found in {document}",
        problems.len()
    )))
}
