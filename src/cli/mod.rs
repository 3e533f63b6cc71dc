pub mod completions;
pub mod config;
pub mod convert;
pub mod merge;
pub mod report;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "shushi",
    version,
    about = "Build category trees and transactions from extracted political fund reports."
)]
pub struct Cli {
    /// Log debug detail to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert extracted pages into {year, categories, transactions}.
    Convert {
        /// Extracted pages (JSON), or a CSV/XLSX row table
        input: String,
        /// Output JSON path
        #[arg(short, long)]
        output: String,
        /// Report year (default: from settings, initially 2025)
        #[arg(short, long)]
        year: Option<i32>,
        /// Source format key: pages_json, csv, xlsx
        #[arg(long)]
        format: Option<String>,
    },
    /// Merge several extraction outputs (files or directories) into one page list.
    Merge {
        /// Files or directories to merge, in order
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Output JSON path
        #[arg(short, long)]
        output: String,
        /// Also write every row as a flat CSV
        #[arg(long)]
        csv: Option<String>,
        /// Source format key applied to every file
        #[arg(long)]
        format: Option<String>,
    },
    /// Show the category tree of a converted document and check it.
    Report {
        /// Converted document (output of `shushi convert`)
        document: String,
    },
    /// Show or change saved defaults.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print shell completions.
    Completions {
        /// Shell to generate for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current settings.
    Show,
    /// Update saved settings.
    Set {
        /// Default report year for `convert`
        #[arg(long)]
        year: Option<i32>,
        /// Text that marks a summary page
        #[arg(long)]
        marker: Option<String>,
    },
}
