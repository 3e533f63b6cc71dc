mod cli;
mod converter;
mod error;
mod fmt;
mod importer;
mod materializer;
mod models;
mod reports;
mod resolver;
mod settings;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigCommands};

/// Logs go to stderr so stdout stays clean for completions and summaries.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "shushi=debug" } else { "shushi=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            year,
            format,
        } => cli::convert::run(&input, &output, year, format.as_deref()),
        Commands::Merge {
            inputs,
            output,
            csv,
            format,
        } => cli::merge::run(&inputs, &output, csv.as_deref(), format.as_deref()),
        Commands::Report { document } => cli::report::run(&document),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cli::config::show(),
            ConfigCommands::Set { year, marker } => cli::config::set(year, marker),
        },
        Commands::Completions { shell } => cli::completions::run(shell),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
