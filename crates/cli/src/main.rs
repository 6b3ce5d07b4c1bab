mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use statera_import::FormatHint;
use tracing_subscriber::EnvFilter;

/// Any fatal error; the message goes to stderr.
pub const EXIT_ERROR: u8 = 1;
/// The column mapping could not be inferred; the proposal is on stdout.
pub const EXIT_NEEDS_MAPPING: u8 = 2;

#[derive(Parser)]
#[command(name = "statera", about = "Turn bank statement exports into canonical transactions.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a statement and print the result as JSON.
    #[command(after_help = "\
Examples:
  statera import april.csv --pretty
  statera import april.csv --mapping mapping.json --existing ledger.json
  statera import statement.txt --format page-text

Exit code 2 means the column mapping needs confirming; the printed proposal
can be edited and passed back with --mapping.")]
    Import(ImportArgs),
    /// Show where the transaction table starts and the proposed mapping.
    Inspect(SourceArgs),
}

#[derive(Args)]
pub struct SourceArgs {
    /// Statement file (CSV/TSV, XLSX/XLS/ODS, or extracted text)
    pub file: PathBuf,
    /// delimited, tabular or page-text (default: from the file extension)
    #[arg(long)]
    pub format: Option<FormatHint>,
    /// Field delimiter for delimited files (default: sniffed)
    #[arg(long)]
    pub delimiter: Option<char>,
    /// Pipeline settings (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Column mapping (JSON) to use instead of inferring one
    #[arg(long)]
    pub mapping: Option<PathBuf>,
    /// Previously imported records (JSON array) to check for duplicates
    #[arg(long)]
    pub existing: Option<PathBuf>,
    /// Account the statement belongs to
    #[arg(long)]
    pub account: Option<String>,
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Import(args) => commands::import(args),
        Commands::Inspect(args) => commands::inspect(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
