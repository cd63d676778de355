use std::{io, path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rowdb::{
    cli::{input_loop, report},
    constants::TABLE_MAX_PAGES,
    TableBuilder,
};

/// Single-table record store with a line-oriented prompt.
#[derive(Parser, Debug)]
#[command(name = "rowdb", version)]
struct Args {
    /// Database file, created when missing
    #[arg(value_name = "DB_FILE")]
    db_file: Option<PathBuf>,

    /// Maximum number of pages the table may use
    #[arg(long, default_value_t = TABLE_MAX_PAGES)]
    max_pages: usize,

    /// Log storage activity to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("rowdb=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: Args, db_file: PathBuf) -> anyhow::Result<()> {
    let table = TableBuilder::new()
        .path(&db_file)
        .max_pages(args.max_pages)
        .open()
        .with_context(|| format!("could not open database {}", db_file.display()))?;

    input_loop(table, io::stdin().lock(), io::stdout().lock())
}

fn main() -> ExitCode {
    let mut args = Args::parse();
    init_logging(args.verbose);

    let Some(db_file) = args.db_file.take() else {
        println!("Must supply a database filename.");
        return ExitCode::FAILURE;
    };

    match run(args, db_file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}
