//! One ingestion run: download the all-cards bulk file and load it into DuckDB.

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use scryfall_bulk::config::{self, Settings};
use scryfall_bulk::{logging, Connection, IngestPipeline, LoadMode};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "scryfall-ingest", version, about = "Load the Scryfall all-cards feed into DuckDB")]
struct Args {
    /// DuckDB database file (overrides SCRYFALL_DB_PATH).
    #[arg(long)]
    db_path: Option<String>,

    /// Directory for the downloaded artifact (overrides SCRYFALL_DATA_DIR).
    #[arg(long)]
    data_dir: Option<String>,

    /// Records per batch.
    #[arg(long, default_value_t = config::BATCH_SIZE)]
    batch_size: usize,

    /// Reuse the artifact already in the data directory.
    #[arg(long)]
    skip_download: bool,

    /// Build the table under a staging name and swap it in at the end.
    #[arg(long)]
    swap: bool,

    /// Bulk-data listing endpoint.
    #[arg(long, default_value = config::BULK_DATA_URL)]
    listing_url: String,

    /// Per-request timeout in seconds (no timeout when omitted).
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() -> ExitCode {
    let _ = dotenv::dotenv();
    let args = Args::parse();
    if let Err(e) = logging::init_tracing("info") {
        eprintln!("{}", e);
    }

    let settings = match Settings::from_lookup(|key| match key {
        config::DB_PATH_VAR => args.db_path.clone().or_else(|| env::var(key).ok()),
        config::DATA_DIR_VAR => args.data_dir.clone().or_else(|| env::var(key).ok()),
        _ => env::var(key).ok(),
    }) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::from(2);
        }
    };

    match run(&args, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "ingestion aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, settings: &Settings) -> scryfall_bulk::Result<()> {
    let conn = Connection::open(&settings.db_path)?;
    let mode = if args.swap {
        LoadMode::StageAndSwap
    } else {
        LoadMode::Replace
    };

    let mut builder = IngestPipeline::builder()
        .data_dir(&settings.data_dir)
        .listing_url(args.listing_url.clone())
        .batch_size(args.batch_size)
        .load_mode(mode)
        .skip_download(args.skip_download);
    if let Some(secs) = args.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    let mut pipeline = builder.build(&conn)?;
    let report = pipeline.run()?;
    let table_rows = conn.row_count(config::CARDS_TABLE)?;
    info!(
        rows = report.rows,
        table_rows,
        batches = report.batches,
        skipped = report.skipped_fragments,
        db = %settings.db_path.display(),
        "ingestion finished"
    );
    if report.skipped_fragments > 0 {
        tracing::warn!(skipped = report.skipped_fragments, "some fragments could not be decoded");
    }
    Ok(())
}
