//! Scryfall bulk-data ingestion for Rust.
//!
//! Downloads the Scryfall "all cards" bulk file, streams it record by record,
//! flattens the nested price and image objects into columns, and loads the
//! result into a DuckDB table. A small axum service (feature `server`) reads
//! the table back out.
//!
//! # Quick start
//!
//! ```no_run
//! use scryfall_bulk::{Connection, IngestPipeline};
//!
//! let conn = Connection::open("cards.duckdb").unwrap();
//! let mut pipeline = IngestPipeline::builder().data_dir("data").build(&conn).unwrap();
//! let report = pipeline.run().unwrap();
//! println!("{}", report);
//! ```

#[cfg(feature = "server")]
pub mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod queries;
pub mod sql_builder;
#[cfg(feature = "server")]
pub mod store;

pub use connection::Connection;
pub use error::{IngestError, Result};
pub use fetcher::BulkFetcher;
pub use loader::{LoadMode, LoadSummary, Loader};
pub use parser::{RecordBatches, RecordScanner};
pub use sql_builder::SqlBuilder;
#[cfg(feature = "server")]
pub use store::CardStore;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use models::BulkDataDescriptor;
use tracing::info;

// ---------------------------------------------------------------------------
// IngestPipelineBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing an [`IngestPipeline`].
///
/// Use [`IngestPipeline::builder()`] to obtain a builder, chain configuration
/// methods, and call [`build()`](IngestPipelineBuilder::build) with the
/// connection the run should write to.
pub struct IngestPipelineBuilder {
    data_dir: Option<PathBuf>,
    listing_url: String,
    kind: String,
    timeout: Option<Duration>,
    batch_size: usize,
    table: String,
    mode: LoadMode,
    skip_download: bool,
}

impl Default for IngestPipelineBuilder {
    fn default() -> Self {
        Self {
            data_dir: None,
            listing_url: config::BULK_DATA_URL.to_string(),
            kind: config::ALL_CARDS_TYPE.to_string(),
            timeout: None,
            batch_size: config::BATCH_SIZE,
            table: config::CARDS_TABLE.to_string(),
            mode: LoadMode::default(),
            skip_download: false,
        }
    }
}

impl IngestPipelineBuilder {
    /// Directory the artifact is downloaded into. Defaults to `data/`.
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Bulk-data listing endpoint. Defaults to the public Scryfall API.
    pub fn listing_url(mut self, url: impl Into<String>) -> Self {
        self.listing_url = url.into();
        self
    }

    /// Bulk-data type to download. Defaults to `all_cards`.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Per-request HTTP timeout. Unset by default: the payload is large and
    /// the download is allowed to take as long as it needs.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Records per batch. Defaults to 1000.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Destination table. Defaults to `all_cards`.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn load_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    /// Reuse an artifact already on disk instead of downloading.
    pub fn skip_download(mut self, skip: bool) -> Self {
        self.skip_download = skip;
        self
    }

    /// Build the pipeline around `conn`. No network or disk access happens here.
    pub fn build(self, conn: &Connection) -> Result<IngestPipeline<'_>> {
        if self.batch_size == 0 {
            return Err(IngestError::InvalidArgument(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.table.trim().is_empty() {
            return Err(IngestError::InvalidArgument(
                "destination table name is empty".to_string(),
            ));
        }
        let fetcher = BulkFetcher::new(self.data_dir)
            .with_listing_url(self.listing_url)
            .with_kind(self.kind)
            .with_timeout(self.timeout);
        Ok(IngestPipeline {
            conn,
            fetcher,
            batch_size: self.batch_size,
            table: self.table,
            mode: self.mode,
            skip_download: self.skip_download,
        })
    }
}

// ---------------------------------------------------------------------------
// IngestPipeline
// ---------------------------------------------------------------------------

/// One ingestion run: fetch, parse, normalize, load.
///
/// Fetch, download and load failures abort the run. Malformed fragments in
/// the artifact are skipped and counted in the report.
pub struct IngestPipeline<'a> {
    conn: &'a Connection,
    fetcher: BulkFetcher,
    batch_size: usize,
    table: String,
    mode: LoadMode,
    skip_download: bool,
}

impl<'a> IngestPipeline<'a> {
    /// Create a new builder for configuring a pipeline.
    pub fn builder() -> IngestPipelineBuilder {
        IngestPipelineBuilder::default()
    }

    /// Path the artifact is written to and read from.
    pub fn artifact_path(&self) -> PathBuf {
        self.fetcher.artifact_path()
    }

    /// Run the whole pipeline once.
    pub fn run(&mut self) -> Result<IngestReport> {
        let (descriptor, artifact) = if self.skip_download {
            let path = self.artifact_path();
            if !path.exists() {
                return Err(IngestError::InvalidArgument(format!(
                    "artifact {} does not exist; run without skip-download first",
                    path.display()
                )));
            }
            info!(path = %path.display(), "reusing downloaded artifact");
            (None, path)
        } else {
            let (descriptor, path) = self.fetcher.fetch()?;
            (Some(descriptor), path)
        };

        let (summary, skipped) = self.load_file(&artifact)?;
        Ok(IngestReport {
            descriptor,
            artifact,
            batches: summary.batches,
            rows: summary.rows,
            columns: summary.columns,
            skipped_fragments: skipped,
        })
    }

    /// Parse, normalize and load an artifact that is already on disk.
    ///
    /// Returns the load totals and the number of skipped fragments.
    pub fn load_file(&self, path: &Path) -> Result<(LoadSummary, usize)> {
        info!(path = %path.display(), table = %self.table, "loading artifact");
        let mut batches = parser::open_batches(path, self.batch_size)?;
        let mut loader = Loader::new(self.conn, &self.table, self.mode);
        if let Some(dir) = path.parent().filter(|p| p.is_dir()) {
            loader = loader.with_scratch_dir(dir);
        }

        for batch in batches.by_ref() {
            let normalized = normalize::normalize_batch(batch?);
            loader.write_batch(normalized)?;
        }

        let skipped = batches.skipped_fragments();
        let summary = loader.finish()?;
        Ok((summary, skipped))
    }
}

// ---------------------------------------------------------------------------
// IngestReport
// ---------------------------------------------------------------------------

/// What one run did.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Descriptor that was downloaded; `None` when an existing artifact was reused.
    pub descriptor: Option<BulkDataDescriptor>,
    pub artifact: PathBuf,
    pub batches: usize,
    pub rows: usize,
    pub columns: usize,
    pub skipped_fragments: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IngestReport(artifact={}, batches={}, rows={}, columns={}, skipped={}",
            self.artifact.display(),
            self.batches,
            self.rows,
            self.columns,
            self.skipped_fragments
        )?;
        if let Some(d) = &self.descriptor {
            write!(f, ", updated_at={}", d.updated_at)?;
        }
        write!(f, ")")
    }
}
