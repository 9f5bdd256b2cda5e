//! Async access to the card database for use in Tokio services.
//!
//! Every call opens its own read-only DuckDB connection on the blocking thread
//! pool and closes it when the closure returns, so the server never holds the
//! database open between requests and an ingestion run can take the write
//! lock in the meantime.
//!
//! # Example
//!
//! ```no_run
//! use scryfall_bulk::CardStore;
//! use scryfall_bulk::queries::{CardQuery, ListCardsParams};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = CardStore::new("cards.duckdb");
//!     let cards = store
//!         .run(|conn| CardQuery::new(conn).list(&ListCardsParams::default()))
//!         .await
//!         .unwrap();
//!     println!("{} cards", cards.len());
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::connection::Connection;
use crate::error::{IngestError, Result};

/// Cheaply cloneable handle to a database file.
#[derive(Debug, Clone)]
pub struct CardStore {
    path: Arc<PathBuf>,
}

impl CardStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Arc::new(path.as_ref().to_path_buf()),
        }
    }

    /// Run a sync database operation on the blocking thread pool.
    ///
    /// The closure receives a fresh read-only [`Connection`] that is dropped
    /// as soon as it returns.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            if !path.exists() {
                return Err(IngestError::EmptyResult(format!(
                    "database {} does not exist",
                    path.display()
                )));
            }
            let conn = Connection::open_read_only(path.as_path())?;
            f(&conn)
        })
        .await
        .map_err(|e| IngestError::InvalidArgument(format!("Task join error: {e}")))?
    }
}
