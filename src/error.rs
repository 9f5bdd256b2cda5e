use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Bulk data descriptor not found: {0}")]
    DescriptorNotFound(String),

    #[error("Download to {} failed: {source}", path.display())]
    Download {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed bulk document: {0}")]
    MalformedDocument(String),

    #[error("Load error: {0}")]
    Load(#[source] duckdb::Error),

    #[error("DuckDB error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("No data: {0}")]
    EmptyResult(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
