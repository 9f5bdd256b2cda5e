//! Bulk-data listing lookup and streamed download of the all-cards artifact.
//!
//! The provider publishes a small listing of downloadable datasets. The fetcher
//! picks one entry by type and copies its payload to disk chunk by chunk, so
//! memory use stays flat no matter how large the feed grows.

use crate::config;
use crate::error::{IngestError, Result};
use crate::models::{BulkDataDescriptor, BulkDataListing};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Resolves the bulk-data descriptor and downloads its payload.
pub struct BulkFetcher {
    /// Directory the artifact is written into.
    pub data_dir: PathBuf,
    listing_url: String,
    kind: String,
    timeout: Option<Duration>,
    client: Option<Client>,
}

impl BulkFetcher {
    /// Create a fetcher writing into `data_dir` (default `data/`).
    ///
    /// The directory is created lazily, right before the first download.
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.unwrap_or_else(config::default_data_dir),
            listing_url: config::BULK_DATA_URL.to_string(),
            kind: config::ALL_CARDS_TYPE.to_string(),
            timeout: None,
            client: None,
        }
    }

    /// Point the fetcher at a different listing endpoint.
    pub fn with_listing_url(mut self, url: impl Into<String>) -> Self {
        self.listing_url = url.into();
        self
    }

    /// Select a different bulk-data type than `all_cards`.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Bound each request. By default requests never time out.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Local path of the downloaded artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.data_dir.join(config::ARTIFACT_FILE)
    }

    /// Lazy HTTP client, created on first use.
    fn client(&mut self) -> Result<&Client> {
        if self.client.is_none() {
            let mut headers = HeaderMap::new();
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
            let client = Client::builder()
                .user_agent(config::USER_AGENT)
                .default_headers(headers)
                .timeout(self.timeout)
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()?;
            self.client = Some(client);
        }
        self.client
            .as_ref()
            .ok_or_else(|| IngestError::InvalidArgument("HTTP client unavailable".into()))
    }

    /// Fetch the provider's bulk-data listing.
    ///
    /// A non-success status is reported as a fetch failure.
    pub fn fetch_listing(&mut self) -> Result<BulkDataListing> {
        let url = self.listing_url.clone();
        debug!(url = %url, "fetching bulk-data listing");
        let resp = self.client()?.get(&url).send()?.error_for_status()?;
        Ok(resp.json()?)
    }

    /// Fetch the listing and pick the configured entry.
    pub fn resolve_descriptor(&mut self) -> Result<BulkDataDescriptor> {
        let listing = self.fetch_listing()?;
        let descriptor = select_descriptor(&listing, &self.kind)?;
        info!(
            kind = %descriptor.kind,
            uri = %descriptor.download_uri,
            size = descriptor.size,
            updated_at = %descriptor.updated_at,
            "found bulk data"
        );
        Ok(descriptor)
    }

    /// Stream the descriptor's payload into the artifact path.
    ///
    /// Writes to a temp file first and renames on success, so an interrupted
    /// download never leaves a corrupt artifact behind.
    pub fn download(&mut self, descriptor: &BulkDataDescriptor) -> Result<PathBuf> {
        let dest = self.artifact_path();
        fs::create_dir_all(&self.data_dir).map_err(|source| IngestError::Download {
            path: self.data_dir.clone(),
            source,
        })?;

        let tmp_dest = dest.with_extension("json.tmp");
        info!(uri = %descriptor.download_uri, path = %dest.display(), "downloading");

        let client = self.client()?.clone();
        let result = (|| -> Result<u64> {
            let mut resp = client
                .get(&descriptor.download_uri)
                .send()?
                .error_for_status()?;
            let written = copy_to_file(&mut resp, &tmp_dest)?;
            fs::rename(&tmp_dest, &dest).map_err(|source| IngestError::Download {
                path: dest.clone(),
                source,
            })?;
            Ok(written)
        })();

        match result {
            Ok(written) => {
                info!(bytes = written, path = %dest.display(), "download complete");
                Ok(dest)
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_dest);
                Err(e)
            }
        }
    }

    /// Resolve the descriptor and download it in one step.
    pub fn fetch(&mut self) -> Result<(BulkDataDescriptor, PathBuf)> {
        let descriptor = self.resolve_descriptor()?;
        let path = self.download(&descriptor)?;
        Ok((descriptor, path))
    }
}

/// Pick the entry of type `kind` out of a listing.
pub fn select_descriptor(listing: &BulkDataListing, kind: &str) -> Result<BulkDataDescriptor> {
    listing.find(kind).cloned().ok_or_else(|| {
        IngestError::DescriptorNotFound(format!(
            "no bulk data of type '{}' among {} entries",
            kind,
            listing.data.len()
        ))
    })
}

/// Copy a response body to `path` through a fixed-size buffer.
fn copy_to_file(resp: &mut reqwest::blocking::Response, path: &Path) -> Result<u64> {
    let to_download_err = |source: io::Error| IngestError::Download {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(to_download_err)?;
    let mut writer = BufWriter::with_capacity(64 * 1024, file);
    let written = io::copy(resp, &mut writer).map_err(to_download_err)?;
    writer.flush().map_err(to_download_err)?;
    Ok(written)
}
