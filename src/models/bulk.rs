use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BulkDataDescriptor: One downloadable dataset variant
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BulkDataDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub download_uri: String,
    pub size: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_encoding: Option<String>,
}

// ---------------------------------------------------------------------------
// BulkDataListing: Response body of the bulk-data endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDataListing {
    pub data: Vec<BulkDataDescriptor>,
}

impl BulkDataListing {
    /// Find the single entry whose `type` equals `kind`.
    pub fn find(&self, kind: &str) -> Option<&BulkDataDescriptor> {
        self.data.iter().find(|d| d.kind == kind)
    }
}
