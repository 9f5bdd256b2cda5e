use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{IngestError, Result};

pub const BULK_DATA_URL: &str = "https://api.scryfall.com/bulk-data";
pub const ALL_CARDS_TYPE: &str = "all_cards";
pub const USER_AGENT: &str = concat!("scryfall-bulk/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_DATA_DIR: &str = "data";
pub const ARTIFACT_FILE: &str = "all_cards.json";
pub const CARDS_TABLE: &str = "all_cards";
pub const BATCH_SIZE: usize = 1000;
pub const DEFAULT_API_ADDR: &str = "0.0.0.0:8000";

pub const DB_PATH_VAR: &str = "SCRYFALL_DB_PATH";
pub const DATA_DIR_VAR: &str = "SCRYFALL_DATA_DIR";
pub const API_ADDR_VAR: &str = "SCRYFALL_API_ADDR";

/// Derived price columns paired with the key they are read from in `prices`.
pub const PRICE_COLUMNS: [(&str, &str); 6] = [
    ("usd", "usd"),
    ("usd_foil", "usd_foil"),
    ("usd_etched", "usd_etched"),
    ("eur", "eur"),
    ("eur_foil", "eur_foil"),
    ("tix", "tix"),
];

/// Derived image columns paired with the key they are read from in `image_uris`.
pub const IMAGE_COLUMNS: [(&str, &str); 6] = [
    ("image_small", "small"),
    ("image_normal", "normal"),
    ("image_large", "large"),
    ("image_png", "png"),
    ("image_artcrop", "art_crop"),
    ("image_bordercrop", "border_crop"),
];

/// Columns returned by the read API, in response order.
pub const READ_COLUMNS: [&str; 6] = [
    "name",
    "type_line",
    "set_name",
    "rarity",
    "mana_cost",
    "arena_id",
];

/// Runtime settings resolved from the process environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub api_addr: SocketAddr,
}

impl Settings {
    /// Load `.env` (if present) and resolve settings from the environment.
    ///
    /// `SCRYFALL_DB_PATH` is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup(DB_PATH_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| IngestError::Config(format!("{} is not set", DB_PATH_VAR)))?;

        let data_dir = lookup(DATA_DIR_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let addr = lookup(API_ADDR_VAR).unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let api_addr = addr
            .parse()
            .map_err(|e| IngestError::Config(format!("{} is invalid ({}): {}", API_ADDR_VAR, addr, e)))?;

        Ok(Self {
            db_path,
            data_dir,
            api_addr,
        })
    }
}

pub fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}
