use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{IMAGE_COLUMNS, PRICE_COLUMNS};

/// One card exactly as the provider reported it.
///
/// The feed is schema-less from our point of view: any field the provider adds
/// is carried through to the destination table as its own column.
pub type CardRecord = Map<String, Value>;

// ---------------------------------------------------------------------------
// PriceColumns: Numeric columns flattened out of `prices`
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceColumns {
    pub usd: Option<f64>,
    pub usd_foil: Option<f64>,
    pub usd_etched: Option<f64>,
    pub eur: Option<f64>,
    pub eur_foil: Option<f64>,
    pub tix: Option<f64>,
}

impl PriceColumns {
    /// Column values in `PRICE_COLUMNS` order.
    pub fn values(&self) -> [Option<f64>; 6] {
        [
            self.usd,
            self.usd_foil,
            self.usd_etched,
            self.eur,
            self.eur_foil,
            self.tix,
        ]
    }
}

// ---------------------------------------------------------------------------
// ImageColumns: URL columns flattened out of `image_uris`
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageColumns {
    pub image_small: Option<String>,
    pub image_normal: Option<String>,
    pub image_large: Option<String>,
    pub image_png: Option<String>,
    pub image_artcrop: Option<String>,
    pub image_bordercrop: Option<String>,
}

impl ImageColumns {
    /// Column values in `IMAGE_COLUMNS` order.
    pub fn values(&self) -> [Option<&str>; 6] {
        [
            self.image_small.as_deref(),
            self.image_normal.as_deref(),
            self.image_large.as_deref(),
            self.image_png.as_deref(),
            self.image_artcrop.as_deref(),
            self.image_bordercrop.as_deref(),
        ]
    }
}

// ---------------------------------------------------------------------------
// NormalizedRecord: A card plus its derived columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub fields: CardRecord,
    pub prices: PriceColumns,
    pub images: ImageColumns,
}

impl NormalizedRecord {
    /// Flatten into the row that is persisted: passthrough fields first, then
    /// the derived columns (which win on a name clash).
    pub fn into_row(self) -> CardRecord {
        let mut row = self.fields;
        for ((column, _), value) in PRICE_COLUMNS.iter().zip(self.prices.values()) {
            let value = value
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null);
            row.insert(column.to_string(), value);
        }
        for ((column, _), value) in IMAGE_COLUMNS.iter().zip(self.images.values()) {
            let value = value
                .map(|s| Value::String(s.to_string()))
                .unwrap_or(Value::Null);
            row.insert(column.to_string(), value);
        }
        row
    }
}

// ---------------------------------------------------------------------------
// CardSummary: Fixed projection served by the read API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSummary {
    pub name: String,
    pub type_line: Option<String>,
    pub set_name: Option<String>,
    pub rarity: Option<String>,
    pub mana_cost: Option<String>,
    pub arena_id: Option<i64>,
}
