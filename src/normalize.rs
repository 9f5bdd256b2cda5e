//! Flattening of the nested `prices` and `image_uris` objects.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::config::{IMAGE_COLUMNS, PRICE_COLUMNS};
use crate::models::{CardRecord, ImageColumns, NormalizedRecord, PriceColumns};

/// Derive the flat columns for every record in a batch.
pub fn normalize_batch(batch: Vec<CardRecord>) -> Vec<NormalizedRecord> {
    batch.into_iter().map(normalize_record).collect()
}

/// Derive the flat price and image columns for one record.
///
/// The source fields are left as they are.
pub fn normalize_record(fields: CardRecord) -> NormalizedRecord {
    let prices = extract_prices(fields.get("prices"));
    let images = extract_images(fields.get("image_uris"));
    NormalizedRecord {
        fields,
        prices,
        images,
    }
}

/// Read the six price columns out of a `prices` value.
///
/// Accepts an object or a JSON-encoded object string. Anything else, and any
/// entry that does not coerce to a finite number, yields `None`.
pub fn extract_prices(value: Option<&Value>) -> PriceColumns {
    let Some(map) = value.and_then(as_object) else {
        return PriceColumns::default();
    };
    let mut out = [None; 6];
    for (slot, (_, key)) in out.iter_mut().zip(PRICE_COLUMNS.iter()) {
        *slot = map.get(*key).and_then(coerce_price);
    }
    let [usd, usd_foil, usd_etched, eur, eur_foil, tix] = out;
    PriceColumns {
        usd,
        usd_foil,
        usd_etched,
        eur,
        eur_foil,
        tix,
    }
}

/// Read the six image URL columns out of an `image_uris` value.
pub fn extract_images(value: Option<&Value>) -> ImageColumns {
    let Some(map) = value.and_then(as_object) else {
        return ImageColumns::default();
    };
    let get = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
    let [small, normal, large, png, art_crop, border_crop] = IMAGE_COLUMNS.map(|(_, key)| get(key));
    ImageColumns {
        image_small: small,
        image_normal: normal,
        image_large: large,
        image_png: png,
        image_artcrop: art_crop,
        image_bordercrop: border_crop,
    }
}

/// Coerce a price entry to a finite `f64`.
pub fn coerce_price(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn as_object(value: &Value) -> Option<Cow<'_, Map<String, Value>>> {
    match value {
        Value::Object(map) => Some(Cow::Borrowed(map)),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Some(Cow::Owned(map)),
            _ => None,
        },
        _ => None,
    }
}
