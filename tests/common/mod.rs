//! Shared test fixtures for the ingestion integration tests.
//!
//! Provides Scryfall-shaped card objects, helpers that write them out as a
//! bulk artifact, and a helper that loads cards straight into a connection.

#![allow(dead_code)]

use scryfall_bulk::models::CardRecord;
use scryfall_bulk::normalize::normalize_batch;
use scryfall_bulk::{Connection, LoadMode, Loader};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

const RARITIES: [&str; 4] = ["common", "uncommon", "rare", "mythic"];

/// A card object shaped like an entry of the Scryfall all-cards file.
///
/// Every third card carries an `arena_id`; every fifth has no `usd` price;
/// every seventh has no `image_uris` (as double-faced cards do).
pub fn card_json(i: usize) -> Value {
    let mut card = json!({
        "object": "card",
        "id": format!("00000000-0000-0000-0000-{:012}", i),
        "lang": "en",
        "name": format!("Test Card {}", i),
        "type_line": "Creature \u{2014} Goblin",
        "set": "tst",
        "set_name": if i % 2 == 0 { "Alpha" } else { "Beta" },
        "rarity": RARITIES[i % RARITIES.len()],
        "mana_cost": "{1}{R}",
        "cmc": 2.0,
        "oracle_text": "Haste. {T}: Deal 1 damage to any target.",
        "colors": ["R"],
        "reserved": false,
        "legalities": {"modern": "legal", "vintage": "legal"},
        "prices": {
            "usd": format!("{}.{:02}", i % 50, i % 100),
            "usd_foil": null,
            "usd_etched": null,
            "eur": "0.25",
            "eur_foil": null,
            "tix": "0.03"
        },
        "image_uris": {
            "small": format!("https://cards.example/small/{}.jpg", i),
            "normal": format!("https://cards.example/normal/{}.jpg", i),
            "large": format!("https://cards.example/large/{}.jpg", i),
            "png": format!("https://cards.example/png/{}.png", i),
            "art_crop": format!("https://cards.example/art_crop/{}.jpg", i),
            "border_crop": format!("https://cards.example/border_crop/{}.jpg", i)
        }
    });
    let obj = card.as_object_mut().unwrap();
    if i % 3 == 0 {
        obj.insert("arena_id".to_string(), json!(60000 + i));
    }
    if i % 5 == 0 {
        obj["prices"]["usd"] = Value::Null;
    }
    if i % 7 == 0 {
        obj.remove("image_uris");
    }
    card
}

/// `n` fixture cards.
pub fn cards(n: usize) -> Vec<Value> {
    (0..n).map(card_json).collect()
}

/// Serialize cards as a JSON array, one element per line like the real feed.
pub fn array_text(cards: &[Value]) -> String {
    let mut out = String::from("[\n");
    for (i, card) in cards.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        out.push_str(&serde_json::to_string(card).unwrap());
    }
    out.push_str("\n]\n");
    out
}

/// Write `cards` as a bulk artifact at `dir/all_cards.json`.
pub fn write_artifact(dir: &Path, cards: &[Value]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join("all_cards.json");
    fs::write(&path, array_text(cards)).unwrap();
    path
}

pub fn record(value: Value) -> CardRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Load `cards` into `table` in batches of `batch_size`, as one run.
pub fn load_cards(conn: &Connection, table: &str, cards: &[Value], batch_size: usize) -> usize {
    let mut loader = Loader::new(conn, table, LoadMode::Replace);
    let mut total = 0;
    for chunk in cards.chunks(batch_size) {
        let batch: Vec<CardRecord> = chunk.iter().cloned().map(record).collect();
        total += loader.write_batch(normalize_batch(batch)).unwrap();
    }
    loader.finish().unwrap();
    total
}
