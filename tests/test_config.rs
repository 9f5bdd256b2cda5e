//! Settings resolution tests.

use scryfall_bulk::config::{Settings, API_ADDR_VAR, DATA_DIR_VAR, DB_PATH_VAR};
use scryfall_bulk::IngestError;
use std::collections::HashMap;
use std::path::PathBuf;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn db_path_is_required() {
    let result = Settings::from_lookup(lookup(&[]));
    match result {
        Err(IngestError::Config(msg)) => assert!(msg.contains(DB_PATH_VAR)),
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn blank_db_path_counts_as_missing() {
    let result = Settings::from_lookup(lookup(&[(DB_PATH_VAR, "   ")]));
    assert!(matches!(result, Err(IngestError::Config(_))));
}

#[test]
fn defaults_fill_everything_else() {
    let settings = Settings::from_lookup(lookup(&[(DB_PATH_VAR, "/var/lib/cards.duckdb")])).unwrap();
    assert_eq!(settings.db_path, PathBuf::from("/var/lib/cards.duckdb"));
    assert_eq!(settings.data_dir, PathBuf::from("data"));
    assert_eq!(settings.api_addr.port(), 8000);
    assert!(settings.api_addr.ip().is_unspecified());
}

#[test]
fn overrides_are_honoured() {
    let settings = Settings::from_lookup(lookup(&[
        (DB_PATH_VAR, "cards.duckdb"),
        (DATA_DIR_VAR, "/tmp/scryfall"),
        (API_ADDR_VAR, "127.0.0.1:9000"),
    ]))
    .unwrap();
    assert_eq!(settings.data_dir, PathBuf::from("/tmp/scryfall"));
    assert_eq!(settings.api_addr.to_string(), "127.0.0.1:9000");
}

#[test]
fn invalid_listen_address_is_a_config_error() {
    let result = Settings::from_lookup(lookup(&[
        (DB_PATH_VAR, "cards.duckdb"),
        (API_ADDR_VAR, "not-an-address"),
    ]));
    assert!(matches!(result, Err(IngestError::Config(_))));
}
