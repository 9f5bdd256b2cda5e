//! Connection integration tests: raw SQL execution, table introspection, access modes.

mod common;

use scryfall_bulk::connection::{quote_ident, quote_literal};
use scryfall_bulk::{Connection, IngestError};

fn sample_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE cards (name VARCHAR, rarity VARCHAR, cmc DOUBLE, reserved BOOLEAN, arena_id BIGINT);
         INSERT INTO cards VALUES
            ('Lightning Bolt', 'common', 1.0, false, 67730),
            ('Black Lotus', 'rare', 0.0, true, NULL),
            ('Counterspell', 'uncommon', 2.0, false, NULL);",
    )
    .unwrap();
    conn
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

#[test]
fn execute_returns_correct_rows() {
    let conn = sample_db();
    let rows = conn.execute("SELECT * FROM cards ORDER BY name", &[]).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["name"], "Black Lotus");
    assert_eq!(rows[2]["name"], "Lightning Bolt");
}

#[test]
fn execute_with_params() {
    let conn = sample_db();
    let rows = conn
        .execute("SELECT * FROM cards WHERE rarity = ?", &["rare".to_string()])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Black Lotus");
}

#[test]
fn execute_returns_empty_for_no_matches() {
    let conn = sample_db();
    let rows = conn
        .execute("SELECT * FROM cards WHERE name = ?", &["Nope".to_string()])
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn execute_scalar_returns_none_for_empty_result() {
    let conn = sample_db();
    let count = conn.execute_scalar("SELECT COUNT(*) FROM cards", &[]).unwrap();
    assert_eq!(count.unwrap().as_i64(), Some(3));

    let missing = conn
        .execute_scalar("SELECT name FROM cards WHERE name = ?", &["Nope".to_string()])
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn execute_into_deserializes_rows() {
    #[derive(serde::Deserialize)]
    struct Row {
        name: String,
        arena_id: Option<i64>,
    }

    let conn = sample_db();
    let rows: Vec<Row> = conn
        .execute_into("SELECT name, arena_id FROM cards ORDER BY name DESC", &[])
        .unwrap();
    assert_eq!(rows[0].name, "Lightning Bolt");
    assert_eq!(rows[0].arena_id, Some(67730));
    assert_eq!(rows[1].arena_id, None);
}

// ---------------------------------------------------------------------------
// Type conversions
// ---------------------------------------------------------------------------

#[test]
fn values_are_converted_to_json() {
    let conn = sample_db();
    let rows = conn
        .execute(
            "SELECT cmc, reserved, arena_id FROM cards WHERE name = ?",
            &["Black Lotus".to_string()],
        )
        .unwrap();
    assert_eq!(rows[0]["reserved"], true);
    assert!(rows[0]["arena_id"].is_null());
    assert_eq!(rows[0]["cmc"].as_f64(), Some(0.0));
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

#[test]
fn table_columns_lists_names_and_types_in_order() {
    let conn = sample_db();
    let cols = conn.table_columns("cards").unwrap();
    let names: Vec<&str> = cols.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["name", "rarity", "cmc", "reserved", "arena_id"]);
    assert_eq!(cols[2].1, "DOUBLE");
    assert_eq!(cols[4].1, "BIGINT");
}

#[test]
fn table_columns_empty_for_missing_table() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(conn.table_columns("all_cards").unwrap().is_empty());
}

#[test]
fn has_table_and_row_count() {
    let conn = sample_db();
    assert!(conn.has_table("cards").unwrap());
    assert!(!conn.has_table("all_cards").unwrap());
    assert_eq!(conn.row_count("cards").unwrap(), 3);
    assert_eq!(conn.row_count("all_cards").unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Quoting
// ---------------------------------------------------------------------------

#[test]
fn quoting_escapes_embedded_quotes() {
    assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    assert_eq!(quote_literal("Urza's Saga"), "'Urza''s Saga'");

    let conn = sample_db();
    conn.execute_batch(&format!(
        "INSERT INTO cards (name) VALUES ({})",
        quote_literal("Urza's Saga")
    ))
    .unwrap();
    let hit = conn
        .execute_scalar("SELECT COUNT(*) FROM cards WHERE name = ?", &["Urza's Saga".to_string()])
        .unwrap();
    assert_eq!(hit.unwrap().as_i64(), Some(1));
}

// ---------------------------------------------------------------------------
// Files and access modes
// ---------------------------------------------------------------------------

#[test]
fn open_creates_parent_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("db").join("cards.duckdb");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
    drop(conn);
    assert!(path.exists());
}

#[test]
fn read_only_connection_sees_data_but_cannot_write() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("cards.duckdb");
    {
        let conn = Connection::open(&path).unwrap();
        common::load_cards(&conn, "all_cards", &common::cards(4), 1000);
    }

    let reader = Connection::open_read_only(&path).unwrap();
    assert_eq!(reader.row_count("all_cards").unwrap(), 4);
    assert!(reader.execute_batch("DROP TABLE all_cards").is_err());
}

#[test]
fn read_only_open_of_missing_file_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let result = Connection::open_read_only(tmp.path().join("absent.duckdb"));
    assert!(matches!(result, Err(IngestError::Database(_))));
}
