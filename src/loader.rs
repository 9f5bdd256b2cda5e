//! Bulk loading of normalized batches into the destination table.
//!
//! Every batch is written to a newline-delimited JSON scratch file and pulled
//! into DuckDB with `read_json`, using a column map computed here rather than
//! DuckDB's sampling, so every batch agrees with the table it lands in.
//!
//! Column types follow the values seen so far:
//! - booleans → `BOOLEAN`, integers → `BIGINT`, other numbers → `DOUBLE`
//! - strings → `VARCHAR`, objects and arrays → `JSON`
//! - derived price columns are always `DOUBLE`, image columns always `VARCHAR`
//!
//! A column first seen in a later batch is added; a column whose values stop
//! fitting its type is widened in place.
//!
//! DuckDB column names are case-insensitive. Every key is folded onto the
//! first spelling seen for it during the run (an all-lowercase spelling wins
//! within a single record), and a key whose folded spelling is already present
//! in the same record is dropped.

use crate::config::{IMAGE_COLUMNS, PRICE_COLUMNS};
use crate::connection::{quote_ident, quote_literal, Connection};
use crate::error::{IngestError, Result};
use crate::models::{CardRecord, NormalizedRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// How the destination table is replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Drop and recreate the table on the first batch of the run. Readers can
    /// see a missing or partial table while the run is in progress.
    #[default]
    Replace,
    /// Build the table under a staging name and swap it in when the run
    /// finishes.
    StageAndSwap,
}

/// Storage type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Varchar,
    Json,
}

impl ColumnType {
    /// The type a non-null JSON value asks for.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(n) if n.is_i64() => Some(Self::BigInt),
            Value::Number(_) => Some(Self::Double),
            Value::String(_) => Some(Self::Varchar),
            Value::Array(_) | Value::Object(_) => Some(Self::Json),
        }
    }

    /// Smallest type that holds values of both `self` and `other`.
    pub fn widen(self, other: Self) -> Self {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (BigInt, Double) | (Double, BigInt) => Double,
            _ => Varchar,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::BigInt => "BIGINT",
            Self::Double => "DOUBLE",
            Self::Varchar => "VARCHAR",
            Self::Json => "JSON",
        }
    }
}

fn derived_type(column: &str) -> Option<ColumnType> {
    if PRICE_COLUMNS.iter().any(|(c, _)| *c == column) {
        Some(ColumnType::Double)
    } else if IMAGE_COLUMNS.iter().any(|(c, _)| *c == column) {
        Some(ColumnType::Varchar)
    } else {
        None
    }
}

/// Table schema tracked across the batches of one run.
#[derive(Debug, Clone, Default)]
struct Schema {
    columns: Vec<(String, ColumnType)>,
    index: HashMap<String, usize>,
    /// Columns that have only ever held nulls, in first-seen order.
    untyped: Vec<String>,
    /// Lowercased key to the spelling used for its column.
    spellings: HashMap<String, String>,
}

impl Schema {
    fn get(&self, name: &str) -> Option<ColumnType> {
        self.index.get(name).map(|&i| self.columns[i].1)
    }

    fn set(&mut self, name: &str, ty: ColumnType) {
        match self.index.get(name) {
            Some(&i) => self.columns[i].1 = ty,
            None => {
                self.index.insert(name.to_string(), self.columns.len());
                self.columns.push((name.to_string(), ty));
                self.untyped.retain(|c| c != name);
            }
        }
    }

    fn note_untyped(&mut self, name: &str) {
        if !self.index.contains_key(name) && !self.untyped.iter().any(|c| c == name) {
            self.untyped.push(name.to_string());
        }
    }
}

/// Changes one batch makes to the table schema.
#[derive(Debug, Default)]
struct SchemaChange {
    added: Vec<(String, ColumnType)>,
    widened: Vec<(String, ColumnType)>,
}

/// Totals for a finished load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub batches: usize,
    pub rows: usize,
    pub columns: usize,
}

/// Writes normalized batches into one destination table.
pub struct Loader<'a> {
    conn: &'a Connection,
    table: String,
    mode: LoadMode,
    scratch_dir: Option<PathBuf>,
    schema: Schema,
    batches: usize,
    rows: usize,
}

impl<'a> Loader<'a> {
    /// Create a loader for `table`. Nothing is touched until the first batch.
    pub fn new(conn: &'a Connection, table: &str, mode: LoadMode) -> Self {
        Self {
            conn,
            table: table.to_string(),
            mode,
            scratch_dir: None,
            schema: Schema::default(),
            batches: 0,
            rows: 0,
        }
    }

    /// Directory for per-batch scratch files (system temp dir by default).
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Name of the table batches are currently written to.
    pub fn target_table(&self) -> String {
        match self.mode {
            LoadMode::Replace => self.table.clone(),
            LoadMode::StageAndSwap => format!("{}__staging", self.table),
        }
    }

    /// Write one batch in its own transaction and return the rows written.
    ///
    /// The first batch of the run drops and recreates the target table.
    pub fn write_batch(&mut self, batch: Vec<NormalizedRecord>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let mut schema = self.schema.clone();
        let mut dropped = 0;
        let rows: Vec<CardRecord> = batch
            .into_iter()
            .map(|record| {
                let (row, n) = fold_key_case(&mut schema.spellings, record.into_row());
                dropped += n;
                row
            })
            .collect();
        if dropped > 0 {
            warn!(table = %self.target_table(), dropped, "dropped keys differing only by case");
        }

        let change = merge_batch_schema(&mut schema, &rows);
        let scratch = self.write_scratch(&rows)?;

        let target = quote_ident(&self.target_table());
        let mut sql = vec!["BEGIN TRANSACTION;".to_string()];
        if self.batches == 0 {
            let cols: Vec<String> = schema
                .columns
                .iter()
                .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql()))
                .collect();
            sql.push(format!("DROP TABLE IF EXISTS {};", target));
            sql.push(format!("CREATE TABLE {} ({});", target, cols.join(", ")));
        } else {
            for (name, ty) in &change.added {
                sql.push(format!(
                    "ALTER TABLE {} ADD COLUMN {} {};",
                    target,
                    quote_ident(name),
                    ty.sql()
                ));
            }
            for (name, ty) in &change.widened {
                sql.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DATA TYPE {};",
                    target,
                    quote_ident(name),
                    ty.sql()
                ));
            }
        }

        let present = batch_columns(&rows);
        let column_map: Vec<String> = present
            .iter()
            .filter_map(|name| schema.get(name).map(|ty| (name, ty)))
            .map(|(name, ty)| format!("{}: {}", quote_literal(name), quote_literal(ty.sql())))
            .collect();
        let path = scratch.path().to_string_lossy().replace('\\', "/");
        sql.push(format!(
            "INSERT INTO {} BY NAME SELECT * FROM read_json({}, format = 'newline_delimited', \
             records = 'true', columns = {{{}}});",
            target,
            quote_literal(&path),
            column_map.join(", ")
        ));
        sql.push("COMMIT;".to_string());

        self.run_in_transaction(&sql.join("\n"))?;

        if !change.widened.is_empty() {
            warn!(table = %self.target_table(), columns = ?change.widened, "widened column types");
        }
        self.schema = schema;
        self.batches += 1;
        self.rows += rows.len();
        debug!(
            table = %self.target_table(),
            batch = self.batches,
            rows = rows.len(),
            added = change.added.len(),
            "batch committed"
        );
        Ok(rows.len())
    }

    /// Complete the run: create columns that only ever held nulls and, in
    /// swap mode, move the staged table into place.
    ///
    /// A run that wrote no batches drops the destination table, so readers
    /// see no data rather than the previous run's rows.
    pub fn finish(self) -> Result<LoadSummary> {
        if self.batches == 0 {
            warn!(table = %self.table, "no rows loaded; dropping destination table");
            let sql = format!(
                "BEGIN TRANSACTION;\nDROP TABLE IF EXISTS {};\nDROP TABLE IF EXISTS {};\nCOMMIT;",
                quote_ident(&self.target_table()),
                quote_ident(&self.table)
            );
            self.run_in_transaction(&sql)?;
            return Ok(LoadSummary::default());
        }

        let target = quote_ident(&self.target_table());
        let mut sql = vec!["BEGIN TRANSACTION;".to_string()];
        for name in &self.schema.untyped {
            sql.push(format!(
                "ALTER TABLE {} ADD COLUMN {} VARCHAR;",
                target,
                quote_ident(name)
            ));
        }
        if self.mode == LoadMode::StageAndSwap {
            sql.push(format!("DROP TABLE IF EXISTS {};", quote_ident(&self.table)));
            sql.push(format!(
                "ALTER TABLE {} RENAME TO {};",
                target,
                quote_ident(&self.table)
            ));
        }
        sql.push("COMMIT;".to_string());
        self.run_in_transaction(&sql.join("\n"))?;

        let summary = LoadSummary {
            batches: self.batches,
            rows: self.rows,
            columns: self.schema.columns.len() + self.schema.untyped.len(),
        };
        info!(
            table = %self.table,
            batches = summary.batches,
            rows = summary.rows,
            columns = summary.columns,
            "table loaded"
        );
        Ok(summary)
    }

    fn run_in_transaction(&self, sql: &str) -> Result<()> {
        if let Err(e) = self.conn.execute_batch(sql) {
            let _ = self.conn.execute_batch("ROLLBACK;");
            return Err(IngestError::Load(e));
        }
        Ok(())
    }

    fn write_scratch(&self, rows: &[CardRecord]) -> Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("cards-batch-").suffix(".ndjson");
        let file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let mut writer = BufWriter::new(file);
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.into_inner().map_err(|e| IngestError::Io(e.into_error()))
    }
}

/// Rewrite the keys of `row` onto their run-wide spellings.
///
/// Returns the rewritten row and the number of keys dropped as duplicates.
fn fold_key_case(spellings: &mut HashMap<String, String>, row: CardRecord) -> (CardRecord, usize) {
    let (lower, mixed): (Vec<_>, Vec<_>) = row
        .into_iter()
        .partition(|(key, _)| !key.chars().any(char::is_uppercase));
    let mut out = CardRecord::new();
    let mut dropped = 0;
    for (key, value) in lower.into_iter().chain(mixed) {
        let canonical = spellings
            .entry(key.to_lowercase())
            .or_insert_with(|| key.clone());
        if out.contains_key(canonical.as_str()) {
            dropped += 1;
        } else {
            out.insert(canonical.clone(), value);
        }
    }
    (out, dropped)
}

/// Column names present in a batch, in first-seen order.
fn batch_columns(rows: &[CardRecord]) -> Vec<&str> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !key.is_empty() && seen.insert(key.as_str()) {
                out.push(key.as_str());
            }
        }
    }
    out
}

/// Fold the value types of a batch into `schema`.
fn merge_batch_schema(schema: &mut Schema, rows: &[CardRecord]) -> SchemaChange {
    let mut seen: Vec<(&str, Option<ColumnType>)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        for (key, value) in row {
            if key.is_empty() {
                continue;
            }
            let ty = derived_type(key).or_else(|| ColumnType::of(value));
            match positions.get(key.as_str()) {
                Some(&i) => {
                    let slot = &mut seen[i].1;
                    *slot = match (*slot, ty) {
                        (Some(a), Some(b)) => Some(a.widen(b)),
                        (a, b) => a.or(b),
                    };
                }
                None => {
                    positions.insert(key.as_str(), seen.len());
                    seen.push((key.as_str(), ty));
                }
            }
        }
    }

    let mut change = SchemaChange::default();
    for (name, ty) in seen {
        let Some(ty) = ty else {
            schema.note_untyped(name);
            continue;
        };
        match schema.get(name) {
            None => {
                schema.set(name, ty);
                change.added.push((name.to_string(), ty));
            }
            Some(current) => {
                let wider = current.widen(ty);
                if wider != current {
                    schema.set(name, wider);
                    change.widened.push((name.to_string(), wider));
                }
            }
        }
    }
    change
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> CardRecord {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn widen_prefers_double_for_mixed_numbers() {
        assert_eq!(ColumnType::BigInt.widen(ColumnType::Double), ColumnType::Double);
        assert_eq!(ColumnType::Json.widen(ColumnType::Varchar), ColumnType::Varchar);
        assert_eq!(ColumnType::Boolean.widen(ColumnType::BigInt), ColumnType::Varchar);
        assert_eq!(ColumnType::Json.widen(ColumnType::Json), ColumnType::Json);
    }

    #[test]
    fn merge_defers_null_only_columns() {
        let mut schema = Schema::default();
        let rows = vec![
            row(json!({"name": "Opt", "arena_id": null})),
            row(json!({"name": "Shock", "arena_id": null, "prices": {"usd": "0.10"}})),
        ];
        let change = merge_batch_schema(&mut schema, &rows);
        assert_eq!(change.added.len(), 2);
        assert_eq!(schema.get("prices"), Some(ColumnType::Json));
        assert_eq!(schema.get("arena_id"), None);
        assert_eq!(schema.untyped, vec!["arena_id".to_string()]);

        let later = vec![row(json!({"name": "Opt", "arena_id": 68512}))];
        let change = merge_batch_schema(&mut schema, &later);
        assert_eq!(change.added, vec![("arena_id".to_string(), ColumnType::BigInt)]);
        assert!(schema.untyped.is_empty());
    }

    #[test]
    fn keys_fold_onto_first_spelling() {
        let mut spellings = HashMap::new();
        let (first, dropped) =
            fold_key_case(&mut spellings, row(json!({"Name": "upper", "name": "A", "Power": 2})));
        assert_eq!(dropped, 1);
        assert_eq!(first["name"], "A");
        assert!(first.contains_key("Power"));

        let (second, dropped) = fold_key_case(&mut spellings, row(json!({"POWER": 3})));
        assert_eq!(dropped, 0);
        assert_eq!(second["Power"], 3);
    }

    #[test]
    fn derived_columns_keep_fixed_types() {
        let mut schema = Schema::default();
        let rows = vec![row(json!({"usd": null, "image_png": null}))];
        merge_batch_schema(&mut schema, &rows);
        assert_eq!(schema.get("usd"), Some(ColumnType::Double));
        assert_eq!(schema.get("image_png"), Some(ColumnType::Varchar));
    }
}
