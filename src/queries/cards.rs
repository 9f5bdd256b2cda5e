//! Card listing over the loaded `all_cards` table.

use crate::config::{CARDS_TABLE, READ_COLUMNS};
use crate::connection::{quote_ident, Connection};
use crate::error::{IngestError, Result};
use crate::models::CardSummary;
use crate::sql_builder::SqlBuilder;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// ListCardsParams
// ---------------------------------------------------------------------------

/// Optional filters and paging for [`CardQuery::list`].
///
/// With every field `None` the whole table is returned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListCardsParams {
    pub set_name: Option<String>,
    pub rarity: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ---------------------------------------------------------------------------
// CardQuery
// ---------------------------------------------------------------------------

/// Read-only queries against the destination table.
pub struct CardQuery<'a> {
    conn: &'a Connection,
    table: String,
}

impl<'a> CardQuery<'a> {
    /// Query the default `all_cards` table.
    pub fn new(conn: &'a Connection) -> Self {
        Self::for_table(conn, CARDS_TABLE)
    }

    pub fn for_table(conn: &'a Connection, table: &str) -> Self {
        Self {
            conn,
            table: table.to_string(),
        }
    }

    /// Every matching row, projected onto the six read columns.
    ///
    /// An absent or empty table (or no matching rows) is an
    /// [`IngestError::EmptyResult`], never an empty list.
    pub fn list(&self, params: &ListCardsParams) -> Result<Vec<CardSummary>> {
        let present: Vec<String> = self
            .conn
            .table_columns(&self.table)?
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        if present.is_empty() {
            return Err(IngestError::EmptyResult(format!(
                "table '{}' does not exist",
                self.table
            )));
        }

        let exprs: Vec<String> = READ_COLUMNS
            .iter()
            .map(|col| projection(col, present.iter().any(|p| p == col)))
            .collect();

        let mut qb = SqlBuilder::new(&quote_ident(&self.table));
        qb.select(&exprs);
        if let Some(set_name) = &params.set_name {
            qb.where_eq(&column_expr("set_name", &present), set_name);
        }
        if let Some(rarity) = &params.rarity {
            qb.where_eq(&column_expr("rarity", &present), rarity);
        }
        qb.order_by(&["rowid"]);
        if let Some(n) = params.limit {
            qb.limit(n);
        }
        if let Some(n) = params.offset {
            qb.offset(n);
        }

        let (sql, binds) = qb.build();
        let cards: Vec<CardSummary> = self.conn.execute_into(&sql, &binds)?;
        if cards.is_empty() {
            return Err(IngestError::EmptyResult("No cards found".to_string()));
        }
        Ok(cards)
    }
}

/// Select expression for one read column, typed to match [`CardSummary`].
fn projection(column: &str, exists: bool) -> String {
    if !exists {
        return format!("NULL AS {}", column);
    }
    let ident = quote_ident(column);
    match column {
        "name" => format!("COALESCE(CAST({} AS VARCHAR), '') AS {}", ident, column),
        "arena_id" => format!("TRY_CAST({} AS BIGINT) AS {}", ident, column),
        _ => format!("CAST({} AS VARCHAR) AS {}", ident, column),
    }
}

fn column_expr(column: &str, present: &[String]) -> String {
    if present.iter().any(|p| p == column) {
        format!("CAST({} AS VARCHAR)", quote_ident(column))
    } else {
        "NULL".to_string()
    }
}
