use axum::extract::{Query, State};
use axum::response::Json;
use serde_json::{json, Value};

use crate::api::error::AppError;
use crate::models::CardSummary;
use crate::queries::{CardQuery, ListCardsParams};
use crate::store::CardStore;

/// GET /
///
/// Liveness check.
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello World" }))
}

/// GET /cards/?set_name=Alpha&rarity=rare&limit=50&offset=0
///
/// Every card in the table, projected onto the read columns. All query
/// parameters are optional.
pub async fn list_cards(
    State(store): State<CardStore>,
    Query(params): Query<ListCardsParams>,
) -> Result<Json<Vec<CardSummary>>, AppError> {
    let cards = store
        .run(move |conn| CardQuery::new(conn).list(&params))
        .await?;
    Ok(Json(cards))
}
