//! HTTP read API over the loaded card table.

pub mod error;
pub mod routes;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::store::CardStore;

pub use error::AppError;

/// Build the application router.
pub fn router(store: CardStore) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/cards/", get(routes::list_cards))
        .route("/cards", get(routes::list_cards))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(store)
}
