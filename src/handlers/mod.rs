pub mod api;
pub mod webhook;

pub use webhook::handle_revenuecat_webhook;

use axum::{
    Router,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::db::AppState;
use crate::extractors::Json;

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Every route the server exposes. Tests drive this same router.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/revenuecat", post(handle_revenuecat_webhook))
        .merge(api::router(state))
}
