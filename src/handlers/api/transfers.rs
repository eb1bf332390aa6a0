use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::models::Transfer;

use super::LimitQuery;

/// GET /v1/transfers
/// Newest first.
pub async fn list_transfers(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Transfer>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_transfers(&conn, query.limit())?))
}

/// GET /v1/transfers/{event_id}
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<Transfer>> {
    let conn = state.db.get()?;
    let transfer =
        queries::get_transfer_by_event_id(&conn, &event_id)?.or_not_found(msg::TRANSFER_NOT_FOUND)?;
    Ok(Json(transfer))
}
