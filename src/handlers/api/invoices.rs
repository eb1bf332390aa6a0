use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::models::Invoice;

/// GET /v1/customers/{app_user_id}/invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    Path(app_user_id): Path<String>,
) -> Result<Json<Vec<Invoice>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_invoices(&conn, &app_user_id)?))
}

/// GET /v1/invoices/{invoice_id}
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Invoice>> {
    let conn = state.db.get()?;
    let invoice = queries::get_invoice(&conn, &invoice_id)?.or_not_found(msg::INVOICE_NOT_FOUND)?;
    Ok(Json(invoice))
}
