use axum::extract::State;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::models::Customer;

#[derive(Debug, Deserialize)]
pub struct CustomerLookupQuery {
    pub original_app_user_id: Option<String>,
}

/// GET /v1/customers/{app_user_id}
pub async fn get_customer(
    State(state): State<AppState>,
    Path(app_user_id): Path<String>,
) -> Result<Json<Customer>> {
    let conn = state.db.get()?;
    let customer = queries::get_customer(&conn, &app_user_id)?.or_not_found(msg::CUSTOMER_NOT_FOUND)?;
    Ok(Json(customer))
}

/// GET /v1/customers?original_app_user_id=...
pub async fn find_customer(
    State(state): State<AppState>,
    Query(query): Query<CustomerLookupQuery>,
) -> Result<Json<Customer>> {
    let original = query
        .original_app_user_id
        .ok_or_else(|| AppError::BadRequest("original_app_user_id is required".into()))?;

    let conn = state.db.get()?;
    let customer = queries::get_customer_by_original_id(&conn, &original)?
        .or_not_found(msg::CUSTOMER_NOT_FOUND)?;
    Ok(Json(customer))
}
