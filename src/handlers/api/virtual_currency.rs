use axum::extract::State;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::models::{VirtualCurrencyBalance, VirtualCurrencyTransaction};

#[derive(Deserialize)]
pub struct BalancePath {
    pub app_user_id: String,
    pub currency_code: String,
}

#[derive(Debug, Deserialize)]
pub struct CurrencyTransactionsQuery {
    pub currency_code: Option<String>,
}

/// GET /v1/customers/{app_user_id}/virtual-currency
pub async fn list_balances(
    State(state): State<AppState>,
    Path(app_user_id): Path<String>,
) -> Result<Json<Vec<VirtualCurrencyBalance>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_balances(&conn, &app_user_id)?))
}

/// GET /v1/customers/{app_user_id}/virtual-currency/{currency_code}
pub async fn get_balance(
    State(state): State<AppState>,
    Path(path): Path<BalancePath>,
) -> Result<Json<VirtualCurrencyBalance>> {
    let conn = state.db.get()?;
    let balance = queries::get_balance(&conn, &path.app_user_id, &path.currency_code)?
        .or_not_found(msg::BALANCE_NOT_FOUND)?;
    Ok(Json(balance))
}

/// GET /v1/customers/{app_user_id}/virtual-currency-transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(app_user_id): Path<String>,
    Query(query): Query<CurrencyTransactionsQuery>,
) -> Result<Json<Vec<VirtualCurrencyTransaction>>> {
    let conn = state.db.get()?;
    let transactions =
        queries::list_currency_transactions(&conn, &app_user_id, query.currency_code.as_deref())?;
    Ok(Json(transactions))
}
