use axum::extract::State;

use crate::access;
use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::models::{GracePeriodStatus, Subscription};
use crate::util::now_ms;

use super::ActiveFilterQuery;

/// GET /v1/customers/{app_user_id}/subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Path(app_user_id): Path<String>,
    Query(query): Query<ActiveFilterQuery>,
) -> Result<Json<Vec<Subscription>>> {
    let conn = state.db.get()?;
    let subscriptions = if query.active {
        access::list_active_subscriptions(&conn, &app_user_id, now_ms())?
    } else {
        access::list_all_subscriptions(&conn, &app_user_id)?
    };
    Ok(Json(subscriptions))
}

/// GET /v1/subscriptions/{original_transaction_id}
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(original_transaction_id): Path<String>,
) -> Result<Json<Subscription>> {
    let conn = state.db.get()?;
    let subscription = queries::get_subscription(&conn, &original_transaction_id)?
        .or_not_found(msg::SUBSCRIPTION_NOT_FOUND)?;
    Ok(Json(subscription))
}

/// GET /v1/subscriptions/{original_transaction_id}/grace-period
pub async fn get_grace_period_status(
    State(state): State<AppState>,
    Path(original_transaction_id): Path<String>,
) -> Result<Json<GracePeriodStatus>> {
    let conn = state.db.get()?;
    let status =
        access::get_subscription_grace_period_status(&conn, &original_transaction_id, now_ms())?
            .or_not_found(msg::SUBSCRIPTION_NOT_FOUND)?;
    Ok(Json(status))
}
