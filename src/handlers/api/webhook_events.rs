use axum::extract::State;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::models::WebhookEvent;

use super::{LimitQuery, list_limit};

#[derive(Debug, Deserialize)]
pub struct WebhookEventsQuery {
    pub app_user_id: Option<String>,
    pub event_type: Option<String>,
    pub limit: Option<i64>,
}

/// GET /v1/webhook-events?app_user_id=...|event_type=...
pub async fn list_webhook_events(
    State(state): State<AppState>,
    Query(query): Query<WebhookEventsQuery>,
) -> Result<Json<Vec<WebhookEvent>>> {
    let conn = state.db.get()?;
    let limit = list_limit(query.limit);
    let events = match (&query.app_user_id, &query.event_type) {
        (Some(app_user_id), None) => queries::list_webhook_events_by_user(&conn, app_user_id, limit)?,
        (None, Some(event_type)) => queries::list_webhook_events_by_type(&conn, event_type, limit)?,
        _ => {
            return Err(AppError::BadRequest(
                "exactly one of app_user_id or event_type is required".into(),
            ));
        }
    };
    Ok(Json(events))
}

/// GET /v1/webhook-events/failed
pub async fn list_failed_webhook_events(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<WebhookEvent>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_failed_webhook_events(&conn, query.limit())?))
}

/// GET /v1/webhook-events/{event_id}
pub async fn get_webhook_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<WebhookEvent>> {
    let conn = state.db.get()?;
    let event =
        queries::get_webhook_event(&conn, &event_id)?.or_not_found(msg::WEBHOOK_EVENT_NOT_FOUND)?;
    Ok(Json(event))
}
