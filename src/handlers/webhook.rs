use std::str::FromStr;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
};
use serde_json::{Map, Value};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{Environment, Store};
use crate::util::secrets_match;
use crate::webhooks::{self, EventEnvelope, ProcessOptions, ProcessResult, sanitize_event};

/// POST /webhooks/revenuecat
pub async fn handle_revenuecat_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ProcessResult>> {
    // The provider sends the configured value verbatim, not as a bearer token
    if let Some(expected) = state.webhook_auth.as_deref() {
        let provided = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !secrets_match(expected, provided) {
            tracing::warn!("Rejected webhook with bad Authorization header");
            return Err(AppError::Unauthorized);
        }
    }

    let body: Value = serde_json::from_slice(&body)?;
    let mut event = extract_event(body)?;
    event
        .entry("environment")
        .or_insert_with(|| Value::String(Environment::default().as_ref().to_string()));

    let envelope = envelope_from(&event)?;
    let raw = Value::Object(event);

    let options = ProcessOptions {
        skip_rate_limit: false,
        rate_limit: state.rate_limit,
    };
    let mut conn = state.db.get()?;
    let result = webhooks::process(&mut conn, &envelope, &raw, &options)?;

    Ok(Json(result))
}

/// Pull the sanitised `event` object out of a delivery body.
fn extract_event(body: Value) -> Result<Map<String, Value>> {
    let Value::Object(mut body) = body else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    match body.remove("event").map(sanitize_event) {
        Some(Value::Object(event)) => Ok(event),
        _ => Err(AppError::BadRequest("missing event object".into())),
    }
}

fn envelope_from(event: &Map<String, Value>) -> Result<EventEnvelope> {
    let required = |field: &str| {
        event
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest(format!("event.{} must be a string", field)))
    };
    let optional = |field: &str| event.get(field).and_then(Value::as_str);

    Ok(EventEnvelope {
        id: required("id")?,
        event_type: required("type")?,
        app_id: optional("app_id").map(str::to_string),
        app_user_id: optional("app_user_id").map(str::to_string),
        environment: optional("environment")
            .and_then(|s| Environment::from_str(s).ok())
            .unwrap_or_default(),
        // Stores added upstream after this build still get logged
        store: optional("store").and_then(|s| Store::from_str(s).ok()),
    })
}
