use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::util::now_ms;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Malformed event envelope. Rejected before any mutation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Sliding window saturated for the caller's key.
    #[error("Rate limited: retry after {reset_at}")]
    RateLimited { reset_at: i64, remaining: u32 },

    /// A type handler failed. The event has already been logged as `failed`.
    #[error("Handler failed for event {event_id}: {message}")]
    HandlerFailure { event_id: String, message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_at: Option<i64>,
}

impl AppError {
    /// Seconds a rate-limited caller should wait, rounded up, never below one.
    pub fn retry_after_secs(reset_at: i64, now: i64) -> i64 {
        let remaining_ms = (reset_at - now).max(0);
        ((remaining_ms + 999) / 1000).max(1)
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::PathRejection> for AppError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let mut reset = None;
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::InvalidArgument(msg) => {
                (StatusCode::BAD_REQUEST, "Invalid argument", Some(msg.clone()))
            }
            AppError::RateLimited { reset_at, .. } => {
                reset = Some(*reset_at);
                retry_after = Some(Self::retry_after_secs(*reset_at, now_ms()));
                (StatusCode::TOO_MANY_REQUESTS, "Rate limited", None)
            }
            AppError::HandlerFailure { event_id, message } => {
                tracing::error!("Webhook event {} failed: {}", event_id, message);
                (StatusCode::INTERNAL_SERVER_ERROR, "Event processing failed", None)
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string())),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            rate_limited: reset.map(|_| true),
            reset_at: reset,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after
            && let Ok(value) = HeaderValue::from_str(&secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Not-found messages shared by the read API.
pub mod msg {
    pub const CUSTOMER_NOT_FOUND: &str = "Customer not found";
    pub const SUBSCRIPTION_NOT_FOUND: &str = "Subscription not found";
    pub const EXPERIMENT_NOT_FOUND: &str = "Experiment enrollment not found";
    pub const TRANSFER_NOT_FOUND: &str = "Transfer not found";
    pub const INVOICE_NOT_FOUND: &str = "Invoice not found";
    pub const BALANCE_NOT_FOUND: &str = "Balance not found";
    pub const WEBHOOK_EVENT_NOT_FOUND: &str = "Webhook event not found";
}

pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}
