//! Webhook delivery pipeline.
//!
//! One delivery is one IMMEDIATE transaction: rate limit, idempotency check,
//! handler, and log insert all commit together or not at all. The handler runs
//! inside a savepoint so a failure can be rolled back while its `failed` log
//! row still commits.

use std::str::FromStr;

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{CreateWebhookEvent, WebhookEventStatus};
use crate::rate_limit::{self, RateLimitConfig};
use crate::util::now_ms;

use super::handlers::{self, HandlerContext};
use super::payload::{EventEnvelope, EventType};

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Bypass the sliding window, for internal replays.
    pub skip_rate_limit: bool,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    /// False for duplicates and ignored event types.
    pub processed: bool,
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
}

impl ProcessResult {
    fn new(processed: bool, event_id: &str) -> Self {
        Self {
            processed,
            event_id: event_id.to_string(),
            rate_limited: None,
        }
    }
}

/// Process one delivery at the current time.
pub fn process(
    conn: &mut Connection,
    envelope: &EventEnvelope,
    raw: &serde_json::Value,
    options: &ProcessOptions,
) -> Result<ProcessResult> {
    process_at(conn, envelope, raw, options, now_ms())
}

/// Process one delivery as if received at `now`.
pub fn process_at(
    conn: &mut Connection,
    envelope: &EventEnvelope,
    raw: &serde_json::Value,
    options: &ProcessOptions,
    now: i64,
) -> Result<ProcessResult> {
    envelope.validate()?;

    let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if !options.skip_rate_limit {
        let key = rate_limit::webhook_key(envelope.app_id.as_deref());
        let decision = rate_limit::check_and_increment(&tx, &key, &options.rate_limit, now)?;
        if !decision.allowed {
            tracing::warn!(
                "Rate limited webhook {} for key {} until {}",
                envelope.id,
                key,
                decision.reset_at
            );
            return Err(AppError::RateLimited {
                reset_at: decision.reset_at,
                remaining: decision.remaining,
            });
        }
    }

    if queries::webhook_event_exists(&tx, &envelope.id)? {
        // Keep the rate-limit slot this delivery consumed
        tx.commit()?;
        tracing::debug!("Duplicate webhook event {}, skipping", envelope.id);
        return Ok(ProcessResult::new(false, &envelope.id));
    }

    let (status, error) = match EventType::from_str(&envelope.event_type) {
        Err(_) => {
            tracing::info!(
                "Ignoring webhook event {} with unknown type {}",
                envelope.id,
                envelope.event_type
            );
            (WebhookEventStatus::Ignored, None)
        }
        Ok(event_type) => {
            let ctx = HandlerContext {
                event_id: &envelope.id,
                now,
            };
            let sp = tx.savepoint()?;
            match handlers::apply(&sp, event_type, &ctx, raw) {
                Ok(()) => {
                    sp.commit()?;
                    (WebhookEventStatus::Processed, None)
                }
                Err(e) => {
                    // Dropping the savepoint rolls back the handler's writes
                    drop(sp);
                    tracing::error!(
                        "Handler for {} failed on event {}: {}",
                        envelope.event_type,
                        envelope.id,
                        e
                    );
                    (WebhookEventStatus::Failed, Some(e.to_string()))
                }
            }
        }
    };

    queries::insert_webhook_event(
        &tx,
        &CreateWebhookEvent {
            event_id: &envelope.id,
            event_type: &envelope.event_type,
            app_id: envelope.app_id.as_deref(),
            app_user_id: envelope.app_user_id.as_deref(),
            environment: envelope.environment,
            store: envelope.store,
            payload: raw,
            status,
            error: error.as_deref(),
        },
    )?;
    tx.commit()?;

    match (status, error) {
        (WebhookEventStatus::Failed, Some(message)) => Err(AppError::HandlerFailure {
            event_id: envelope.id.clone(),
            message,
        }),
        (WebhookEventStatus::Processed, _) => {
            tracing::info!("Processed webhook {} ({})", envelope.id, envelope.event_type);
            Ok(ProcessResult::new(true, &envelope.id))
        }
        _ => Ok(ProcessResult::new(false, &envelope.id)),
    }
}
