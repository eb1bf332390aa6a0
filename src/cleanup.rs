//! Periodic sweeps that bound table growth.
//!
//! Both only delete rows strictly older than their threshold, so they are safe
//! to run alongside live webhook traffic.

use std::time::Duration;

use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::rate_limit::{self, RateLimitConfig};
use crate::util::now_ms;

const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const WEBHOOK_EVENT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Delete rate-limit rows that no longer fall inside any window.
pub fn sweep_rate_limits(conn: &Connection, config: &RateLimitConfig, now: i64) -> Result<usize> {
    let deleted = rate_limit::purge_expired(conn, config, now)?;
    if deleted > 0 {
        tracing::debug!("Swept {} expired rate-limit rows", deleted);
    }
    Ok(deleted)
}

/// Delete webhook events older than `retention_days` (0 = keep forever).
pub fn sweep_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    if retention_days <= 0 {
        return Ok(0);
    }
    let deleted = queries::purge_old_webhook_events(conn, retention_days)?;
    if deleted > 0 {
        tracing::info!(
            "Purged {} webhook events older than {} days",
            deleted,
            retention_days
        );
    }
    Ok(deleted)
}

/// Run both sweeps once.
pub fn run_all(state: &AppState, retention_days: i64) -> Result<(usize, usize)> {
    let conn = state.db.get()?;
    let rate_limits = sweep_rate_limits(&conn, &state.rate_limit, now_ms())?;
    let events = sweep_webhook_events(&conn, retention_days)?;
    Ok((rate_limits, events))
}

/// Spawn the hourly rate-limit sweep and the daily event-log purge.
pub fn spawn_cleanup_tasks(state: AppState, retention_days: i64) {
    let rate_state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(RATE_LIMIT_SWEEP_INTERVAL).await;
            match rate_state.db.get() {
                Ok(conn) => {
                    if let Err(e) = sweep_rate_limits(&conn, &rate_state.rate_limit, now_ms()) {
                        tracing::warn!("Failed to sweep rate-limit rows: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Failed to get db connection for cleanup: {}", e),
            }
        }
    });

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(WEBHOOK_EVENT_SWEEP_INTERVAL).await;
            match state.db.get() {
                Ok(conn) => {
                    if let Err(e) = sweep_webhook_events(&conn, retention_days) {
                        tracing::warn!("Failed to purge webhook events: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Failed to get db connection for cleanup: {}", e),
            }
        }
    });

    tracing::info!("Background cleanup tasks started (rate limits hourly, events daily)");
}
