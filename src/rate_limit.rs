//! Sliding-window rate limiting backed by the `rate_limits` table.
//!
//! One row is inserted per admitted request. A check counts the rows for the
//! key inside the trailing window and admits only while the count is below
//! capacity. Rejected requests leave no trace, so a saturated caller cannot
//! extend its own lockout.
//!
//! Running inside the caller's transaction makes check-and-increment atomic
//! with whatever the request does next.
//!
//! Configure via environment variables:
//! - RATE_LIMIT_MAX_REQUESTS (default: 100)
//! - RATE_LIMIT_WINDOW_MS (default: 60000)

use rusqlite::{Connection, params};

use crate::error::Result;

pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_WINDOW_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Slots left in the window after this request
    pub remaining: u32,
    /// Earliest counted request + window. Approximates when a slot frees up.
    pub reset_at: i64,
}

/// Counter key for webhook deliveries from one provider app.
pub fn webhook_key(app_id: Option<&str>) -> String {
    format!("webhook:{}", app_id.unwrap_or("global"))
}

/// Count recent requests for `key` and record this one if there is room.
pub fn check_and_increment(
    conn: &Connection,
    key: &str,
    config: &RateLimitConfig,
    now_ms: i64,
) -> Result<RateLimitDecision> {
    let window_start = now_ms - config.window_ms;
    let (count, earliest): (i64, Option<i64>) = conn.query_row(
        "SELECT COUNT(*), MIN(timestamp) FROM rate_limits WHERE key = ?1 AND timestamp >= ?2",
        params![key, window_start],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    let reset_at = earliest.unwrap_or(now_ms) + config.window_ms;

    if count >= config.max_requests {
        return Ok(RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_at,
        });
    }

    conn.execute(
        "INSERT INTO rate_limits (key, timestamp) VALUES (?1, ?2)",
        params![key, now_ms],
    )?;

    Ok(RateLimitDecision {
        allowed: true,
        remaining: config.max_requests - count - 1,
        reset_at,
    })
}

/// Delete counter rows that have fallen out of every window.
/// Returns the number of deleted rows.
pub fn purge_expired(conn: &Connection, config: &RateLimitConfig, now_ms: i64) -> Result<usize> {
    let cutoff = now_ms - config.window_ms;
    let deleted = conn.execute("DELETE FROM rate_limits WHERE timestamp < ?1", params![cutoff])?;
    Ok(deleted)
}
