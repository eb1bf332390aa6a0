use std::env;

use crate::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS, RateLimitConfig};

pub const DEFAULT_EVENT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Expected raw `Authorization` header value on webhook deliveries
    pub webhook_auth_token: Option<String>,
    /// Bearer key for the read API
    pub api_key: Option<String>,
    pub rate_limit: RateLimitConfig,
    /// Webhook events older than this are purged (0 = keep forever)
    pub event_retention_days: i64,
    pub dev_mode: bool,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("BILLING_MIRROR_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let webhook_auth_token = non_empty_var("WEBHOOK_AUTH_TOKEN");
        if webhook_auth_token.is_none() && !dev_mode {
            tracing::warn!("WEBHOOK_AUTH_TOKEN not set: webhook deliveries are not authenticated");
        }

        let api_key = non_empty_var("API_KEY");
        if api_key.is_none() && !dev_mode {
            tracing::warn!("API_KEY not set: the read API is open");
        }

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 3000),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "billing_mirror.db".to_string()),
            webhook_auth_token,
            api_key,
            rate_limit: RateLimitConfig {
                max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS", DEFAULT_MAX_REQUESTS).max(1),
                window_ms: parse_var("RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW_MS).max(1),
            },
            event_retention_days: parse_var(
                "WEBHOOK_EVENT_RETENTION_DAYS",
                DEFAULT_EVENT_RETENTION_DAYS,
            )
            .max(0),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
