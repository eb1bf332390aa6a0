use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::{Environment, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WebhookEventStatus {
    Processed,
    Failed,
    /// Unknown event type. Logged so redelivery is a no-op.
    Ignored,
}

/// One row per delivered event id. Never updated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    pub event_id: String,
    pub event_type: String,
    pub app_id: Option<String>,
    pub app_user_id: Option<String>,
    pub environment: Environment,
    pub store: Option<Store>,
    pub payload: serde_json::Value,
    pub processed_at: i64,
    pub status: WebhookEventStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateWebhookEvent<'a> {
    pub event_id: &'a str,
    pub event_type: &'a str,
    pub app_id: Option<&'a str>,
    pub app_user_id: Option<&'a str>,
    pub environment: Environment,
    pub store: Option<Store>,
    pub payload: &'a serde_json::Value,
    pub status: WebhookEventStatus,
    pub error: Option<&'a str>,
}
