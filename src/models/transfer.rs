use serde::{Deserialize, Serialize};

/// Append-only audit row for a TRANSFER event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub event_id: String,
    pub transferred_from: Vec<String>,
    pub transferred_to: Vec<String>,
    /// None = every entitlement moved
    pub entitlement_ids: Option<Vec<String>>,
    pub timestamp: i64,
    pub created_at: i64,
}
