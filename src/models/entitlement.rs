use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    pub id: String,
    pub app_user_id: String,
    pub entitlement_id: String,
    pub product_id: Option<String>,
    /// Stored flag. Use `is_active_at` for the effective state.
    pub is_active: bool,
    /// None = never expires
    pub expires_at_ms: Option<i64>,
    pub purchased_at_ms: Option<i64>,
    pub store: Option<Store>,
    pub is_sandbox: bool,
    /// Set while the store retries a failed charge. Suspends the expiry check.
    pub billing_issue_detected_at: Option<i64>,
    pub updated_at: i64,
}

impl Entitlement {
    /// Effective access at `now_ms`.
    ///
    /// An outstanding billing issue keeps the grant alive past its expiry until
    /// an EXPIRATION event flips `is_active` and clears the marker.
    pub fn is_active_at(&self, now_ms: i64) -> bool {
        self.is_active
            && (self.billing_issue_detected_at.is_some()
                || self.expires_at_ms.is_none_or(|exp| exp > now_ms))
    }
}

/// Fields written when an entitlement is granted (created or re-activated).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrantEntitlement {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub expires_at_ms: Option<i64>,
    #[serde(default)]
    pub purchased_at_ms: Option<i64>,
    #[serde(default)]
    pub store: Option<Store>,
    #[serde(default)]
    pub is_sandbox: bool,
}
