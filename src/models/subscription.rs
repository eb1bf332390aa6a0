use serde::{Deserialize, Serialize};

use super::{Environment, PeriodType, Store};

/// One purchase lineage, keyed by the stable `original_transaction_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub original_transaction_id: String,
    /// Changes on every renewal.
    pub transaction_id: String,
    pub app_user_id: String,
    pub product_id: String,
    pub entitlement_ids: Option<Vec<String>>,
    pub store: Store,
    pub environment: Environment,
    pub period_type: PeriodType,
    pub purchased_at_ms: i64,
    pub expiration_at_ms: Option<i64>,
    pub is_family_share: bool,
    pub is_trial_conversion: Option<bool>,
    pub auto_renew_status: Option<bool>,
    pub cancel_reason: Option<String>,
    pub expiration_reason: Option<String>,
    pub grace_period_expiration_at_ms: Option<i64>,
    pub billing_issue_detected_at: Option<i64>,
    pub auto_resume_at_ms: Option<i64>,
    /// Pending product change, if any
    pub new_product_id: Option<String>,

    // Pricing, informational only
    pub price_usd: Option<f64>,
    pub currency: Option<String>,
    pub price_in_purchased_currency: Option<f64>,
    pub country_code: Option<String>,
    pub tax_percentage: Option<f64>,
    pub commission_percentage: Option<f64>,
    pub offer_code: Option<String>,
    pub presented_offering_id: Option<String>,
    pub renewal_number: Option<i64>,

    pub updated_at: i64,
}

impl Subscription {
    /// Active if it never expires, or the later of expiry and grace end is ahead of `now_ms`.
    pub fn is_active_at(&self, now_ms: i64) -> bool {
        match self.expiration_at_ms {
            None => true,
            Some(exp) => exp.max(self.grace_period_expiration_at_ms.unwrap_or(0)) > now_ms,
        }
    }

    pub fn grace_period_status(&self, now_ms: i64) -> GracePeriodStatus {
        let in_grace_period = self.billing_issue_detected_at.is_some()
            && self.grace_period_expiration_at_ms.is_some_and(|grace| grace > now_ms)
            && self.expiration_at_ms.is_some_and(|exp| exp <= now_ms);

        GracePeriodStatus {
            in_grace_period,
            grace_period_expires_at: self.grace_period_expiration_at_ms,
            billing_issue_detected_at: self.billing_issue_detected_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GracePeriodStatus {
    pub in_grace_period: bool,
    pub grace_period_expires_at: Option<i64>,
    pub billing_issue_detected_at: Option<i64>,
}

/// Event-mirrored subscription fields. Written in full on every lifecycle event.
#[derive(Debug, Clone)]
pub struct UpsertSubscription {
    pub original_transaction_id: String,
    pub transaction_id: String,
    pub app_user_id: String,
    pub product_id: String,
    pub entitlement_ids: Option<Vec<String>>,
    pub store: Store,
    pub environment: Environment,
    pub period_type: PeriodType,
    pub purchased_at_ms: i64,
    pub expiration_at_ms: Option<i64>,
    pub is_family_share: bool,
    pub is_trial_conversion: Option<bool>,
    pub new_product_id: Option<String>,
    pub price_usd: Option<f64>,
    pub currency: Option<String>,
    pub price_in_purchased_currency: Option<f64>,
    pub country_code: Option<String>,
    pub tax_percentage: Option<f64>,
    pub commission_percentage: Option<f64>,
    pub offer_code: Option<String>,
    pub presented_offering_id: Option<String>,
    pub renewal_number: Option<i64>,
}

/// Lifecycle fields a specific event type owns.
///
/// Outer `None` leaves the column untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionOverrides {
    pub cancel_reason: Option<Option<String>>,
    pub expiration_reason: Option<Option<String>>,
    pub grace_period_expiration_at_ms: Option<Option<i64>>,
    pub billing_issue_detected_at: Option<Option<i64>>,
    pub auto_resume_at_ms: Option<Option<i64>>,
    pub auto_renew_status: Option<Option<bool>>,
}
