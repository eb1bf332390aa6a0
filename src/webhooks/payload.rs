//! Typed views over provider webhook events.
//!
//! The dispatcher only needs the envelope. Handlers parse the raw payload
//! into `EventPayload`, so a malformed body fails inside the handler and is
//! recorded as a failed event rather than rejected at the door.

use serde::Deserialize;
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result};
use crate::models::{Environment, PeriodType, Store, SubscriberAttributes};

/// Every event type with a handler. Anything else is logged as ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    InitialPurchase,
    Renewal,
    Cancellation,
    Uncancellation,
    Expiration,
    BillingIssue,
    SubscriptionPaused,
    SubscriptionExtended,
    ProductChange,
    NonRenewingPurchase,
    Transfer,
    TemporaryEntitlementGrant,
    RefundReversed,
    Test,
    InvoiceIssuance,
    VirtualCurrencyTransaction,
    ExperimentEnrollment,
    /// Deprecated upstream; aliases now ride along on every event.
    SubscriberAlias,
}

/// Routing fields pulled from the event before dispatch.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub id: String,
    pub event_type: String,
    pub app_id: Option<String>,
    pub app_user_id: Option<String>,
    pub environment: Environment,
    pub store: Option<Store>,
}

impl EventEnvelope {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "event.id must be a non-empty string".into(),
            ));
        }
        if self.event_type.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "event.type must be a non-empty string".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentPayload {
    pub experiment_id: String,
    pub experiment_variant: String,
    pub enrolled_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyPayload {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

/// One balance change. Integer units, negative for spends.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyAdjustment {
    pub amount: i64,
    pub currency: CurrencyPayload,
}

/// Event body. Most fields are optional because each event type carries a
/// different subset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    /// Absent on TRANSFER events, which use `transferred_from`/`transferred_to`.
    pub app_user_id: Option<String>,
    pub original_app_user_id: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub event_timestamp_ms: Option<i64>,

    pub product_id: Option<String>,
    pub entitlement_ids: Option<Vec<String>>,
    pub period_type: Option<PeriodType>,
    pub purchased_at_ms: Option<i64>,
    pub expiration_at_ms: Option<i64>,
    pub transaction_id: Option<String>,
    pub original_transaction_id: Option<String>,
    pub store: Option<Store>,
    pub environment: Option<Environment>,
    pub is_family_share: Option<bool>,
    pub is_trial_conversion: Option<bool>,

    pub price: Option<f64>,
    pub price_in_purchased_currency: Option<f64>,
    pub currency: Option<String>,
    pub country_code: Option<String>,
    pub tax_percentage: Option<f64>,
    pub commission_percentage: Option<f64>,
    pub offer_code: Option<String>,
    pub presented_offering_id: Option<String>,
    pub renewal_number: Option<i64>,

    pub cancel_reason: Option<String>,
    pub expiration_reason: Option<String>,
    pub grace_period_expiration_at_ms: Option<i64>,
    pub auto_resume_at_ms: Option<i64>,
    pub new_product_id: Option<String>,

    pub transferred_from: Option<Vec<String>>,
    pub transferred_to: Option<Vec<String>>,

    pub experiment_id: Option<String>,
    pub experiment_variant: Option<String>,
    pub offering_id: Option<String>,
    pub experiment_enrolled_at_ms: Option<i64>,
    pub experiments: Option<Vec<ExperimentPayload>>,

    pub adjustments: Option<Vec<CurrencyAdjustment>>,
    pub virtual_currency_transaction_id: Option<String>,
    pub source: Option<String>,

    pub invoice_id: Option<String>,

    /// Keys arrive with `$` already rewritten to `__dollar__`.
    pub subscriber_attributes: Option<SubscriberAttributes>,
}

impl EventPayload {
    /// Decode and check a raw event body.
    pub fn parse(raw: &serde_json::Value) -> Result<Self> {
        let payload = Self::deserialize(raw)
            .map_err(|e| AppError::BadRequest(format!("invalid event payload: {}", e)))?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<()> {
        if let Some(ids) = &self.entitlement_ids
            && ids.iter().any(|id| id.trim().is_empty())
        {
            return Err(AppError::BadRequest("entitlement_ids contains an empty id".into()));
        }
        if let Some(adjustments) = &self.adjustments
            && adjustments.iter().any(|a| a.currency.code.trim().is_empty())
        {
            return Err(AppError::BadRequest("adjustment currency code is empty".into()));
        }
        Ok(())
    }

    /// Provider timestamp, or processing time when the event omits it.
    pub fn timestamp(&self, now_ms: i64) -> i64 {
        self.event_timestamp_ms.unwrap_or(now_ms)
    }

    pub fn is_sandbox(&self) -> bool {
        self.environment.is_some_and(|env| env.is_sandbox())
    }
}
