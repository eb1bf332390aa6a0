//! Read API over the mirrored state, plus manual entitlement overrides.

mod customers;
mod entitlements;
mod experiments;
mod invoices;
mod subscriptions;
mod transfers;
mod virtual_currency;
mod webhook_events;

pub use customers::*;
pub use entitlements::*;
pub use experiments::*;
pub use invoices::*;
pub use subscriptions::*;
pub use transfers::*;
pub use virtual_currency::*;
pub use webhook_events::*;

use axum::{Router, middleware, routing::get};
use serde::Deserialize;

use crate::db::{AppState, queries::DEFAULT_LIST_LIMIT};
use crate::middleware::require_api_key;

const MAX_LIST_LIMIT: i64 = 1_000;

#[derive(Debug, Default, Deserialize)]
pub struct ActiveFilterQuery {
    /// Only rows active right now (default: all)
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub fn limit(&self) -> i64 {
        list_limit(self.limit)
    }
}

pub fn list_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Customers
        .route("/v1/customers", get(find_customer))
        .route("/v1/customers/{app_user_id}", get(get_customer))
        // Entitlements
        .route("/v1/customers/{app_user_id}/entitlements", get(list_entitlements))
        .route(
            "/v1/customers/{app_user_id}/entitlements/{entitlement_id}",
            get(check_entitlement)
                .post(grant_entitlement)
                .delete(revoke_entitlement),
        )
        // Subscriptions
        .route("/v1/customers/{app_user_id}/subscriptions", get(list_subscriptions))
        .route("/v1/subscriptions/{original_transaction_id}", get(get_subscription))
        .route(
            "/v1/subscriptions/{original_transaction_id}/grace-period",
            get(get_grace_period_status),
        )
        // Experiments
        .route("/v1/customers/{app_user_id}/experiments", get(list_experiments))
        .route(
            "/v1/customers/{app_user_id}/experiments/{experiment_id}",
            get(get_experiment),
        )
        .route("/v1/experiments/{experiment_id}/enrollments", get(list_enrollments))
        // Invoices
        .route("/v1/customers/{app_user_id}/invoices", get(list_invoices))
        .route("/v1/invoices/{invoice_id}", get(get_invoice))
        // Virtual currency
        .route("/v1/customers/{app_user_id}/virtual-currency", get(list_balances))
        .route(
            "/v1/customers/{app_user_id}/virtual-currency/{currency_code}",
            get(get_balance),
        )
        .route(
            "/v1/customers/{app_user_id}/virtual-currency-transactions",
            get(list_transactions),
        )
        // Transfers
        .route("/v1/transfers", get(list_transfers))
        .route("/v1/transfers/{event_id}", get(get_transfer))
        // Event log
        .route("/v1/webhook-events", get(list_webhook_events))
        .route("/v1/webhook-events/failed", get(list_failed_webhook_events))
        .route("/v1/webhook-events/{event_id}", get(get_webhook_event))
        .layer(middleware::from_fn_with_state(state, require_api_key))
}
