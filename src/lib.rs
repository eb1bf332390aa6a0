//! Billing mirror - a local, queryable copy of a subscription provider's state
//!
//! Provider webhooks are applied as idempotent state transitions over
//! customers, subscriptions, entitlements, experiments, invoices and virtual
//! currency balances. Access checks then read that state without calling out
//! to the provider.

pub mod access;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod util;
pub mod webhooks;
