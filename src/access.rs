//! Read-time access checks and administrative entitlement changes.
//!
//! Active-ness is never stored as a final answer: these helpers evaluate the
//! model predicates against the caller's `now`, so an expired grant reads as
//! inactive without any sweep having run.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{Entitlement, GracePeriodStatus, GrantEntitlement, Subscription};

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(())
}

// ============ Entitlements ============

pub fn check_entitlement(
    conn: &Connection,
    app_user_id: &str,
    entitlement_id: &str,
    now: i64,
) -> Result<bool> {
    Ok(queries::get_entitlement(conn, app_user_id, entitlement_id)?
        .is_some_and(|ent| ent.is_active_at(now)))
}

pub fn list_active_entitlements(
    conn: &Connection,
    app_user_id: &str,
    now: i64,
) -> Result<Vec<Entitlement>> {
    let mut entitlements = queries::list_entitlements(conn, app_user_id)?;
    entitlements.retain(|ent| ent.is_active_at(now));
    Ok(entitlements)
}

pub fn list_all_entitlements(conn: &Connection, app_user_id: &str) -> Result<Vec<Entitlement>> {
    queries::list_entitlements(conn, app_user_id)
}

/// Grant outside the webhook flow (support tooling, promotions).
pub fn grant_entitlement_manually(
    conn: &Connection,
    app_user_id: &str,
    entitlement_id: &str,
    grant: &GrantEntitlement,
    now: i64,
) -> Result<Entitlement> {
    require_non_empty("app_user_id", app_user_id)?;
    require_non_empty("entitlement_id", entitlement_id)?;

    let grant = GrantEntitlement {
        purchased_at_ms: grant.purchased_at_ms.or(Some(now)),
        ..grant.clone()
    };
    queries::grant_entitlement(conn, app_user_id, entitlement_id, &grant)?;
    tracing::info!("Manually granted {} to {}", entitlement_id, app_user_id);

    queries::get_entitlement(conn, app_user_id, entitlement_id)?
        .ok_or_else(|| AppError::Internal("granted entitlement not readable".into()))
}

/// Soft-revoke one entitlement. Revoking an already inactive grant is a no-op.
pub fn revoke_entitlement(conn: &Connection, app_user_id: &str, entitlement_id: &str) -> Result<()> {
    require_non_empty("app_user_id", app_user_id)?;
    require_non_empty("entitlement_id", entitlement_id)?;

    if queries::get_entitlement(conn, app_user_id, entitlement_id)?.is_none() {
        return Err(AppError::NotFound("Entitlement not found".into()));
    }
    let ids = [entitlement_id.to_string()];
    queries::revoke_entitlements(conn, app_user_id, Some(&ids))?;
    tracing::info!("Manually revoked {} from {}", entitlement_id, app_user_id);
    Ok(())
}

// ============ Subscriptions ============

pub fn list_active_subscriptions(
    conn: &Connection,
    app_user_id: &str,
    now: i64,
) -> Result<Vec<Subscription>> {
    let mut subscriptions = queries::list_subscriptions(conn, app_user_id)?;
    subscriptions.retain(|sub| sub.is_active_at(now));
    Ok(subscriptions)
}

pub fn list_all_subscriptions(conn: &Connection, app_user_id: &str) -> Result<Vec<Subscription>> {
    queries::list_subscriptions(conn, app_user_id)
}

/// None when no subscription has this original transaction id.
pub fn get_subscription_grace_period_status(
    conn: &Connection,
    original_transaction_id: &str,
    now: i64,
) -> Result<Option<GracePeriodStatus>> {
    Ok(queries::get_subscription(conn, original_transaction_id)?
        .map(|sub| sub.grace_period_status(now)))
}
