//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! Models implement `FromRow` to describe how they are built from a row
//! selected with the matching `*_COLS` constant; `query_one` and `query_all`
//! then cover the common single/multi-row patterns.

use rusqlite::{Connection, OptionalExtension, Row, ToSql, types::Type};
use serde::de::DeserializeOwned;

use crate::models::*;

/// Parse a TEXT column into an enum, surfacing bad values as a column type error.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?
        .parse::<T>()
        .map_err(|_| rusqlite::Error::InvalidColumnType(col, col_name.to_string(), Type::Text))
}

fn parse_opt_enum<T: std::str::FromStr>(
    row: &Row,
    col: usize,
    col_name: &str,
) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(col)? {
        Some(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|_| rusqlite::Error::InvalidColumnType(col, col_name.to_string(), Type::Text)),
        None => Ok(None),
    }
}

/// Decode a JSON TEXT column.
fn parse_json<T: DeserializeOwned>(row: &Row, col: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(col)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e)))
}

fn parse_opt_json<T: DeserializeOwned>(row: &Row, col: usize) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(col)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const CUSTOMER_COLS: &str = "id, app_user_id, original_app_user_id, aliases, attributes, first_seen_at, last_seen_at, updated_at";

pub const ENTITLEMENT_COLS: &str = "id, app_user_id, entitlement_id, product_id, is_active, expires_at_ms, purchased_at_ms, store, is_sandbox, billing_issue_detected_at, updated_at";

pub const SUBSCRIPTION_COLS: &str = "id, original_transaction_id, transaction_id, app_user_id, product_id, entitlement_ids, store, environment, period_type, purchased_at_ms, expiration_at_ms, is_family_share, is_trial_conversion, auto_renew_status, cancel_reason, expiration_reason, grace_period_expiration_at_ms, billing_issue_detected_at, auto_resume_at_ms, new_product_id, price_usd, currency, price_in_purchased_currency, country_code, tax_percentage, commission_percentage, offer_code, presented_offering_id, renewal_number, updated_at";

pub const EXPERIMENT_COLS: &str =
    "id, app_user_id, experiment_id, variant, offering_id, enrolled_at_ms, updated_at";

pub const TRANSFER_COLS: &str =
    "id, event_id, transferred_from, transferred_to, entitlement_ids, timestamp, created_at";

pub const INVOICE_COLS: &str = "id, invoice_id, app_user_id, product_id, store, environment, price_usd, currency, price_in_purchased_currency, issued_at, created_at";

pub const VC_BALANCE_COLS: &str =
    "id, app_user_id, currency_code, currency_name, balance, updated_at";

pub const VC_TRANSACTION_COLS: &str = "id, transaction_id, adjustment_index, app_user_id, currency_code, amount, source, product_id, environment, timestamp, created_at";

pub const WEBHOOK_EVENT_COLS: &str = "id, event_id, event_type, app_id, app_user_id, environment, store, payload, processed_at, status, error";

// ============ FromRow Implementations ============

impl FromRow for Customer {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Customer {
            id: row.get(0)?,
            app_user_id: row.get(1)?,
            original_app_user_id: row.get(2)?,
            aliases: parse_json(row, 3)?,
            attributes: parse_json(row, 4)?,
            first_seen_at: row.get(5)?,
            last_seen_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for Entitlement {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Entitlement {
            id: row.get(0)?,
            app_user_id: row.get(1)?,
            entitlement_id: row.get(2)?,
            product_id: row.get(3)?,
            is_active: row.get(4)?,
            expires_at_ms: row.get(5)?,
            purchased_at_ms: row.get(6)?,
            store: parse_opt_enum(row, 7, "store")?,
            is_sandbox: row.get(8)?,
            billing_issue_detected_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl FromRow for Subscription {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subscription {
            id: row.get(0)?,
            original_transaction_id: row.get(1)?,
            transaction_id: row.get(2)?,
            app_user_id: row.get(3)?,
            product_id: row.get(4)?,
            entitlement_ids: parse_opt_json(row, 5)?,
            store: parse_enum(row, 6, "store")?,
            environment: parse_enum(row, 7, "environment")?,
            period_type: parse_enum(row, 8, "period_type")?,
            purchased_at_ms: row.get(9)?,
            expiration_at_ms: row.get(10)?,
            is_family_share: row.get(11)?,
            is_trial_conversion: row.get(12)?,
            auto_renew_status: row.get(13)?,
            cancel_reason: row.get(14)?,
            expiration_reason: row.get(15)?,
            grace_period_expiration_at_ms: row.get(16)?,
            billing_issue_detected_at: row.get(17)?,
            auto_resume_at_ms: row.get(18)?,
            new_product_id: row.get(19)?,
            price_usd: row.get(20)?,
            currency: row.get(21)?,
            price_in_purchased_currency: row.get(22)?,
            country_code: row.get(23)?,
            tax_percentage: row.get(24)?,
            commission_percentage: row.get(25)?,
            offer_code: row.get(26)?,
            presented_offering_id: row.get(27)?,
            renewal_number: row.get(28)?,
            updated_at: row.get(29)?,
        })
    }
}

impl FromRow for Experiment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Experiment {
            id: row.get(0)?,
            app_user_id: row.get(1)?,
            experiment_id: row.get(2)?,
            variant: row.get(3)?,
            offering_id: row.get(4)?,
            enrolled_at_ms: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for Transfer {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Transfer {
            id: row.get(0)?,
            event_id: row.get(1)?,
            transferred_from: parse_json(row, 2)?,
            transferred_to: parse_json(row, 3)?,
            entitlement_ids: parse_opt_json(row, 4)?,
            timestamp: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for Invoice {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Invoice {
            id: row.get(0)?,
            invoice_id: row.get(1)?,
            app_user_id: row.get(2)?,
            product_id: row.get(3)?,
            store: parse_opt_enum(row, 4, "store")?,
            environment: parse_opt_enum(row, 5, "environment")?,
            price_usd: row.get(6)?,
            currency: row.get(7)?,
            price_in_purchased_currency: row.get(8)?,
            issued_at: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

impl FromRow for VirtualCurrencyBalance {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(VirtualCurrencyBalance {
            id: row.get(0)?,
            app_user_id: row.get(1)?,
            currency_code: row.get(2)?,
            currency_name: row.get(3)?,
            balance: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for VirtualCurrencyTransaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(VirtualCurrencyTransaction {
            id: row.get(0)?,
            transaction_id: row.get(1)?,
            adjustment_index: row.get(2)?,
            app_user_id: row.get(3)?,
            currency_code: row.get(4)?,
            amount: row.get(5)?,
            source: row.get(6)?,
            product_id: row.get(7)?,
            environment: parse_opt_enum(row, 8, "environment")?,
            timestamp: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

impl FromRow for WebhookEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(WebhookEvent {
            id: row.get(0)?,
            event_id: row.get(1)?,
            event_type: row.get(2)?,
            app_id: row.get(3)?,
            app_user_id: row.get(4)?,
            environment: parse_enum(row, 5, "environment")?,
            store: parse_opt_enum(row, 6, "store")?,
            payload: parse_json(row, 7)?,
            processed_at: row.get(8)?,
            status: parse_enum(row, 9, "status")?,
            error: row.get(10)?,
        })
    }
}
