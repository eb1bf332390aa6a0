use rusqlite::{Connection, params, types::Value};

use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::*;
use crate::util::{MS_PER_DAY, now_ms};

use super::from_row::{
    CUSTOMER_COLS, ENTITLEMENT_COLS, EXPERIMENT_COLS, INVOICE_COLS, SUBSCRIPTION_COLS,
    TRANSFER_COLS, VC_BALANCE_COLS, VC_TRANSACTION_COLS, WEBHOOK_EVENT_COLS, query_all, query_one,
};

/// Default page size for event-log listings.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Rows deleted per statement when purging the event log.
pub const PURGE_BATCH_SIZE: i64 = 500;

fn now() -> i64 {
    now_ms()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query.
struct UpdateBuilder {
    table: &'static str,
    key_column: &'static str,
    key: String,
    fields: Vec<(&'static str, Value)>,
}

impl UpdateBuilder {
    fn new(table: &'static str, key_column: &'static str, key: &str) -> Self {
        Self {
            table,
            key_column,
            key: key.to_string(),
            fields: Vec::new(),
        }
    }

    /// Outer `None` skips the column, `Some(None)` writes NULL.
    fn set_patch<V: Into<Value>>(mut self, column: &'static str, patch: Option<Option<V>>) -> Self {
        match patch {
            Some(Some(v)) => self.fields.push((column, v.into())),
            Some(None) => self.fields.push((column, Value::Null)),
            None => {}
        }
        self
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        self.fields.push(("updated_at", now().into()));
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table,
            sets.join(", "),
            self.key_column
        );
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.key.into());
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Customers ============

/// What one event says about a customer.
#[derive(Debug, Clone)]
pub struct CustomerObservation<'a> {
    pub app_user_id: &'a str,
    pub original_app_user_id: Option<&'a str>,
    pub aliases: &'a [String],
    pub attributes: Option<&'a SubscriberAttributes>,
    pub seen_at: i64,
}

pub fn get_customer(conn: &Connection, app_user_id: &str) -> Result<Option<Customer>> {
    query_one(
        conn,
        &format!("SELECT {} FROM customers WHERE app_user_id = ?1", CUSTOMER_COLS),
        &[&app_user_id],
    )
}

pub fn get_customer_by_original_id(
    conn: &Connection,
    original_app_user_id: &str,
) -> Result<Option<Customer>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM customers WHERE original_app_user_id = ?1 ORDER BY first_seen_at LIMIT 1",
            CUSTOMER_COLS
        ),
        &[&original_app_user_id],
    )
}

/// Create the customer or fold the observation into the existing row.
///
/// `first_seen_at` is fixed at insert. Aliases are unioned, attributes merged
/// per key by `updated_at_ms`, and `last_seen_at` only moves forward.
pub fn upsert_customer(conn: &Connection, obs: &CustomerObservation) -> Result<Customer> {
    let original_app_user_id = obs.original_app_user_id.unwrap_or(obs.app_user_id);
    let now = now();

    match get_customer(conn, obs.app_user_id)? {
        Some(mut customer) => {
            merge_aliases(&mut customer.aliases, obs.aliases);
            if let Some(incoming) = obs.attributes {
                merge_attributes(&mut customer.attributes, incoming);
            }
            customer.original_app_user_id = original_app_user_id.to_string();
            customer.last_seen_at = customer.last_seen_at.max(obs.seen_at);
            customer.updated_at = now;

            conn.execute(
                "UPDATE customers SET original_app_user_id = ?1, aliases = ?2, attributes = ?3,
                 last_seen_at = ?4, updated_at = ?5 WHERE id = ?6",
                params![
                    &customer.original_app_user_id,
                    to_json(&customer.aliases)?,
                    to_json(&customer.attributes)?,
                    customer.last_seen_at,
                    now,
                    &customer.id,
                ],
            )?;
            Ok(customer)
        }
        None => {
            let mut aliases = Vec::new();
            merge_aliases(&mut aliases, obs.aliases);
            let mut attributes = SubscriberAttributes::new();
            if let Some(incoming) = obs.attributes {
                merge_attributes(&mut attributes, incoming);
            }
            let customer = Customer {
                id: EntityType::Customer.gen_id(),
                app_user_id: obs.app_user_id.to_string(),
                original_app_user_id: original_app_user_id.to_string(),
                aliases,
                attributes,
                first_seen_at: obs.seen_at,
                last_seen_at: obs.seen_at,
                updated_at: now,
            };

            conn.execute(
                "INSERT INTO customers (id, app_user_id, original_app_user_id, aliases, attributes, first_seen_at, last_seen_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    &customer.id,
                    &customer.app_user_id,
                    &customer.original_app_user_id,
                    to_json(&customer.aliases)?,
                    to_json(&customer.attributes)?,
                    customer.first_seen_at,
                    customer.last_seen_at,
                    customer.updated_at,
                ],
            )?;
            Ok(customer)
        }
    }
}

// ============ Entitlements ============

pub fn get_entitlement(
    conn: &Connection,
    app_user_id: &str,
    entitlement_id: &str,
) -> Result<Option<Entitlement>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM entitlements WHERE app_user_id = ?1 AND entitlement_id = ?2",
            ENTITLEMENT_COLS
        ),
        &[&app_user_id, &entitlement_id],
    )
}

pub fn list_entitlements(conn: &Connection, app_user_id: &str) -> Result<Vec<Entitlement>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM entitlements WHERE app_user_id = ?1 ORDER BY entitlement_id",
            ENTITLEMENT_COLS
        ),
        &[&app_user_id],
    )
}

/// Create or re-activate an entitlement. Clears any billing-issue marker.
pub fn grant_entitlement(
    conn: &Connection,
    app_user_id: &str,
    entitlement_id: &str,
    grant: &GrantEntitlement,
) -> Result<()> {
    conn.execute(
        "INSERT INTO entitlements (id, app_user_id, entitlement_id, product_id, is_active, expires_at_ms, purchased_at_ms, store, is_sandbox, billing_issue_detected_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8, NULL, ?9)
         ON CONFLICT(app_user_id, entitlement_id) DO UPDATE SET
            product_id = excluded.product_id,
            is_active = 1,
            expires_at_ms = excluded.expires_at_ms,
            purchased_at_ms = excluded.purchased_at_ms,
            store = excluded.store,
            is_sandbox = excluded.is_sandbox,
            billing_issue_detected_at = NULL,
            updated_at = excluded.updated_at",
        params![
            EntityType::Entitlement.gen_id(),
            app_user_id,
            entitlement_id,
            &grant.product_id,
            grant.expires_at_ms,
            grant.purchased_at_ms,
            grant.store.as_ref().map(|s| s.as_ref()),
            grant.is_sandbox,
            now(),
        ],
    )?;
    Ok(())
}

/// Move an existing entitlement's expiry and re-activate it.
/// Returns false if the user has no such entitlement.
pub fn extend_entitlement(
    conn: &Connection,
    app_user_id: &str,
    entitlement_id: &str,
    expires_at_ms: Option<i64>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE entitlements SET is_active = 1, expires_at_ms = ?1, billing_issue_detected_at = NULL, updated_at = ?2
         WHERE app_user_id = ?3 AND entitlement_id = ?4",
        params![expires_at_ms, now(), app_user_id, entitlement_id],
    )?;
    Ok(affected > 0)
}

/// Flag a billing issue on an existing entitlement without touching `is_active`.
pub fn mark_entitlement_billing_issue(
    conn: &Connection,
    app_user_id: &str,
    entitlement_id: &str,
    detected_at: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE entitlements SET billing_issue_detected_at = ?1, updated_at = ?2
         WHERE app_user_id = ?3 AND entitlement_id = ?4",
        params![detected_at, now(), app_user_id, entitlement_id],
    )?;
    Ok(affected > 0)
}

/// Soft-revoke a user's entitlements (all of them when `entitlement_ids` is None)
/// and clear their billing-issue markers. Returns the number of rows touched.
pub fn revoke_entitlements(
    conn: &Connection,
    app_user_id: &str,
    entitlement_ids: Option<&[String]>,
) -> Result<usize> {
    let now = now();
    let sql = "UPDATE entitlements SET is_active = 0, billing_issue_detected_at = NULL, updated_at = ?1
               WHERE app_user_id = ?2 AND (is_active = 1 OR billing_issue_detected_at IS NOT NULL)";
    match entitlement_ids {
        None => Ok(conn.execute(sql, params![now, app_user_id])?),
        Some(ids) => {
            let sql = format!("{} AND entitlement_id = ?3", sql);
            let mut total = 0;
            for id in ids {
                total += conn.execute(&sql, params![now, app_user_id, id])?;
            }
            Ok(total)
        }
    }
}

// ============ Subscriptions ============

pub fn get_subscription(
    conn: &Connection,
    original_transaction_id: &str,
) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE original_transaction_id = ?1",
            SUBSCRIPTION_COLS
        ),
        &[&original_transaction_id],
    )
}

pub fn list_subscriptions(conn: &Connection, app_user_id: &str) -> Result<Vec<Subscription>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE app_user_id = ?1 ORDER BY purchased_at_ms DESC",
            SUBSCRIPTION_COLS
        ),
        &[&app_user_id],
    )
}

/// Write every event-mirrored field, then apply the event type's overrides.
pub fn upsert_subscription(
    conn: &Connection,
    input: &UpsertSubscription,
    overrides: &SubscriptionOverrides,
) -> Result<()> {
    let entitlement_ids = input.entitlement_ids.as_ref().map(to_json).transpose()?;
    conn.execute(
        "INSERT INTO subscriptions (id, original_transaction_id, transaction_id, app_user_id, product_id, entitlement_ids,
            store, environment, period_type, purchased_at_ms, expiration_at_ms, is_family_share, is_trial_conversion,
            new_product_id, price_usd, currency, price_in_purchased_currency, country_code, tax_percentage,
            commission_percentage, offer_code, presented_offering_id, renewal_number, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)
         ON CONFLICT(original_transaction_id) DO UPDATE SET
            transaction_id = excluded.transaction_id,
            app_user_id = excluded.app_user_id,
            product_id = excluded.product_id,
            entitlement_ids = excluded.entitlement_ids,
            store = excluded.store,
            environment = excluded.environment,
            period_type = excluded.period_type,
            purchased_at_ms = excluded.purchased_at_ms,
            expiration_at_ms = excluded.expiration_at_ms,
            is_family_share = excluded.is_family_share,
            is_trial_conversion = excluded.is_trial_conversion,
            new_product_id = excluded.new_product_id,
            price_usd = excluded.price_usd,
            currency = excluded.currency,
            price_in_purchased_currency = excluded.price_in_purchased_currency,
            country_code = excluded.country_code,
            tax_percentage = excluded.tax_percentage,
            commission_percentage = excluded.commission_percentage,
            offer_code = excluded.offer_code,
            presented_offering_id = excluded.presented_offering_id,
            renewal_number = excluded.renewal_number,
            updated_at = excluded.updated_at",
        params![
            EntityType::Subscription.gen_id(),
            &input.original_transaction_id,
            &input.transaction_id,
            &input.app_user_id,
            &input.product_id,
            entitlement_ids,
            input.store.as_ref(),
            input.environment.as_ref(),
            input.period_type.as_ref(),
            input.purchased_at_ms,
            input.expiration_at_ms,
            input.is_family_share,
            input.is_trial_conversion,
            &input.new_product_id,
            input.price_usd,
            &input.currency,
            input.price_in_purchased_currency,
            &input.country_code,
            input.tax_percentage,
            input.commission_percentage,
            &input.offer_code,
            &input.presented_offering_id,
            input.renewal_number,
            now(),
        ],
    )?;

    UpdateBuilder::new(
        "subscriptions",
        "original_transaction_id",
        &input.original_transaction_id,
    )
    .set_patch("cancel_reason", overrides.cancel_reason.clone())
    .set_patch("expiration_reason", overrides.expiration_reason.clone())
    .set_patch(
        "grace_period_expiration_at_ms",
        overrides.grace_period_expiration_at_ms,
    )
    .set_patch("billing_issue_detected_at", overrides.billing_issue_detected_at)
    .set_patch("auto_resume_at_ms", overrides.auto_resume_at_ms)
    .set_patch("auto_renew_status", overrides.auto_renew_status)
    .execute(conn)?;

    Ok(())
}

/// Re-home a user's subscriptions onto another app user id.
///
/// With a filter, only subscriptions sharing at least one entitlement id with
/// it move. Returns the number moved.
pub fn reassign_subscriptions(
    conn: &Connection,
    from_app_user_id: &str,
    to_app_user_id: &str,
    entitlement_filter: Option<&[String]>,
) -> Result<usize> {
    let mut moved = 0;
    for sub in list_subscriptions(conn, from_app_user_id)? {
        let matches = match entitlement_filter {
            None => true,
            Some(filter) => sub
                .entitlement_ids
                .as_deref()
                .is_some_and(|ids| ids.iter().any(|id| filter.contains(id))),
        };
        if !matches {
            continue;
        }
        moved += conn.execute(
            "UPDATE subscriptions SET app_user_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![to_app_user_id, now(), &sub.id],
        )?;
    }
    Ok(moved)
}

// ============ Experiments ============

pub fn get_experiment(
    conn: &Connection,
    app_user_id: &str,
    experiment_id: &str,
) -> Result<Option<Experiment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM experiments WHERE app_user_id = ?1 AND experiment_id = ?2",
            EXPERIMENT_COLS
        ),
        &[&app_user_id, &experiment_id],
    )
}

pub fn list_experiments(conn: &Connection, app_user_id: &str) -> Result<Vec<Experiment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM experiments WHERE app_user_id = ?1 ORDER BY enrolled_at_ms DESC",
            EXPERIMENT_COLS
        ),
        &[&app_user_id],
    )
}

pub fn list_experiment_enrollments(
    conn: &Connection,
    experiment_id: &str,
) -> Result<Vec<Experiment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM experiments WHERE experiment_id = ?1 ORDER BY enrolled_at_ms DESC",
            EXPERIMENT_COLS
        ),
        &[&experiment_id],
    )
}

/// Record an enrollment. Stale data never replaces a stored row.
/// Returns true if a row was inserted or updated.
pub fn upsert_experiment(
    conn: &Connection,
    app_user_id: &str,
    enrollment: &EnrollExperiment,
    default_enrolled_at: i64,
) -> Result<bool> {
    match get_experiment(conn, app_user_id, &enrollment.experiment_id)? {
        Some(existing) => {
            if !existing.should_replace(&enrollment.variant, enrollment.enrolled_at_ms) {
                return Ok(false);
            }
            conn.execute(
                "UPDATE experiments SET variant = ?1, offering_id = ?2, enrolled_at_ms = ?3, updated_at = ?4 WHERE id = ?5",
                params![
                    &enrollment.variant,
                    enrollment.offering_id.as_ref().or(existing.offering_id.as_ref()),
                    enrollment.enrolled_at_ms.unwrap_or(existing.enrolled_at_ms),
                    now(),
                    &existing.id,
                ],
            )?;
            Ok(true)
        }
        None => {
            conn.execute(
                "INSERT INTO experiments (id, app_user_id, experiment_id, variant, offering_id, enrolled_at_ms, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    EntityType::Experiment.gen_id(),
                    app_user_id,
                    &enrollment.experiment_id,
                    &enrollment.variant,
                    &enrollment.offering_id,
                    enrollment.enrolled_at_ms.unwrap_or(default_enrolled_at),
                    now(),
                ],
            )?;
            Ok(true)
        }
    }
}

// ============ Transfers ============

pub fn record_transfer(
    conn: &Connection,
    event_id: &str,
    transferred_from: &[String],
    transferred_to: &[String],
    entitlement_ids: Option<&[String]>,
    timestamp: i64,
) -> Result<Transfer> {
    let transfer = Transfer {
        id: EntityType::Transfer.gen_id(),
        event_id: event_id.to_string(),
        transferred_from: transferred_from.to_vec(),
        transferred_to: transferred_to.to_vec(),
        entitlement_ids: entitlement_ids.map(|ids| ids.to_vec()),
        timestamp,
        created_at: now(),
    };
    conn.execute(
        "INSERT INTO transfers (id, event_id, transferred_from, transferred_to, entitlement_ids, timestamp, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &transfer.id,
            &transfer.event_id,
            to_json(&transfer.transferred_from)?,
            to_json(&transfer.transferred_to)?,
            transfer.entitlement_ids.as_ref().map(to_json).transpose()?,
            transfer.timestamp,
            transfer.created_at,
        ],
    )?;
    Ok(transfer)
}

pub fn get_transfer_by_event_id(conn: &Connection, event_id: &str) -> Result<Option<Transfer>> {
    query_one(
        conn,
        &format!("SELECT {} FROM transfers WHERE event_id = ?1", TRANSFER_COLS),
        &[&event_id],
    )
}

pub fn list_transfers(conn: &Connection, limit: i64) -> Result<Vec<Transfer>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM transfers ORDER BY timestamp DESC LIMIT ?1",
            TRANSFER_COLS
        ),
        &[&limit],
    )
}

// ============ Invoices ============

/// Store an invoice. The first write for an invoice id wins.
pub fn record_invoice(conn: &Connection, input: &CreateInvoice) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO invoices (id, invoice_id, app_user_id, product_id, store, environment, price_usd, currency, price_in_purchased_currency, issued_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            EntityType::Invoice.gen_id(),
            &input.invoice_id,
            &input.app_user_id,
            &input.product_id,
            input.store.as_ref().map(|s| s.as_ref()),
            input.environment.as_ref().map(|e| e.as_ref()),
            input.price_usd,
            &input.currency,
            input.price_in_purchased_currency,
            input.issued_at,
            now(),
        ],
    )?;
    Ok(affected > 0)
}

pub fn get_invoice(conn: &Connection, invoice_id: &str) -> Result<Option<Invoice>> {
    query_one(
        conn,
        &format!("SELECT {} FROM invoices WHERE invoice_id = ?1", INVOICE_COLS),
        &[&invoice_id],
    )
}

pub fn list_invoices(conn: &Connection, app_user_id: &str) -> Result<Vec<Invoice>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM invoices WHERE app_user_id = ?1 ORDER BY issued_at DESC",
            INVOICE_COLS
        ),
        &[&app_user_id],
    )
}

// ============ Virtual Currency ============

/// Append a ledger entry and fold it into the balance.
///
/// A `(transaction_id, adjustment_index)` pair already in the ledger is
/// skipped, so replaying an adjustment never double-counts. Returns false when
/// skipped.
pub fn apply_currency_adjustment(
    conn: &Connection,
    input: &RecordCurrencyAdjustment,
) -> Result<bool> {
    let now = now();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO virtual_currency_transactions (id, transaction_id, adjustment_index, app_user_id, currency_code, amount, source, product_id, environment, timestamp, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            EntityType::VirtualCurrencyTransaction.gen_id(),
            &input.transaction_id,
            input.adjustment_index,
            &input.app_user_id,
            &input.currency_code,
            input.amount,
            &input.source,
            &input.product_id,
            input.environment.as_ref().map(|e| e.as_ref()),
            input.timestamp,
            now,
        ],
    )?;
    if inserted == 0 {
        return Ok(false);
    }

    let current = get_balance(conn, &input.app_user_id, &input.currency_code)?
        .map(|b| b.balance)
        .unwrap_or(0);
    let balance = current.checked_add(input.amount).ok_or_else(|| {
        AppError::BadRequest(format!(
            "virtual currency balance overflow for {} {}",
            input.app_user_id, input.currency_code
        ))
    })?;

    conn.execute(
        "INSERT INTO virtual_currency_balances (id, app_user_id, currency_code, currency_name, balance, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(app_user_id, currency_code) DO UPDATE SET
            currency_name = excluded.currency_name,
            balance = excluded.balance,
            updated_at = excluded.updated_at",
        params![
            EntityType::VirtualCurrencyBalance.gen_id(),
            &input.app_user_id,
            &input.currency_code,
            &input.currency_name,
            balance,
            now,
        ],
    )?;
    Ok(true)
}

pub fn get_balance(
    conn: &Connection,
    app_user_id: &str,
    currency_code: &str,
) -> Result<Option<VirtualCurrencyBalance>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM virtual_currency_balances WHERE app_user_id = ?1 AND currency_code = ?2",
            VC_BALANCE_COLS
        ),
        &[&app_user_id, &currency_code],
    )
}

pub fn list_balances(conn: &Connection, app_user_id: &str) -> Result<Vec<VirtualCurrencyBalance>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM virtual_currency_balances WHERE app_user_id = ?1 ORDER BY currency_code",
            VC_BALANCE_COLS
        ),
        &[&app_user_id],
    )
}

pub fn list_currency_transactions(
    conn: &Connection,
    app_user_id: &str,
    currency_code: Option<&str>,
) -> Result<Vec<VirtualCurrencyTransaction>> {
    match currency_code {
        Some(code) => query_all(
            conn,
            &format!(
                "SELECT {} FROM virtual_currency_transactions WHERE app_user_id = ?1 AND currency_code = ?2 ORDER BY timestamp DESC, transaction_id, adjustment_index",
                VC_TRANSACTION_COLS
            ),
            &[&app_user_id, &code],
        ),
        None => query_all(
            conn,
            &format!(
                "SELECT {} FROM virtual_currency_transactions WHERE app_user_id = ?1 ORDER BY timestamp DESC, transaction_id, adjustment_index",
                VC_TRANSACTION_COLS
            ),
            &[&app_user_id],
        ),
    }
}

// ============ Webhook Events ============

pub fn get_webhook_event(conn: &Connection, event_id: &str) -> Result<Option<WebhookEvent>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM webhook_events WHERE event_id = ?1",
            WEBHOOK_EVENT_COLS
        ),
        &[&event_id],
    )
}

pub fn webhook_event_exists(conn: &Connection, event_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM webhook_events WHERE event_id = ?1)",
        params![event_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Append the outcome of one delivery. The unique `event_id` makes a second
/// insert for the same delivery fail rather than double-log.
pub fn insert_webhook_event(conn: &Connection, input: &CreateWebhookEvent) -> Result<String> {
    let id = EntityType::WebhookEvent.gen_id();
    conn.execute(
        "INSERT INTO webhook_events (id, event_id, event_type, app_id, app_user_id, environment, store, payload, processed_at, status, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &id,
            input.event_id,
            input.event_type,
            input.app_id,
            input.app_user_id,
            input.environment.as_ref(),
            input.store.as_ref().map(|s| s.as_ref()),
            to_json(input.payload)?,
            now(),
            input.status.as_ref(),
            input.error,
        ],
    )?;
    Ok(id)
}

pub fn list_webhook_events_by_user(
    conn: &Connection,
    app_user_id: &str,
    limit: i64,
) -> Result<Vec<WebhookEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM webhook_events WHERE app_user_id = ?1 ORDER BY processed_at DESC LIMIT ?2",
            WEBHOOK_EVENT_COLS
        ),
        &[&app_user_id, &limit],
    )
}

pub fn list_webhook_events_by_type(
    conn: &Connection,
    event_type: &str,
    limit: i64,
) -> Result<Vec<WebhookEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM webhook_events WHERE event_type = ?1 ORDER BY processed_at DESC LIMIT ?2",
            WEBHOOK_EVENT_COLS
        ),
        &[&event_type, &limit],
    )
}

pub fn list_failed_webhook_events(conn: &Connection, limit: i64) -> Result<Vec<WebhookEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM webhook_events WHERE status = 'failed' ORDER BY processed_at DESC LIMIT ?1",
            WEBHOOK_EVENT_COLS
        ),
        &[&limit],
    )
}

// ============ Event Log Maintenance ============

/// Purge webhook events older than the retention period.
/// Returns the number of deleted records.
pub fn purge_old_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - retention_days * MS_PER_DAY;
    purge_webhook_events_before(conn, cutoff, PURGE_BATCH_SIZE)
}

/// Delete events processed before `cutoff_ms`, `batch_size` rows per statement,
/// until none remain.
pub fn purge_webhook_events_before(
    conn: &Connection,
    cutoff_ms: i64,
    batch_size: i64,
) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let mut total = 0;
    loop {
        let deleted = conn.execute(
            "DELETE FROM webhook_events WHERE id IN (
                SELECT id FROM webhook_events WHERE processed_at < ?1 LIMIT ?2
             )",
            params![cutoff_ms, batch_size],
        )?;
        total += deleted;
        if deleted < batch_size as usize {
            return Ok(total);
        }
    }
}
