//! Per-event-type state transitions.
//!
//! Every write is an upsert keyed by a natural key (app user id, entitlement
//! id, original transaction id, ...), so a transition computed from the same
//! event twice lands on the same state. Virtual currency is the one additive
//! path and is guarded by its ledger's unique transaction id.

use rusqlite::Connection;

use crate::db::queries::{self, CustomerObservation};
use crate::error::Result;
use crate::models::{
    CreateInvoice, EnrollExperiment, GrantEntitlement, RecordCurrencyAdjustment,
    SubscriptionOverrides, UpsertSubscription,
};

use super::payload::{EventPayload, EventType};

/// Per-delivery values handlers may need besides the payload.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub event_id: &'a str,
    pub now: i64,
}

/// Apply the transition for `event_type` to the store.
pub fn apply(
    conn: &Connection,
    event_type: EventType,
    ctx: &HandlerContext,
    raw: &serde_json::Value,
) -> Result<()> {
    if event_type == EventType::Test {
        return Ok(());
    }

    let event = EventPayload::parse(raw)?;

    match event_type {
        EventType::InitialPurchase | EventType::NonRenewingPurchase => {
            handle_purchase(conn, ctx, &event)
        }
        EventType::Renewal => handle_renewal(conn, ctx, &event),
        EventType::Cancellation => handle_cancellation(conn, ctx, &event),
        EventType::Uncancellation => handle_uncancellation(conn, ctx, &event),
        EventType::Expiration => handle_expiration(conn, ctx, &event),
        EventType::BillingIssue => handle_billing_issue(conn, ctx, &event),
        EventType::SubscriptionPaused => handle_subscription_paused(conn, ctx, &event),
        EventType::SubscriptionExtended => handle_subscription_extended(conn, ctx, &event),
        EventType::ProductChange => handle_product_change(conn, ctx, &event),
        EventType::Transfer => handle_transfer(conn, ctx, &event),
        EventType::TemporaryEntitlementGrant => handle_temporary_grant(conn, ctx, &event),
        EventType::RefundReversed => handle_refund_reversed(conn, ctx, &event),
        EventType::InvoiceIssuance => handle_invoice_issuance(conn, ctx, &event),
        EventType::VirtualCurrencyTransaction => handle_currency_transaction(conn, ctx, &event),
        EventType::ExperimentEnrollment => handle_experiment_enrollment(conn, ctx, &event),
        EventType::SubscriberAlias => touch_customer(conn, ctx, &event),
        EventType::Test => Ok(()),
    }
}

// ============ Shared steps ============

fn touch_customer(conn: &Connection, ctx: &HandlerContext, event: &EventPayload) -> Result<()> {
    let Some(app_user_id) = event.app_user_id.as_deref() else {
        return Ok(());
    };
    queries::upsert_customer(
        conn,
        &CustomerObservation {
            app_user_id,
            original_app_user_id: event.original_app_user_id.as_deref(),
            aliases: &event.aliases,
            attributes: event.subscriber_attributes.as_ref(),
            seen_at: event.timestamp(ctx.now),
        },
    )?;
    Ok(())
}

/// Subscription fields from the event, or None if a required one is missing.
fn subscription_from_event(event: &EventPayload, now: i64) -> Option<UpsertSubscription> {
    let original_transaction_id = event.original_transaction_id.clone()?;
    Some(UpsertSubscription {
        transaction_id: event
            .transaction_id
            .clone()
            .unwrap_or_else(|| original_transaction_id.clone()),
        original_transaction_id,
        app_user_id: event.app_user_id.clone()?,
        product_id: event.product_id.clone()?,
        entitlement_ids: event.entitlement_ids.clone(),
        store: event.store?,
        environment: event.environment?,
        period_type: event.period_type?,
        purchased_at_ms: event.purchased_at_ms.unwrap_or(now),
        expiration_at_ms: event.expiration_at_ms,
        is_family_share: event.is_family_share.unwrap_or(false),
        is_trial_conversion: event.is_trial_conversion,
        new_product_id: event.new_product_id.clone(),
        price_usd: event.price,
        currency: event.currency.clone(),
        price_in_purchased_currency: event.price_in_purchased_currency,
        country_code: event.country_code.clone(),
        tax_percentage: event.tax_percentage,
        commission_percentage: event.commission_percentage,
        offer_code: event.offer_code.clone(),
        presented_offering_id: event.presented_offering_id.clone(),
        renewal_number: event.renewal_number,
    })
}

fn upsert_subscription(
    conn: &Connection,
    ctx: &HandlerContext,
    event: &EventPayload,
    overrides: SubscriptionOverrides,
) -> Result<()> {
    match subscription_from_event(event, ctx.now) {
        Some(input) => queries::upsert_subscription(conn, &input, &overrides),
        None => {
            tracing::warn!(
                "Event {} lacks subscription identity fields, skipping subscription write",
                ctx.event_id
            );
            Ok(())
        }
    }
}

fn grant_from_event(event: &EventPayload) -> GrantEntitlement {
    GrantEntitlement {
        product_id: event.product_id.clone(),
        expires_at_ms: event.expiration_at_ms,
        purchased_at_ms: event.purchased_at_ms,
        store: event.store,
        is_sandbox: event.is_sandbox(),
    }
}

fn grant_entitlements(conn: &Connection, event: &EventPayload) -> Result<()> {
    let (Some(app_user_id), Some(ids)) = (&event.app_user_id, &event.entitlement_ids) else {
        return Ok(());
    };
    let grant = grant_from_event(event);
    for entitlement_id in ids {
        queries::grant_entitlement(conn, app_user_id, entitlement_id, &grant)?;
    }
    Ok(())
}

/// Push expiry forward. An entitlement not seen yet (renewal delivered before
/// its purchase) is created from the event instead.
fn extend_entitlements(conn: &Connection, event: &EventPayload) -> Result<()> {
    let (Some(app_user_id), Some(ids)) = (&event.app_user_id, &event.entitlement_ids) else {
        return Ok(());
    };
    for entitlement_id in ids {
        let extended =
            queries::extend_entitlement(conn, app_user_id, entitlement_id, event.expiration_at_ms)?;
        if !extended {
            queries::grant_entitlement(conn, app_user_id, entitlement_id, &grant_from_event(event))?;
        }
    }
    Ok(())
}

fn record_experiments(conn: &Connection, ctx: &HandlerContext, event: &EventPayload) -> Result<()> {
    let (Some(app_user_id), Some(experiments)) = (&event.app_user_id, &event.experiments) else {
        return Ok(());
    };
    for exp in experiments {
        queries::upsert_experiment(
            conn,
            app_user_id,
            &EnrollExperiment {
                experiment_id: exp.experiment_id.clone(),
                variant: exp.experiment_variant.clone(),
                offering_id: None,
                enrolled_at_ms: exp.enrolled_at_ms,
            },
            event.timestamp(ctx.now),
        )?;
    }
    Ok(())
}

// ============ Subscription lifecycle ============

fn handle_purchase(conn: &Connection, ctx: &HandlerContext, event: &EventPayload) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    upsert_subscription(conn, ctx, event, SubscriptionOverrides::default())?;
    grant_entitlements(conn, event)?;
    record_experiments(conn, ctx, event)
}

/// Successful charge: clears billing-issue and grace markers.
fn handle_renewal(conn: &Connection, ctx: &HandlerContext, event: &EventPayload) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    upsert_subscription(
        conn,
        ctx,
        event,
        SubscriptionOverrides {
            billing_issue_detected_at: Some(None),
            grace_period_expiration_at_ms: Some(None),
            ..Default::default()
        },
    )?;
    extend_entitlements(conn, event)?;
    record_experiments(conn, ctx, event)
}

/// Auto-renew turned off. Access continues until EXPIRATION.
fn handle_cancellation(conn: &Connection, ctx: &HandlerContext, event: &EventPayload) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    upsert_subscription(
        conn,
        ctx,
        event,
        SubscriptionOverrides {
            cancel_reason: Some(event.cancel_reason.clone()),
            auto_renew_status: Some(Some(false)),
            ..Default::default()
        },
    )
}

fn handle_uncancellation(
    conn: &Connection,
    ctx: &HandlerContext,
    event: &EventPayload,
) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    upsert_subscription(
        conn,
        ctx,
        event,
        SubscriptionOverrides {
            cancel_reason: Some(None),
            auto_renew_status: Some(Some(true)),
            ..Default::default()
        },
    )
}

fn handle_expiration(conn: &Connection, ctx: &HandlerContext, event: &EventPayload) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    upsert_subscription(
        conn,
        ctx,
        event,
        SubscriptionOverrides {
            expiration_reason: Some(event.expiration_reason.clone()),
            ..Default::default()
        },
    )?;
    if let Some(app_user_id) = &event.app_user_id {
        let revoked =
            queries::revoke_entitlements(conn, app_user_id, event.entitlement_ids.as_deref())?;
        tracing::info!("Revoked {} entitlement(s) for {}", revoked, app_user_id);
    }
    Ok(())
}

/// Charge failed. Entitlements stay active and stop honouring their expiry
/// until the store recovers (RENEWAL) or gives up (EXPIRATION).
fn handle_billing_issue(conn: &Connection, ctx: &HandlerContext, event: &EventPayload) -> Result<()> {
    let detected_at = event.timestamp(ctx.now);
    touch_customer(conn, ctx, event)?;
    upsert_subscription(
        conn,
        ctx,
        event,
        SubscriptionOverrides {
            billing_issue_detected_at: Some(Some(detected_at)),
            grace_period_expiration_at_ms: Some(event.grace_period_expiration_at_ms),
            ..Default::default()
        },
    )?;
    if let (Some(app_user_id), Some(ids)) = (&event.app_user_id, &event.entitlement_ids) {
        for entitlement_id in ids {
            queries::mark_entitlement_billing_issue(conn, app_user_id, entitlement_id, detected_at)?;
        }
    }
    Ok(())
}

fn handle_subscription_paused(
    conn: &Connection,
    ctx: &HandlerContext,
    event: &EventPayload,
) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    upsert_subscription(
        conn,
        ctx,
        event,
        SubscriptionOverrides {
            auto_resume_at_ms: Some(event.auto_resume_at_ms),
            ..Default::default()
        },
    )
}

fn handle_subscription_extended(
    conn: &Connection,
    ctx: &HandlerContext,
    event: &EventPayload,
) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    upsert_subscription(conn, ctx, event, SubscriptionOverrides::default())?;
    extend_entitlements(conn, event)
}

/// Informational. Entitlements follow on the next RENEWAL.
fn handle_product_change(conn: &Connection, ctx: &HandlerContext, event: &EventPayload) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    upsert_subscription(conn, ctx, event, SubscriptionOverrides::default())
}

fn handle_temporary_grant(conn: &Connection, ctx: &HandlerContext, event: &EventPayload) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    grant_entitlements(conn, event)
}

fn handle_refund_reversed(conn: &Connection, ctx: &HandlerContext, event: &EventPayload) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    upsert_subscription(conn, ctx, event, SubscriptionOverrides::default())?;
    grant_entitlements(conn, event)
}

// ============ Transfer ============

/// Move entitlements from every source user to every destination user.
///
/// Each source's currently active entitlements (narrowed by `entitlement_ids`
/// when present) are snapshotted, revoked, and granted to each destination
/// with product, expiry, store and sandbox flag preserved. The source's
/// matching subscriptions move to the first destination.
fn handle_transfer(conn: &Connection, ctx: &HandlerContext, event: &EventPayload) -> Result<()> {
    let sources = event.transferred_from.as_deref().unwrap_or_default();
    let destinations = event.transferred_to.as_deref().unwrap_or_default();
    let filter = event.entitlement_ids.as_deref();
    let timestamp = event.timestamp(ctx.now);

    // No (source, destination) pair to apply, so nothing moves
    if sources.is_empty() || destinations.is_empty() {
        tracing::warn!(
            "Transfer {} has no source or no destination, leaving entitlements in place",
            ctx.event_id
        );
        return Ok(());
    }

    for destination in destinations {
        queries::upsert_customer(
            conn,
            &CustomerObservation {
                app_user_id: destination,
                original_app_user_id: None,
                aliases: &[],
                attributes: None,
                seen_at: timestamp,
            },
        )?;
    }

    for source in sources {
        let moving: Vec<_> = queries::list_entitlements(conn, source)?
            .into_iter()
            .filter(|ent| ent.is_active)
            .filter(|ent| filter.is_none_or(|ids| ids.contains(&ent.entitlement_id)))
            .collect();
        queries::revoke_entitlements(conn, source, filter)?;

        for destination in destinations {
            for ent in &moving {
                queries::grant_entitlement(
                    conn,
                    destination,
                    &ent.entitlement_id,
                    &GrantEntitlement {
                        product_id: ent.product_id.clone(),
                        expires_at_ms: ent.expires_at_ms,
                        purchased_at_ms: ent.purchased_at_ms,
                        store: ent.store,
                        is_sandbox: ent.is_sandbox,
                    },
                )?;
            }
        }

        if let Some(destination) = destinations.first() {
            queries::reassign_subscriptions(conn, source, destination, filter)?;
        }

        tracing::info!(
            "Transferred {} entitlement(s) from {} to {:?}",
            moving.len(),
            source,
            destinations
        );
    }

    queries::record_transfer(conn, ctx.event_id, sources, destinations, filter, timestamp)?;
    Ok(())
}

// ============ Informational events ============

fn handle_invoice_issuance(
    conn: &Connection,
    ctx: &HandlerContext,
    event: &EventPayload,
) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    let Some(app_user_id) = &event.app_user_id else {
        return Ok(());
    };
    queries::record_invoice(
        conn,
        &CreateInvoice {
            invoice_id: event
                .invoice_id
                .clone()
                .unwrap_or_else(|| ctx.event_id.to_string()),
            app_user_id: app_user_id.clone(),
            product_id: event.product_id.clone(),
            store: event.store,
            environment: event.environment,
            price_usd: event.price,
            currency: event.currency.clone(),
            price_in_purchased_currency: event.price_in_purchased_currency,
            issued_at: event.timestamp(ctx.now),
        },
    )?;
    Ok(())
}

fn handle_currency_transaction(
    conn: &Connection,
    ctx: &HandlerContext,
    event: &EventPayload,
) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    let (Some(app_user_id), Some(adjustments)) = (&event.app_user_id, &event.adjustments) else {
        return Ok(());
    };
    let transaction_id = event
        .virtual_currency_transaction_id
        .as_deref()
        .unwrap_or(ctx.event_id);

    for (index, adjustment) in (0_i64..).zip(adjustments) {
        let applied = queries::apply_currency_adjustment(
            conn,
            &RecordCurrencyAdjustment {
                transaction_id: transaction_id.to_string(),
                adjustment_index: index,
                app_user_id: app_user_id.clone(),
                currency_code: adjustment.currency.code.clone(),
                currency_name: adjustment.currency.name.clone(),
                amount: adjustment.amount,
                source: event.source.clone(),
                product_id: event.product_id.clone(),
                environment: event.environment,
                timestamp: event.timestamp(ctx.now),
            },
        )?;
        if !applied {
            tracing::debug!(
                "Currency adjustment {}#{} already applied",
                transaction_id,
                index
            );
        }
    }
    Ok(())
}

fn handle_experiment_enrollment(
    conn: &Connection,
    ctx: &HandlerContext,
    event: &EventPayload,
) -> Result<()> {
    touch_customer(conn, ctx, event)?;
    let (Some(app_user_id), Some(experiment_id), Some(variant)) = (
        &event.app_user_id,
        &event.experiment_id,
        &event.experiment_variant,
    ) else {
        return Ok(());
    };
    queries::upsert_experiment(
        conn,
        app_user_id,
        &EnrollExperiment {
            experiment_id: experiment_id.clone(),
            variant: variant.clone(),
            offering_id: event.offering_id.clone(),
            enrolled_at_ms: event.experiment_enrolled_at_ms,
        },
        event.timestamp(ctx.now),
    )?;
    Ok(())
}
