//! Handler failures are logged, rolled back and re-raised

#[path = "../common/mod.rs"]
mod common;

use common::*;
use serde_json::json;

/// Purchase whose payload fails to decode after the envelope passes.
fn broken_purchase(id: &str) -> serde_json::Value {
    with(
        purchase(id, "user_1", "otx_1", &["premium"], T0 + DAY),
        json!({"expiration_at_ms": "not a number"}),
    )
}

#[test]
fn test_handler_failure_is_logged_and_raised() {
    let mut conn = setup_test_db();

    let err = deliver(&mut conn, &broken_purchase("evt_bad")).unwrap_err();
    match err {
        AppError::HandlerFailure { event_id, message } => {
            assert_eq!(event_id, "evt_bad");
            assert!(!message.is_empty());
        }
        other => panic!("expected HandlerFailure, got {:?}", other),
    }

    let logged = queries::get_webhook_event(&conn, "evt_bad").unwrap().expect("failed event is logged");
    assert_eq!(logged.status, WebhookEventStatus::Failed);
    assert!(logged.error.is_some());

    let failed = queries::list_failed_webhook_events(&conn, 100).unwrap();
    assert_eq!(failed.len(), 1);
}

#[test]
fn test_failed_redelivery_is_a_duplicate() {
    let mut conn = setup_test_db();
    let evt = broken_purchase("evt_bad");
    assert!(deliver(&mut conn, &evt).is_err());

    let again = deliver(&mut conn, &evt).expect("redelivery is short-circuited");
    assert!(!again.processed);
    assert_eq!(count_rows(&conn, "webhook_events"), 1);
}

#[test]
fn test_partial_writes_are_rolled_back() {
    let mut conn = setup_test_db();
    // Customer upsert runs before the adjustment that overflows
    apply(
        &mut conn,
        &with(
            event("evt_1", "VIRTUAL_CURRENCY_TRANSACTION", "user_1"),
            json!({"adjustments": [{"amount": i64::MAX, "currency": {"code": "COIN", "name": "Coins"}}]}),
        ),
    );
    let before = queries::get_customer(&conn, "user_1").unwrap().unwrap();

    let overflow = with(
        event("evt_2", "VIRTUAL_CURRENCY_TRANSACTION", "user_1"),
        json!({
            "event_timestamp_ms": T0 + DAY,
            "aliases": ["anon_9"],
            "adjustments": [
                {"amount": 1, "currency": {"code": "GEM", "name": "Gems"}},
                {"amount": 1, "currency": {"code": "COIN", "name": "Coins"}},
            ],
        }),
    );
    let err = deliver(&mut conn, &overflow).unwrap_err();
    assert!(matches!(err, AppError::HandlerFailure { .. }));

    let after = queries::get_customer(&conn, "user_1").unwrap().unwrap();
    assert_eq!(after.last_seen_at, before.last_seen_at, "customer touch must roll back");
    assert!(after.aliases.is_empty());
    assert!(queries::get_balance(&conn, "user_1", "GEM").unwrap().is_none());
    assert_eq!(count_rows(&conn, "virtual_currency_transactions"), 1);

    let logged = queries::get_webhook_event(&conn, "evt_2").unwrap().unwrap();
    assert_eq!(logged.status, WebhookEventStatus::Failed);
}

#[test]
fn test_failure_does_not_affect_other_events() {
    let mut conn = setup_test_db();
    assert!(deliver(&mut conn, &broken_purchase("evt_bad")).is_err());
    apply(&mut conn, &purchase("evt_ok", "user_1", "otx_1", &["premium"], T0 + DAY));

    assert!(entitlement(&conn, "user_1", "premium").is_active);
}
