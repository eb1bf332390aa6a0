//! Webhook event log queries and retention purge

#[path = "../common/mod.rs"]
mod common;

use common::*;

fn log_event(conn: &rusqlite::Connection, id: &str, event_type: &str, user: &str, status: WebhookEventStatus) {
    let payload = event(id, event_type, user);
    queries::insert_webhook_event(
        conn,
        &CreateWebhookEvent {
            event_id: id,
            event_type,
            app_id: Some("app_test"),
            app_user_id: Some(user),
            environment: Environment::Production,
            store: Some(Store::PlayStore),
            payload: &payload,
            status,
            error: None,
        },
    )
    .expect("insert failed");
}

fn backdate(conn: &rusqlite::Connection, id: &str, processed_at: i64) {
    conn.execute(
        "UPDATE webhook_events SET processed_at = ?1 WHERE event_id = ?2",
        rusqlite::params![processed_at, id],
    )
    .unwrap();
}

#[test]
fn test_event_ids_are_unique() {
    let conn = setup_test_db();
    log_event(&conn, "evt_1", "TEST", "user_1", WebhookEventStatus::Processed);

    let payload = serde_json::json!({});
    let dup = queries::insert_webhook_event(
        &conn,
        &CreateWebhookEvent {
            event_id: "evt_1",
            event_type: "TEST",
            app_id: None,
            app_user_id: None,
            environment: Environment::Sandbox,
            store: None,
            payload: &payload,
            status: WebhookEventStatus::Processed,
            error: None,
        },
    );
    assert!(dup.is_err(), "second insert for an event id must fail");
    assert!(queries::webhook_event_exists(&conn, "evt_1").unwrap());
    assert!(!queries::webhook_event_exists(&conn, "evt_2").unwrap());
}

#[test]
fn test_list_by_user_and_type_newest_first() {
    let conn = setup_test_db();
    log_event(&conn, "evt_1", "RENEWAL", "user_1", WebhookEventStatus::Processed);
    log_event(&conn, "evt_2", "RENEWAL", "user_2", WebhookEventStatus::Processed);
    log_event(&conn, "evt_3", "CANCELLATION", "user_1", WebhookEventStatus::Processed);
    backdate(&conn, "evt_1", T0);
    backdate(&conn, "evt_2", T0 + 1);
    backdate(&conn, "evt_3", T0 + 2);

    let by_user = queries::list_webhook_events_by_user(&conn, "user_1", 100).unwrap();
    let ids: Vec<_> = by_user.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["evt_3", "evt_1"]);

    let by_type = queries::list_webhook_events_by_type(&conn, "RENEWAL", 1).unwrap();
    assert_eq!(by_type.len(), 1, "limit applies");
    assert_eq!(by_type[0].event_id, "evt_2");
}

#[test]
fn test_list_failed_only_returns_failures() {
    let conn = setup_test_db();
    log_event(&conn, "evt_ok", "RENEWAL", "user_1", WebhookEventStatus::Processed);
    log_event(&conn, "evt_bad", "RENEWAL", "user_1", WebhookEventStatus::Failed);
    log_event(&conn, "evt_skip", "NEW_THING", "user_1", WebhookEventStatus::Ignored);

    let failed = queries::list_failed_webhook_events(&conn, 100).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].event_id, "evt_bad");
}

#[test]
fn test_purge_deletes_only_old_events() {
    let conn = setup_test_db();
    for i in 0..5 {
        let id = format!("evt_old_{}", i);
        log_event(&conn, &id, "TEST", "user_1", WebhookEventStatus::Processed);
        backdate(&conn, &id, T0 - 40 * DAY);
    }
    log_event(&conn, "evt_new", "TEST", "user_1", WebhookEventStatus::Processed);
    backdate(&conn, "evt_new", T0);

    let deleted = queries::purge_webhook_events_before(&conn, T0 - 30 * DAY, 2).unwrap();
    assert_eq!(deleted, 5, "batches repeat until nothing old remains");
    assert_eq!(count_rows(&conn, "webhook_events"), 1);
    assert!(queries::webhook_event_exists(&conn, "evt_new").unwrap());
}

#[test]
fn test_purge_exact_batch_multiple() {
    let conn = setup_test_db();
    for i in 0..4 {
        let id = format!("evt_{}", i);
        log_event(&conn, &id, "TEST", "user_1", WebhookEventStatus::Processed);
        backdate(&conn, &id, T0 - DAY);
    }
    assert_eq!(queries::purge_webhook_events_before(&conn, T0, 2).unwrap(), 4);
    assert_eq!(count_rows(&conn, "webhook_events"), 0);
}

#[test]
fn test_purge_by_retention_days_keeps_recent() {
    let conn = setup_test_db();
    log_event(&conn, "evt_recent", "TEST", "user_1", WebhookEventStatus::Processed);

    assert_eq!(queries::purge_old_webhook_events(&conn, 30).unwrap(), 0);
    assert!(queries::webhook_event_exists(&conn, "evt_recent").unwrap());
}
