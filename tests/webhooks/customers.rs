//! Customer identity and attribute merging

#[path = "../common/mod.rs"]
mod common;

use common::*;
use serde_json::json;

fn alias_event(id: &str, aliases: &[&str], at: i64) -> serde_json::Value {
    with(
        event(id, "SUBSCRIBER_ALIAS", "user_1"),
        json!({"aliases": aliases, "event_timestamp_ms": at}),
    )
}

fn attributes_event(id: &str, attrs: serde_json::Value) -> serde_json::Value {
    with(
        event(id, "SUBSCRIBER_ALIAS", "user_1"),
        json!({"subscriber_attributes": attrs}),
    )
}

#[test]
fn test_first_event_creates_customer() {
    let mut conn = setup_test_db();
    apply(&mut conn, &alias_event("evt_1", &["anon_1"], T0));

    let customer = queries::get_customer(&conn, "user_1").unwrap().expect("customer");
    assert!(customer.id.starts_with("bm_cus_"));
    assert_eq!(customer.original_app_user_id, "user_1");
    assert_eq!(customer.aliases, vec!["anon_1".to_string()]);
    assert_eq!(customer.first_seen_at, T0);
    assert_eq!(customer.last_seen_at, T0);
}

#[test]
fn test_aliases_are_unioned() {
    let mut conn = setup_test_db();
    apply(&mut conn, &alias_event("evt_1", &["anon_1", "anon_2"], T0));
    apply(&mut conn, &alias_event("evt_2", &["anon_2", "anon_3"], T0 + HOUR));

    let customer = queries::get_customer(&conn, "user_1").unwrap().unwrap();
    assert_eq!(customer.aliases, vec!["anon_1", "anon_2", "anon_3"]);
}

#[test]
fn test_first_seen_is_fixed_and_last_seen_advances() {
    let mut conn = setup_test_db();
    apply(&mut conn, &alias_event("evt_1", &[], T0 + HOUR));
    apply(&mut conn, &alias_event("evt_2", &[], T0 + 2 * HOUR));
    apply(&mut conn, &alias_event("evt_3", &[], T0));

    let customer = queries::get_customer(&conn, "user_1").unwrap().unwrap();
    assert_eq!(customer.first_seen_at, T0 + HOUR);
    assert_eq!(customer.last_seen_at, T0 + 2 * HOUR, "late delivery does not move last_seen back");
}

#[test]
fn test_lookup_by_original_app_user_id() {
    let mut conn = setup_test_db();
    let evt = with(
        event("evt_1", "SUBSCRIBER_ALIAS", "user_1"),
        json!({"original_app_user_id": "$RCAnonymousID:abc"}),
    );
    apply(&mut conn, &evt);

    let customer = queries::get_customer_by_original_id(&conn, "$RCAnonymousID:abc")
        .unwrap()
        .expect("customer by original id");
    assert_eq!(customer.app_user_id, "user_1");
}

#[test]
fn test_attributes_merge_per_key_by_timestamp() {
    let mut conn = setup_test_db();
    apply(
        &mut conn,
        &attributes_event(
            "evt_1",
            json!({
                "__dollar__email": {"value": "old@example.com", "updated_at_ms": 200},
                "plan": {"value": "basic", "updated_at_ms": 100},
            }),
        ),
    );
    apply(
        &mut conn,
        &attributes_event(
            "evt_2",
            json!({
                "__dollar__email": {"value": "stale@example.com", "updated_at_ms": 150},
                "plan": {"value": "pro", "updated_at_ms": 300},
                "locale": {"value": "en", "updated_at_ms": 1},
            }),
        ),
    );

    let attrs = queries::get_customer(&conn, "user_1").unwrap().unwrap().attributes;
    assert_eq!(attrs["__dollar__email"].value, "old@example.com", "older write must lose");
    assert_eq!(attrs["plan"].value, "pro");
    assert_eq!(attrs["locale"].value, "en");
}

#[test]
fn test_equal_attribute_timestamp_keeps_stored_value() {
    let mut conn = setup_test_db();
    apply(
        &mut conn,
        &attributes_event("evt_1", json!({"plan": {"value": "basic", "updated_at_ms": 100}})),
    );
    apply(
        &mut conn,
        &attributes_event("evt_2", json!({"plan": {"value": "pro", "updated_at_ms": 100}})),
    );

    let attrs = queries::get_customer(&conn, "user_1").unwrap().unwrap().attributes;
    assert_eq!(attrs["plan"].value, "basic");
}

#[test]
fn test_event_without_app_user_id_touches_no_customer() {
    let mut conn = setup_test_db();
    let mut evt = event("evt_1", "SUBSCRIBER_ALIAS", "user_1");
    evt.as_object_mut().unwrap().remove("app_user_id");
    apply(&mut conn, &evt);

    assert_eq!(count_rows(&conn, "customers"), 0);
}
