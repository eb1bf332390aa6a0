//! Read-time access checks and manual grants

#[path = "../common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_active_list_filters_at_read_time() {
    let mut conn = setup_test_db();
    apply(&mut conn, &purchase("evt_1", "user_1", "otx_1", &["premium"], T0 + DAY));
    apply(&mut conn, &purchase("evt_2", "user_1", "otx_2", &["extra"], T0 + 10 * DAY));

    let now_active = access::list_active_entitlements(&conn, "user_1", T0).unwrap();
    assert_eq!(now_active.len(), 2);

    let later = access::list_active_entitlements(&conn, "user_1", T0 + 2 * DAY).unwrap();
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].entitlement_id, "extra");

    assert_eq!(access::list_all_entitlements(&conn, "user_1").unwrap().len(), 2);
}

#[test]
fn test_active_subscriptions_filter() {
    let mut conn = setup_test_db();
    apply(&mut conn, &purchase("evt_1", "user_1", "otx_1", &["premium"], T0 + DAY));
    apply(&mut conn, &purchase("evt_2", "user_1", "otx_2", &["extra"], T0 + 10 * DAY));

    let active = access::list_active_subscriptions(&conn, "user_1", T0 + 2 * DAY).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].original_transaction_id, "otx_2");
    assert_eq!(access::list_all_subscriptions(&conn, "user_1").unwrap().len(), 2);
}

#[test]
fn test_grace_status_for_unknown_subscription() {
    let conn = setup_test_db();
    assert!(access::get_subscription_grace_period_status(&conn, "missing", T0).unwrap().is_none());
}

#[test]
fn test_manual_grant_and_revoke() {
    let conn = setup_test_db();
    let grant = GrantEntitlement {
        product_id: Some("promo".into()),
        expires_at_ms: Some(T0 + 7 * DAY),
        ..Default::default()
    };

    let ent = access::grant_entitlement_manually(&conn, "user_1", "premium", &grant, T0).unwrap();
    assert!(ent.is_active);
    assert_eq!(ent.purchased_at_ms, Some(T0), "purchase time defaults to now");
    assert!(access::check_entitlement(&conn, "user_1", "premium", T0 + DAY).unwrap());

    access::revoke_entitlement(&conn, "user_1", "premium").unwrap();
    assert!(!access::check_entitlement(&conn, "user_1", "premium", T0 + DAY).unwrap());
}

#[test]
fn test_manual_grant_rejects_blank_ids() {
    let conn = setup_test_db();
    let err = access::grant_entitlement_manually(&conn, " ", "premium", &GrantEntitlement::default(), T0)
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn test_revoke_unknown_entitlement_is_not_found() {
    let conn = setup_test_db();
    let err = access::revoke_entitlement(&conn, "user_1", "premium").unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn test_manual_grant_clears_billing_marker() {
    let conn = setup_test_db();
    access::grant_entitlement_manually(&conn, "user_1", "premium", &GrantEntitlement::default(), T0)
        .unwrap();
    queries::mark_entitlement_billing_issue(&conn, "user_1", "premium", T0).unwrap();

    let ent = access::grant_entitlement_manually(
        &conn,
        "user_1",
        "premium",
        &GrantEntitlement::default(),
        T0,
    )
    .unwrap();
    assert!(ent.billing_issue_detected_at.is_none());
}
