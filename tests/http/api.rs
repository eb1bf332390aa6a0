//! Read API and manual entitlement overrides

#[path = "../common/mod.rs"]
mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use common::*;

const FAR_FUTURE: i64 = 4_102_444_800_000;

fn seed(state: &AppState, events: &[serde_json::Value]) {
    let mut conn = state.db.get().unwrap();
    for event in events {
        apply(&mut conn, event);
    }
}

#[tokio::test]
async fn test_health_needs_no_key() {
    let app = app(create_test_app_state());
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_api_requires_key() {
    let app = app(create_test_app_state());

    let request = Request::builder()
        .uri("/v1/customers/user_1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/v1/customers/user_1")
        .header("Authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_customer_is_404() {
    let app = app(create_test_app_state());
    let (status, body) = send(&app, api_request("GET", "/v1/customers/ghost", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_customer_lookup_by_id_and_original_id() {
    let state = create_test_app_state();
    seed(
        &state,
        &[with(
            event("evt_1", "SUBSCRIBER_ALIAS", "user_1"),
            json!({"original_app_user_id": "$RCAnonymousID:abc", "aliases": ["$RCAnonymousID:abc", "user_1"]}),
        )],
    );
    let app = app(state);

    let (status, customer) = send(&app, api_request("GET", "/v1/customers/user_1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customer["app_user_id"], "user_1");

    let (status, found) = send(
        &app,
        api_request(
            "GET",
            "/v1/customers?original_app_user_id=%24RCAnonymousID%3Aabc",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["app_user_id"], "user_1");

    let (status, _) = send(&app, api_request("GET", "/v1/customers", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_entitlement_grant_check_revoke() {
    let app = app(create_test_app_state());
    let uri = "/v1/customers/user_1/entitlements/premium";

    let (_, check) = send(&app, api_request("GET", uri, None)).await;
    assert_eq!(check["active"], false, "unknown entitlements read as inactive");

    let (status, granted) = send(
        &app,
        api_request("POST", uri, Some(json!({"product_id": "promo", "expires_at_ms": FAR_FUTURE}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(granted["is_active"], true);
    assert_eq!(granted["product_id"], "promo");

    let (_, check) = send(&app, api_request("GET", uri, None)).await;
    assert_eq!(check["active"], true);

    let (status, _) = send(&app, api_request("DELETE", uri, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, check) = send(&app, api_request("GET", uri, None)).await;
    assert_eq!(check["active"], false);

    let (status, _) = send(
        &app,
        api_request("DELETE", "/v1/customers/user_1/entitlements/missing", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_entitlement_list_active_filter() {
    let state = create_test_app_state();
    // Event timestamps are in the past, so this expiry is already behind wall-clock time
    seed(&state, &[purchase("evt_1", "user_1", "otx_1", &["premium"], T0 + DAY)]);
    let app = app(state);

    send(
        &app,
        api_request(
            "POST",
            "/v1/customers/user_1/entitlements/lifetime",
            Some(json!({})),
        ),
    )
    .await;

    let (_, all) = send(&app, api_request("GET", "/v1/customers/user_1/entitlements", None)).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, active) = send(
        &app,
        api_request("GET", "/v1/customers/user_1/entitlements?active=true", None),
    )
    .await;
    let active = active.as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["entitlement_id"], "lifetime");
}

#[tokio::test]
async fn test_subscription_routes() {
    let state = create_test_app_state();
    seed(&state, &[purchase("evt_1", "user_1", "otx_1", &["premium"], T0 + DAY)]);
    let app = app(state);

    let (status, sub) = send(&app, api_request("GET", "/v1/subscriptions/otx_1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sub["product_id"], "premium_monthly");

    let (status, grace) = send(
        &app,
        api_request("GET", "/v1/subscriptions/otx_1/grace-period", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grace["in_grace_period"], false);

    let (status, _) = send(&app, api_request("GET", "/v1/subscriptions/otx_missing", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, subs) = send(
        &app,
        api_request("GET", "/v1/customers/user_1/subscriptions", None),
    )
    .await;
    assert_eq!(subs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_event_routes() {
    let state = create_test_app_state();
    seed(
        &state,
        &[
            event("evt_1", "TEST", "user_1"),
            event("evt_2", "SUBSCRIBER_ALIAS", "user_1"),
        ],
    );
    {
        let mut conn = state.db.get().unwrap();
        let _ = deliver(
            &mut conn,
            &purchase("evt_bad", "user_1", "otx_1", &[""], T0 + DAY),
        );
    }
    let app = app(state);

    let (status, event) = send(&app, api_request("GET", "/v1/webhook-events/evt_1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["status"], "processed");

    let (_, by_user) = send(
        &app,
        api_request("GET", "/v1/webhook-events?app_user_id=user_1&limit=2", None),
    )
    .await;
    assert_eq!(by_user.as_array().unwrap().len(), 2);

    let (_, by_type) = send(
        &app,
        api_request("GET", "/v1/webhook-events?event_type=TEST", None),
    )
    .await;
    assert_eq!(by_type.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, api_request("GET", "/v1/webhook-events", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, failed) = send(&app, api_request("GET", "/v1/webhook-events/failed", None)).await;
    let failed = failed.as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["event_id"], "evt_bad");

    let (status, _) = send(&app, api_request("GET", "/v1/webhook-events/evt_nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_virtual_currency_routes() {
    let state = create_test_app_state();
    seed(
        &state,
        &[with(
            event("evt_vc", "VIRTUAL_CURRENCY_TRANSACTION", "user_1"),
            json!({
                "adjustments": [{"amount": 50, "currency": {"code": "GEM", "name": "Gems"}}],
                "virtual_currency_transaction_id": "vctx_1",
            }),
        )],
    );
    let app = app(state);

    let (status, balance) = send(
        &app,
        api_request("GET", "/v1/customers/user_1/virtual-currency/GEM", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["balance"], 50);

    let (_, balances) = send(
        &app,
        api_request("GET", "/v1/customers/user_1/virtual-currency", None),
    )
    .await;
    assert_eq!(balances.as_array().unwrap().len(), 1);

    let (_, txs) = send(
        &app,
        api_request(
            "GET",
            "/v1/customers/user_1/virtual-currency-transactions?currency_code=GEM",
            None,
        ),
    )
    .await;
    assert_eq!(txs.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        api_request("GET", "/v1/customers/user_1/virtual-currency/COIN", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_transfer_and_invoice_routes() {
    let state = create_test_app_state();
    seed(
        &state,
        &[
            purchase("evt_1", "anon_1", "otx_1", &["premium"], T0 + DAY),
            with(
                event("evt_tr", "TRANSFER", "anon_1"),
                json!({"transferred_from": ["anon_1"], "transferred_to": ["user_1"]}),
            ),
            with(
                event("evt_inv", "INVOICE_ISSUANCE", "user_1"),
                json!({"invoice_id": "inv_1", "price": 9.99, "currency": "USD", "product_id": "premium_monthly"}),
            ),
        ],
    );
    let app = app(state);

    let (status, transfer) = send(&app, api_request("GET", "/v1/transfers/evt_tr", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transfer["transferred_to"], json!(["user_1"]));

    let (_, transfers) = send(&app, api_request("GET", "/v1/transfers?limit=10", None)).await;
    assert_eq!(transfers.as_array().unwrap().len(), 1);

    let (status, invoice) = send(&app, api_request("GET", "/v1/invoices/inv_1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoice["app_user_id"], "user_1");

    let (_, invoices) = send(
        &app,
        api_request("GET", "/v1/customers/user_1/invoices", None),
    )
    .await;
    assert_eq!(invoices.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_experiment_routes() {
    let state = create_test_app_state();
    seed(
        &state,
        &[with(
            event("evt_exp", "EXPERIMENT_ENROLLMENT", "user_1"),
            json!({"experiment_id": "exp_1", "experiment_variant": "b", "offering_id": "off_b"}),
        )],
    );
    let app = app(state);

    let (status, exp) = send(
        &app,
        api_request("GET", "/v1/customers/user_1/experiments/exp_1", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exp["variant"], "b");

    let (_, enrollments) = send(
        &app,
        api_request("GET", "/v1/experiments/exp_1/enrollments", None),
    )
    .await;
    assert_eq!(enrollments.as_array().unwrap().len(), 1);

    let (_, list) = send(
        &app,
        api_request("GET", "/v1/customers/user_1/experiments", None),
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}
