mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use storefront_payments::api::router;
use storefront_payments::database::InMemoryLedgerStore;
use tower::ServiceExt;

use common::{app_state, order_42, wallet, MockGateway};

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let response = app.oneshot(request).await.expect("router should respond");
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body, request_id)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn create_qr_payment_returns_created_envelope() {
    let store = InMemoryLedgerStore::new();
    store.seed_order(order_42()).await;
    let gateway = MockGateway::new();
    let app = router(app_state(&store, &gateway, None));

    let request = Request::builder()
        .method("POST")
        .uri("/api/orders/42/payments/qr")
        .header("idempotency-key", "client-key-1")
        .body(Body::empty())
        .unwrap();
    let (status, body, request_id) = send(app, request).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["code"], 201);
    assert_eq!(body["status"], "Created");
    assert_eq!(body["data"]["order_id"], 42);
    assert_eq!(body["data"]["status"], "PENDING");
    assert!(request_id.is_some());
    assert_eq!(
        gateway.last_payment_request().unwrap().idempotency_key,
        "client-key-1"
    );
}

#[tokio::test]
async fn missing_order_returns_error_envelope() {
    let store = InMemoryLedgerStore::new();
    let app = router(app_state(&store, &MockGateway::new(), None));

    let request = Request::builder()
        .method("POST")
        .uri("/api/orders/999/payments/qr")
        .header("x-request-id", "req-abc")
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
    assert_eq!(body["error"], "ORDER_NOT_FOUND");
    assert_eq!(body["request_id"], "req-abc");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn callback_flow_updates_order() {
    let store = InMemoryLedgerStore::new();
    store.seed_order(order_42()).await;
    let gateway = MockGateway::new();
    let state = app_state(&store, &gateway, None);

    let created = state
        .engine
        .create_payment_request(42, "k")
        .await
        .unwrap();

    let callback = serde_json::json!({
        "event": "payment.succeeded",
        "data": {"payment_request_id": created.id, "status": "SUCCEEDED"}
    });
    let (status, body, _) = send(
        router(state.clone()),
        post_json("/api/callbacks/payment-requests", callback.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["applied"], true);
    assert_eq!(store.snapshot().await.orders[&42].payment_status, 1);

    let (status, body, _) = send(
        router(state),
        post_json("/api/callbacks/payment-requests", callback),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["applied"], false);
}

#[tokio::test]
async fn untracked_payment_method_callback_is_acknowledged() {
    let store = InMemoryLedgerStore::new();
    let app = router(app_state(&store, &MockGateway::new(), None));

    let (status, body, _) = send(
        app,
        post_json(
            "/api/callbacks/payment-methods",
            serde_json::json!({"data": {"id": "pm-unknown", "status": "EXPIRED"}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["applied"], false);
}

#[tokio::test]
async fn callback_token_is_enforced() {
    let store = InMemoryLedgerStore::new();
    let state = app_state(&store, &MockGateway::new(), Some("secret-token"));
    let payload = serde_json::json!({"data": {"id": "pr-1", "status": "PAID"}});

    let (status, body, _) = send(
        router(state.clone()),
        post_json("/api/callbacks/payment-requests", payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "INVALID_CALLBACK_TOKEN");

    let mut request = post_json("/api/callbacks/payment-requests", payload);
    request
        .headers_mut()
        .insert("x-callback-token", "secret-token".parse().unwrap());
    let (status, _, _) = send(router(state), request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_callback_is_bad_request() {
    let store = InMemoryLedgerStore::new();
    let app = router(app_state(&store, &MockGateway::new(), None));

    let request = Request::builder()
        .method("POST")
        .uri("/api/callbacks/payment-requests")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body, _) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn payout_endpoints_round_trip() {
    let store = InMemoryLedgerStore::new();
    store.seed_wallet(wallet(7, 100_000)).await;
    let gateway = MockGateway::new();
    gateway.set_balance(500_000);
    let state = app_state(&store, &gateway, None);

    let (status, body, _) = send(
        router(state.clone()),
        post_json(
            "/api/payouts",
            serde_json::json!({
                "user_id": 7,
                "amount": 25000,
                "account_number": "1234567890",
                "account_holder_name": "Budi Santoso",
                "channel_code": "ID_BCA"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let payout_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body, _) = send(
        router(state.clone()),
        Request::builder()
            .uri("/api/admin/balance")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["withdrawable"], "425000");

    let (status, body, _) = send(
        router(state.clone()),
        Request::builder()
            .method("POST")
            .uri(format!("/api/payouts/{}/cancel", payout_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CANCELLED");

    let (status, body, _) = send(
        router(state),
        Request::builder()
            .uri(format!("/api/payouts/{}", payout_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], payout_id.as_str());
}

#[tokio::test]
async fn payout_with_bad_body_is_rejected() {
    let store = InMemoryLedgerStore::new();
    let app = router(app_state(&store, &MockGateway::new(), None));

    let (status, body, _) = send(
        app,
        post_json("/api/payouts", serde_json::json!({"user_id": 7})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn health_reports_ledger() {
    let store = InMemoryLedgerStore::new();
    let app = router(app_state(&store, &MockGateway::new(), None));

    let (status, body, _) = send(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Healthy");
    assert_eq!(body["checks"]["ledger"]["status"], "Up");
}

#[tokio::test]
async fn order_transaction_lookup_and_repeat_charge() {
    let store = InMemoryLedgerStore::new();
    store.seed_order(order_42()).await;
    let gateway = MockGateway::new();
    let state = app_state(&store, &gateway, None);

    let (status, body, _) = send(
        router(state.clone()),
        Request::builder()
            .uri("/api/orders/42/transaction")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "TRANSACTION_NOT_FOUND");

    let created = state.engine.create_payment_request(42, "k1").await.unwrap();

    let (status, body, _) = send(
        router(state.clone()),
        Request::builder()
            .uri("/api/orders/42/transaction")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], created.id.as_str());
    assert_eq!(body["data"]["order"]["id"], 42);

    let (status, body, _) = send(
        router(state),
        Request::builder()
            .method("POST")
            .uri("/api/orders/42/payments/qr")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "PAYMENT_IN_PROGRESS");
}
