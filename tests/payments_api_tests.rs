/// Payments API tests
/// Checkout orders, webhook completion, deduplication and signatures
mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::Utc;
use common::TestApp;
use serde_json::{json, Value};
use x67_market::{
    mailer::Notification,
    payments::{signature, PaymentStatus},
};

fn finished(order_code: i64, transaction_id: &str) -> Value {
    json!({
        "EventData": {
            "TransactionId": transaction_id,
            "OrderCode": order_code,
            "StatusId": "F",
        }
    })
}

async fn order(app: &TestApp, token: &str, ad_id: &str, payment_type: &str) -> i64 {
    let response = app
        .post(
            "/api/payments/create-order",
            Some(token),
            json!({"ad_id": ad_id, "payment_type": payment_type}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "order failed: {}", response.body);
    response.body["order_code"].as_i64().unwrap()
}

#[tokio::test]
async fn test_create_order() {
    let app = TestApp::new().await;
    let (token, user_id) = app.register("buyer@example.com", "Buyer").await;
    let ad_id = app.create_active_ad(&token, "Golf 7").await;

    let response = app
        .post(
            "/api/payments/create-order",
            Some(&token),
            json!({"ad_id": ad_id, "payment_type": "promote"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["amount"], 29.99);
    let order_code = response.body["order_code"].as_i64().unwrap();
    assert!(response.body["checkout_url"]
        .as_str()
        .unwrap()
        .ends_with(&order_code.to_string()));

    let stored = app
        .ctx
        .payment_manager
        .find_by_order_code(order_code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.user_id, user_id);
    assert_eq!(stored.amount, 2999);
}

#[tokio::test]
async fn test_create_order_validation() {
    let app = TestApp::new().await;
    let (token, _) = app.register("buyer@example.com", "Buyer").await;
    let ad_id = app.create_active_ad(&token, "Golf 7").await;

    let bad_type = app
        .post(
            "/api/payments/create-order",
            Some(&token),
            json!({"ad_id": ad_id, "payment_type": "gift"}),
        )
        .await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_type.body["detail"], "Invalid payment type");

    let missing_ad = app
        .post(
            "/api/payments/create-order",
            Some(&token),
            json!({"ad_id": "ad_missing", "payment_type": "boost"}),
        )
        .await;
    assert_eq!(missing_ad.status, StatusCode::NOT_FOUND);

    let anonymous = app
        .post(
            "/api/payments/create-order",
            None,
            json!({"ad_id": ad_id, "payment_type": "boost"}),
        )
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_finished_webhook_boosts_once() {
    let mut app = TestApp::new().await;
    let (token, _) = app.register("buyer@example.com", "Buyer").await;
    let ad_id = app.create_active_ad(&token, "Golf 7").await;
    let order_code = order(&app, &token, &ad_id, "boost").await;
    app.drain_notifications();

    let response = app
        .post("/api/payments/webhook", None, finished(order_code, "tx-1"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "received");

    let ad = app.ctx.ad_manager.get(&ad_id).await.unwrap();
    assert!(ad.is_boosted);
    let remaining = (ad.boost_expires_at.unwrap() - Utc::now()).num_seconds();
    assert!((86_395..=86_405).contains(&remaining), "boost window was {}s", remaining);

    let queued = app.drain_notifications();
    assert_eq!(queued.len(), 1);
    assert!(matches!(
        queued[0].notification,
        Notification::PaymentSuccess { amount: 700, .. }
    ));

    // Redelivery is acknowledged but changes nothing
    let again = app
        .post("/api/payments/webhook", None, finished(order_code, "tx-1"))
        .await;
    assert_eq!(again.status, StatusCode::OK);
    assert!(app.drain_notifications().is_empty());

    let verify = app
        .get(&format!("/api/payments/verify/{}", order_code), Some(&token))
        .await;
    assert_eq!(verify.body["status"], "completed");
    assert_eq!(verify.body["payment_type"], "boost");
}

#[tokio::test]
async fn test_failed_effect_leaves_order_pending_for_redelivery() {
    let mut app = TestApp::new().await;
    let (token, _) = app.register("buyer@example.com", "Buyer").await;
    let ad_id = app.create_active_ad(&token, "Golf 7").await;
    let order_code = order(&app, &token, &ad_id, "boost").await;
    app.drain_notifications();

    sqlx::query(
        "CREATE TRIGGER lock_ads BEFORE UPDATE ON ads
         BEGIN SELECT RAISE(ABORT, 'ads locked'); END",
    )
    .execute(&app.ctx.db)
    .await
    .unwrap();

    let first = app
        .post("/api/payments/webhook", None, finished(order_code, "tx-3"))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["status"], "received");

    let payment = app
        .ctx
        .payment_manager
        .find_by_order_code(order_code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.transaction_id.is_none());
    assert!(!app.ctx.ad_manager.get(&ad_id).await.unwrap().is_boosted);
    assert!(app.drain_notifications().is_empty());

    sqlx::query("DROP TRIGGER lock_ads")
        .execute(&app.ctx.db)
        .await
        .unwrap();

    let redelivery = app
        .post("/api/payments/webhook", None, finished(order_code, "tx-3"))
        .await;
    assert_eq!(redelivery.status, StatusCode::OK);

    assert!(app.ctx.ad_manager.get(&ad_id).await.unwrap().is_boosted);
    let verify = app
        .get(&format!("/api/payments/verify/{}", order_code), Some(&token))
        .await;
    assert_eq!(verify.body["status"], "completed");
    assert_eq!(app.drain_notifications().len(), 1);
}

#[tokio::test]
async fn test_post_ad_payment_marks_paid_and_pending() {
    let app = TestApp::new().await;
    let (token, _) = app.register("buyer@example.com", "Buyer").await;
    let ad_id = app.create_ad(&token, "Anunt platit").await;
    let order_code = order(&app, &token, &ad_id, "post_ad").await;

    app.post("/api/payments/webhook", None, finished(order_code, "tx-9"))
        .await;

    let ad = app.ctx.ad_manager.get(&ad_id).await.unwrap();
    assert!(ad.is_paid);
    assert_eq!(ad.status, x67_market::ads::AdStatus::Pending);
}

#[tokio::test]
async fn test_unfinished_and_malformed_webhooks_are_acknowledged() {
    let mut app = TestApp::new().await;
    let (token, _) = app.register("buyer@example.com", "Buyer").await;
    let ad_id = app.create_active_ad(&token, "Golf 7").await;
    let order_code = order(&app, &token, &ad_id, "promote").await;
    app.drain_notifications();

    let pending = app
        .post(
            "/api/payments/webhook",
            None,
            json!({"EventData": {"OrderCode": order_code, "StatusId": "A"}}),
        )
        .await;
    assert_eq!(pending.status, StatusCode::OK);

    let garbage = Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook")
        .body(Body::from("not json"))
        .unwrap();
    assert_eq!(app.send(garbage).await.status, StatusCode::OK);

    let unknown = app
        .post("/api/payments/webhook", None, finished(42, "tx-x"))
        .await;
    assert_eq!(unknown.body["status"], "received");

    assert!(!app.ctx.ad_manager.get(&ad_id).await.unwrap().is_promoted);
    assert!(app.drain_notifications().is_empty());
}

#[tokio::test]
async fn test_signed_webhooks() {
    let app = TestApp::with_config(|config| {
        config.payments.webhook_secret = Some("whsec_test".to_string());
    })
    .await;
    let (token, _) = app.register("buyer@example.com", "Buyer").await;
    let ad_id = app.create_active_ad(&token, "Golf 7").await;
    let order_code = order(&app, &token, &ad_id, "promote").await;
    let body = finished(order_code, "tx-2").to_string();

    let unsigned = Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook")
        .body(Body::from(body.clone()))
        .unwrap();
    assert_eq!(app.send(unsigned).await.status, StatusCode::UNAUTHORIZED);
    assert!(!app.ctx.ad_manager.get(&ad_id).await.unwrap().is_promoted);

    let forged = Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook")
        .header(signature::SIGNATURE_HEADER, "00ff")
        .body(Body::from(body.clone()))
        .unwrap();
    assert_eq!(app.send(forged).await.status, StatusCode::UNAUTHORIZED);

    let signed = Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook")
        .header(
            signature::SIGNATURE_HEADER,
            signature::sign("whsec_test", body.as_bytes()).unwrap(),
        )
        .body(Body::from(body))
        .unwrap();
    assert_eq!(app.send(signed).await.status, StatusCode::OK);
    assert!(app.ctx.ad_manager.get(&ad_id).await.unwrap().is_promoted);
}

#[tokio::test]
async fn test_webhook_verification_key() {
    let unconfigured = TestApp::new().await;
    assert_eq!(
        unconfigured.get("/api/payments/webhook", None).await.status,
        StatusCode::NOT_FOUND
    );

    let app = TestApp::with_config(|config| {
        config.payments.webhook_verification_key = Some("verify-me".to_string());
    })
    .await;
    let response = app.get("/api/payments/webhook", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["Key"], "verify-me");
}

#[tokio::test]
async fn test_verify_is_private_to_payer() {
    let app = TestApp::new().await;
    let (buyer, _) = app.register("buyer@example.com", "Buyer").await;
    let (stranger, _) = app.register("stranger@example.com", "Stranger").await;
    let admin = app.admin().await;
    let ad_id = app.create_active_ad(&buyer, "Golf 7").await;
    let order_code = order(&app, &buyer, &ad_id, "boost").await;
    let path = format!("/api/payments/verify/{}", order_code);

    let own = app.get(&path, Some(&buyer)).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["status"], "pending");

    assert_eq!(app.get(&path, Some(&stranger)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&path, Some(&admin)).await.status, StatusCode::OK);
    assert_eq!(app.get(&path, None).await.status, StatusCode::UNAUTHORIZED);
}
