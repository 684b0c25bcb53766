//! End-to-end webhook endpoint tests.
//!
//! Drives the axum router with `tower::ServiceExt::oneshot`: signed payloads
//! in, acknowledgment statuses and handler side effects out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use payrail::adapters::http::webhook::{webhook_router, WebhookAppState};
use payrail::adapters::payment::signature::hmac_sha256_hex;
use payrail::adapters::payment::ProviderRegistry;
use payrail::application::{HandlerRegistry, WebhookPipeline};
use payrail::config::{PaddleSettings, PaymentConfig, StripeSettings};

const PADDLE_SECRET: &str = "pdl_ntfset_test_secret";
const STRIPE_SECRET: &str = "whsec_test123secret456";

fn paddle_config(require_signature: bool) -> PaymentConfig {
    PaymentConfig {
        provider: "paddle".to_string(),
        require_signature,
        paddle: PaddleSettings {
            api_key: "pdl_api_key".to_string(),
            webhook_secret: PADDLE_SECRET.to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn stripe_config() -> PaymentConfig {
    PaymentConfig {
        provider: "stripe".to_string(),
        stripe: StripeSettings {
            api_key: "sk_test_xxx".to_string(),
            webhook_secret: STRIPE_SECRET.to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn webhook_app(config: PaymentConfig) -> (Router, Arc<HandlerRegistry>) {
    let handlers = Arc::new(HandlerRegistry::new());
    let pipeline = Arc::new(WebhookPipeline::new(
        Arc::new(ProviderRegistry::new(config)),
        handlers.clone(),
    ));
    let app = webhook_router().with_state(WebhookAppState { pipeline });
    (app, handlers)
}

fn paddle_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let signed = format!("{}:{}", timestamp, String::from_utf8_lossy(payload));
    format!(
        "ts={};h1={}",
        timestamp,
        hmac_sha256_hex(secret.as_bytes(), signed.as_bytes())
    )
}

fn stripe_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let signed = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    format!(
        "t={},v1={}",
        timestamp,
        hmac_sha256_hex(secret.as_bytes(), signed.as_bytes())
    )
}

async fn read_received(response: axum::response::Response) -> bool {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");
    let body: serde_json::Value =
        serde_json::from_slice(&bytes).expect("response body should be JSON");
    body["received"].as_bool().expect("received flag present")
}

fn count_payment_success(handlers: &HandlerRegistry) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    handlers.on_payment_success(move |_event| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    calls
}

// ============ Verified acceptance ============

#[tokio::test]
async fn paddle_webhook_with_valid_signature_returns_200_received() {
    let (app, handlers) = webhook_app(paddle_config(false));
    let calls = count_payment_success(&handlers);

    let payload = serde_json::to_vec(&json!({
        "event_id": "evt_1",
        "event_type": "transaction.completed",
        "occurred_at": "2024-01-01T00:00:00Z",
        "data": {
            "id": "txn_1",
            "currency_code": "USD",
            "details": {"totals": {"total": "1999"}}
        }
    }))
    .unwrap();
    let signature = paddle_signature(PADDLE_SECRET, chrono::Utc::now().timestamp(), &payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .header("content-type", "application/json")
                .header("paddle-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(read_received(response).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stripe_webhook_with_valid_signature_dispatches_normalized_event() {
    let (app, handlers) = webhook_app(stripe_config());

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    handlers.on_payment_success(move |event| {
        let sink = sink.clone();
        async move {
            sink.lock()
                .unwrap()
                .push((event.amount, event.currency.clone(), event.subscription_id.clone()));
            Ok(())
        }
    });

    let payload = serde_json::to_vec(&json!({
        "id": "evt_inv_1",
        "type": "invoice.paid",
        "created": 1_704_067_200,
        "data": {"object": {
            "id": "in_1",
            "amount_paid": 2900,
            "currency": "usd",
            "subscription": "sub_42"
        }},
        "livemode": false
    }))
    .unwrap();
    let signature = stripe_signature(STRIPE_SECRET, chrono::Utc::now().timestamp(), &payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .header("content-type", "application/json")
                .header("stripe-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let seen = seen.lock().unwrap();
    assert_eq!(
        seen.as_slice(),
        &[(Some(2900), Some("usd".to_string()), Some("sub_42".to_string()))]
    );
}

// ============ Rejection ============

#[tokio::test]
async fn wrong_signature_returns_401_not_received() {
    let (app, handlers) = webhook_app(paddle_config(false));
    let calls = count_payment_success(&handlers);

    let payload = br#"{"event_type":"transaction.completed","data":{}}"#.to_vec();
    let signature = paddle_signature("wrong_secret", chrono::Utc::now().timestamp(), &payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .header("content-type", "application/json")
                .header("paddle-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!read_received(response).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stripe_stale_timestamp_returns_401_even_with_correct_digest() {
    let (app, _handlers) = webhook_app(stripe_config());

    let payload = serde_json::to_vec(&json!({
        "id": "evt_old",
        "type": "invoice.paid",
        "created": 1_704_067_200,
        "data": {"object": {}}
    }))
    .unwrap();
    // Correct digest for a timestamp ten minutes in the past.
    let stale = chrono::Utc::now().timestamp() - 600;
    let signature = stripe_signature(STRIPE_SECRET, stale, &payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .header("content-type", "application/json")
                .header("stripe-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============ Skip policy ============

#[tokio::test]
async fn missing_secret_and_signature_returns_200_under_permissive_policy() {
    // Mock provider, nothing configured: verification is skipped entirely.
    let (app, _handlers) = webhook_app(PaymentConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"type":"payment.success","data":{}}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(read_received(response).await);
}

#[tokio::test]
async fn missing_signature_returns_401_under_strict_policy() {
    let (app, _handlers) = webhook_app(paddle_config(true));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"event_type":"transaction.completed","data":{}}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!read_received(response).await);
}

// ============ Normalization boundary ============

#[tokio::test]
async fn unmapped_event_type_returns_200_without_dispatch() {
    let (app, handlers) = webhook_app(paddle_config(false));
    let calls = count_payment_success(&handlers);

    let payload = br#"{"event_type":"adjustment.created","data":{}}"#.to_vec();
    let signature = paddle_signature(PADDLE_SECRET, chrono::Utc::now().timestamp(), &payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .header("content-type", "application/json")
                .header("paddle-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ============ Handler isolation ============

#[tokio::test]
async fn failing_handler_does_not_change_response_or_block_siblings() {
    let (app, handlers) = webhook_app(paddle_config(false));

    handlers.on_payment_success(|_event| async {
        Err(payrail::domain::DomainError::internal("handler exploded"))
    });
    let calls = count_payment_success(&handlers);

    let payload = serde_json::to_vec(&json!({
        "event_type": "transaction.completed",
        "data": {"id": "txn_9", "currency_code": "USD", "details": {"totals": {"total": "100"}}}
    }))
    .unwrap();
    let signature = paddle_signature(PADDLE_SECRET, chrono::Utc::now().timestamp(), &payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .header("content-type", "application/json")
                .header("paddle-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(read_received(response).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ============ Hard usage error ============

#[tokio::test]
async fn empty_request_returns_400() {
    let (app, _handlers) = webhook_app(PaymentConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
