//! HTTP surface: routing, signature enforcement and response bodies

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use groove_wallet::api::{build_dispatcher, ApiServer};
use groove_wallet::config::WalletConfig;
use groove_wallet::directory::{InMemoryAccountDirectory, InMemorySessionOracle};
use groove_wallet::signature::{SignatureCodec, SIGNATURE_HEADER};
use groove_wallet::store::{BalanceLedger, MemoryWalletStore};
use rust_decimal_macros::dec;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    store: Arc<MemoryWalletStore>,
    codec: SignatureCodec,
}

fn test_app() -> TestApp {
    let config = WalletConfig::development();
    let store = Arc::new(MemoryWalletStore::new());
    store.add("player-1", dec!(100.00)).unwrap();
    let sessions = Arc::new(InMemorySessionOracle::new());
    sessions.open("sess-1", "player-1", Utc::now() + Duration::hours(1));
    let accounts = Arc::new(InMemoryAccountDirectory::new("USD"));

    let codec = SignatureCodec::new(&config.provider.signature_secret);
    let dispatcher = build_dispatcher(&config, store.clone(), sessions, accounts).unwrap();
    let app = ApiServer::new(config, dispatcher).create_app();
    TestApp { app, store, codec }
}

impl TestApp {
    /// Signed GET /groove; the development preset leaves `request` out of the signature
    fn signed_get(&self, params: &[(&str, &str)]) -> Request<Body> {
        let signature = self.codec.sign(params.iter().copied(), false);
        Request::builder()
            .uri(format!("/groove?{}", query(params)))
            .header(SIGNATURE_HEADER, signature)
            .body(Body::empty())
            .unwrap()
    }
}

fn query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

fn wager_params(transaction_id: &str) -> Vec<(&str, &str)> {
    vec![
        ("request", "wager"),
        ("accountid", "player-1"),
        ("gamesessionid", "sess-1"),
        ("device", "desktop"),
        ("apiversion", "1.2"),
        ("gameid", "80102"),
        ("roundid", "round-1"),
        ("transactionid", transaction_id),
        ("betamount", "30.00"),
    ]
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let t = test_app();
    let response = t
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_signed_wager_over_http() {
    let t = test_app();
    let params = wager_params("tx-http-1");

    let response = t.app.clone().oneshot(t.signed_get(&params)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["status"], "Success");
    assert_eq!(body["balance"], "70.00");
    assert_eq!(body["realmoneybet"], "30.00");
    assert_eq!(body["apiversion"], "1.2");

    let replay = t.app.clone().oneshot(t.signed_get(&params)).await.unwrap();
    let body = json_body(replay).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["status"], "Success - duplicate request");
    assert_eq!(t.store.balance("player-1").unwrap(), dec!(70.00));
}

#[tokio::test]
async fn test_business_rejection_is_http_ok() {
    let t = test_app();
    let params = vec![
        ("request", "wager"),
        ("accountid", "player-1"),
        ("gamesessionid", "sess-1"),
        ("device", "desktop"),
        ("apiversion", "1.2"),
        ("gameid", "80102"),
        ("roundid", "round-1"),
        ("transactionid", "tx-big"),
        ("betamount", "500.00"),
    ];

    let response = t.app.clone().oneshot(t.signed_get(&params)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["code"], 1006);
    assert_eq!(body["balance"], "100.00");
}

#[tokio::test]
async fn test_bad_signature_is_unauthorized() {
    let t = test_app();
    let request = Request::builder()
        .uri(format!("/groove?{}", query(&wager_params("tx-1"))))
        .header(SIGNATURE_HEADER, "00".repeat(32))
        .body(Body::empty())
        .unwrap();

    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], 1001);
    assert_eq!(t.store.balance("player-1").unwrap(), dec!(100.00));
}

#[tokio::test]
async fn test_missing_signature_is_bad_request() {
    let t = test_app();
    let request = Request::builder()
        .uri(format!("/groove?{}", query(&wager_params("tx-1"))))
        .body(Body::empty())
        .unwrap();

    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(t.store.balance("player-1").unwrap(), dec!(100.00));
}

#[tokio::test]
async fn test_unknown_request_is_bad_request() {
    let t = test_app();
    let response = t
        .app
        .clone()
        .oneshot(t.signed_get(&[("request", "cashout")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], 400);
    assert!(body["valid_requests"].is_array());
}

#[tokio::test]
async fn test_batch_wager_over_post() {
    let t = test_app();
    let params = [("request", "wagerbybatch"), ("apiversion", "1.2")];
    let signature = t.codec.sign(params.iter().copied(), false);
    let body = r#"{
        "account_id": "player-1",
        "game_id": "80102",
        "game_session_id": "sess-1",
        "device": "desktop",
        "bets": [
            {"amount": "10.00", "round_id": "r1", "transaction_id": "b1"},
            {"amount": "15.00", "round_id": "r2", "transaction_id": "b2"}
        ]
    }"#;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/groove?{}", query(&params)))
        .header(SIGNATURE_HEADER, signature)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["code"], 200);
    assert_eq!(json["bets"].as_array().unwrap().len(), 2);
    assert_eq!(json["bets"][0]["provider_transaction_id"], "b1");
    assert_eq!(t.store.balance("player-1").unwrap(), dec!(75.00));
}

#[tokio::test]
async fn test_metrics_count_requests() {
    let t = test_app();
    t.app
        .clone()
        .oneshot(t.signed_get(&wager_params("tx-m-1")))
        .await
        .unwrap();

    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("wager"));
}
