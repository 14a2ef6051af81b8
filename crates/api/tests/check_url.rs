// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the URL check endpoint

use std::net::SocketAddr;

use api::{ErrorBody, Server, ServerConfig, ShutdownConfig};
use axum::http::StatusCode;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url_classifier::{
    ArtifactName, ArtifactStore, ForestParams, LabelCodec, ModelBundle, RandomForest, extract,
};

const BENIGN_URLS: [&str; 6] = [
    "https://example.com/",
    "https://docs.example.org/guide",
    "https://www.example.net/about",
    "https://example.com/contact",
    "https://shop.example.org/",
    "https://example.net/news",
];

const PHISHING_URLS: [&str; 6] = [
    "http://198.51.100.7/login/verify/account/update.php?id=88812345&session=9912",
    "http://203.0.113.54/secure-banking/confirm/identity.php?user=77712&token=123456",
    "http://192.0.2.14/paypal/signin/webscr/cmd/login-submit.php?ref=99123456",
    "http://198.51.100.91/apple/id/unlock/verify/billing.php?case=55512345&x=1",
    "http://203.0.113.8/wallet/recover/seed/confirm/step2.php?id=44412345&k=777",
    "http://192.0.2.200/office365/mail/login/auth/reset.php?u=33312345&r=8888",
];

/// Train a small forest separating the two URL families and save it
async fn write_bundle(dir: &TempDir, name: &ArtifactName) {
    let labels =
        LabelCodec::new(vec!["benign".to_string(), "phishing".to_string()]).expect("codec");

    let mut features = Vec::new();
    let mut classes = Vec::new();
    for url in BENIGN_URLS {
        features.push(extract(url));
        classes.push(0);
    }
    for url in PHISHING_URLS {
        features.push(extract(url));
        classes.push(1);
    }

    let params = ForestParams {
        n_estimators: 15,
        ..ForestParams::default()
    };
    let forest = RandomForest::fit(&features, &classes, labels.len(), &params).expect("fit");
    let bundle = ModelBundle::new(labels, forest).expect("bundle");

    ArtifactStore::new(dir.path())
        .save(name, &bundle)
        .await
        .expect("save bundle");
}

async fn start(config: ServerConfig) -> (SocketAddr, CancellationToken) {
    Server::new(config, ShutdownConfig::default())
        .await
        .expect("Failed to create server")
        .run_for_testing()
        .await
        .expect("Failed to start test server")
}

async fn ready_server() -> (SocketAddr, CancellationToken, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let name = ArtifactName::default();
    write_bundle(&dir, &name).await;
    let (addr, token) = start(ServerConfig::for_testing().with_model(dir.path(), name)).await;
    (addr, token, dir)
}

async fn degraded_server() -> (SocketAddr, CancellationToken, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let (addr, token) =
        start(ServerConfig::for_testing().with_model(dir.path(), ArtifactName::default())).await;
    (addr, token, dir)
}

async fn check(addr: SocketAddr, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/check-url"))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
async fn benign_url_is_safe() {
    let (addr, token, _dir) = ready_server().await;

    let response = check(addr, json!({"url": "https://example.com/"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body, json!({"status": "SAFE"}));

    token.cancel();
}

#[tokio::test]
async fn phishing_url_is_malicious() {
    let (addr, token, _dir) = ready_server().await;

    let response = check(addr, json!({"url": PHISHING_URLS[0]})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body, json!({"status": "MALICIOUS"}));

    token.cancel();
}

#[tokio::test]
async fn missing_url_is_bad_request() {
    let (addr, token, _dir) = ready_server().await;

    for body in [json!({}), json!({"url": null}), json!({"url": ""})] {
        let response = check(addr, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorBody = response.json().await.expect("error body");
        assert_eq!(error.error, "No URL provided");
    }

    token.cancel();
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (addr, token, _dir) = ready_server().await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/check-url"))
        .header("content-type", "application/json")
        .body(r#"{"url": "https://example.com""#)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorBody = response.json().await.expect("error body");
    assert!(!error.error.is_empty());

    token.cancel();
}

#[tokio::test]
async fn degraded_server_answers_unavailable() {
    let (addr, token, _dir) = degraded_server().await;

    for body in [
        json!({"url": "https://example.com/"}),
        json!({"url": ""}),
        json!({}),
    ] {
        let response = check(addr, body).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let error: ErrorBody = response.json().await.expect("error body");
        assert_eq!(error.error, "model unavailable");
    }

    token.cancel();
}

#[tokio::test]
async fn degraded_server_ignores_unreadable_bodies() {
    let (addr, token, _dir) = degraded_server().await;
    let client = reqwest::Client::new();

    for (content_type, body) in [
        ("application/json", ""),
        ("application/json", "{bad"),
        ("application/json", "[]"),
        ("text/plain", "https://example.com/"),
    ] {
        let response = client
            .post(format!("http://{addr}/check-url"))
            .header("content-type", content_type)
            .body(body)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(
            response.status(),
            StatusCode::SERVICE_UNAVAILABLE,
            "body {body:?} as {content_type}"
        );
        let error: ErrorBody = response.json().await.expect("error body");
        assert_eq!(error.error, "model unavailable");
    }

    token.cancel();
}

#[tokio::test]
async fn liveness_does_not_need_a_model() {
    let (addr, token, _dir) = degraded_server().await;

    let response = reqwest::get(format!("http://{addr}/"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.text().await.expect("text body"),
        "QR Code Safety Scanner API is running!"
    );

    token.cancel();
}

#[tokio::test]
async fn health_reports_model_state() {
    let (ready_addr, ready_token, _ready_dir) = ready_server().await;
    let (degraded_addr, degraded_token, _degraded_dir) = degraded_server().await;

    let ready: Value = reqwest::get(format!("http://{ready_addr}/health"))
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("json body");
    assert_eq!(ready["status"], json!("Up"));
    assert_eq!(ready["labels"], json!(["benign", "phishing"]));
    assert!(ready["model_id"].is_string());

    let degraded: Value = reqwest::get(format!("http://{degraded_addr}/health"))
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("json body");
    assert!(degraded["status"]["Down"]["reason"].is_string());
    assert!(degraded["model_id"].is_null());

    ready_token.cancel();
    degraded_token.cancel();
}

#[tokio::test]
async fn metrics_endpoint_exports_prometheus_text() {
    let (addr, token, _dir) = ready_server().await;

    check(addr, json!({"url": "https://example.com/"})).await;
    let text = reqwest::get(format!("http://{addr}/metrics"))
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("text body");
    assert!(text.contains("qr_scanner_url_checks_total"));

    token.cancel();
}
