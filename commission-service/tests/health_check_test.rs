//! Integration tests for health and metrics endpoints.

mod common;

use common::TestApp;
use serde_json::Value;

#[tokio::test]
async fn health_check_works() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse body");
    assert_eq!(body["status"], "ok");

    app.cleanup().await;
}

#[tokio::test]
async fn readiness_reports_database_connectivity() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let response = app
        .client
        .get(format!("{}/ready", app.address))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse body");
    assert_eq!(body["status"], "ready");

    app.cleanup().await;
}

#[tokio::test]
async fn metrics_are_exposed_in_text_format() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    // Drive at least one timed query so the histogram has samples to encode
    app.client
        .get(format!("{}/commission-rules", app.address))
        .send()
        .await
        .expect("Failed to send request");

    let response = app
        .client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("Failed to read body");
    assert!(body.contains("commission_db_query_duration_seconds"));

    app.cleanup().await;
}
