//! Integration tests for commission record endpoints.

mod common;

use common::{decimal, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_commission(app: &TestApp, project_id: Uuid, partner_id: Uuid) -> Value {
    let response = app
        .client
        .post(format!("{}/commissions", app.address))
        .json(&json!({
            "project_id": project_id,
            "partner_id": partner_id,
            "base_amount": "10000",
            "rate": "3.5"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    response.json().await.expect("Failed to parse body")
}

#[tokio::test]
async fn amount_is_computed_at_creation() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let partner = app.seed_partner("Acme Agency").await;
    let project = app.seed_project(&partner, "Spring Campaign").await;

    let body = create_commission(&app, project.project_id, partner.partner_id).await;
    assert_eq!(body["status"], "pending");
    // 10,000 * 3.5% = 350.00
    assert_eq!(decimal(&body["amount"]), Decimal::new(35_000, 2));

    app.cleanup().await;
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let partner = app.seed_partner("Acme Agency").await;

    let response = app
        .client
        .post(format!("{}/commissions", app.address))
        .json(&json!({
            "project_id": Uuid::new_v4(),
            "partner_id": partner.partner_id,
            "base_amount": "10000",
            "rate": "3.5"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn update_recomputes_the_amount() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let partner = app.seed_partner("Acme Agency").await;
    let project = app.seed_project(&partner, "Spring Campaign").await;
    let commission = create_commission(&app, project.project_id, partner.partner_id).await;

    let response = app
        .client
        .put(format!(
            "{}/commissions/{}",
            app.address,
            commission["commission_id"].as_str().expect("commission_id")
        ))
        .json(&json!({ "base_amount": "20000" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse body");
    // rate is unchanged, amount follows the new base: 20,000 * 3.5% = 700.00
    assert_eq!(decimal(&body["base_amount"]), Decimal::new(20_000, 0));
    assert_eq!(decimal(&body["amount"]), Decimal::new(70_000, 2));

    app.cleanup().await;
}

#[tokio::test]
async fn status_moves_forward_only() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let partner = app.seed_partner("Acme Agency").await;
    let project = app.seed_project(&partner, "Spring Campaign").await;
    let commission = create_commission(&app, project.project_id, partner.partner_id).await;
    let id = commission["commission_id"].as_str().expect("commission_id");

    // pending -> paid skips approval
    let response = app
        .client
        .patch(format!("{}/commissions/{}/status", app.address, id))
        .json(&json!({ "status": "paid" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    let response = app
        .client
        .patch(format!("{}/commissions/{}/status", app.address, id))
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    let response = app
        .client
        .patch(format!("{}/commissions/{}/status", app.address, id))
        .json(&json!({ "status": "paid", "payment_date": "2025-04-30" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse body");
    assert_eq!(body["status"], "paid");
    assert_eq!(body["payment_date"], "2025-04-30");

    app.cleanup().await;
}

#[tokio::test]
async fn list_filters_by_partner_and_status() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let partner_a = app.seed_partner("Acme Agency").await;
    let partner_b = app.seed_partner("Beta Agency").await;
    let project_a = app.seed_project(&partner_a, "Spring Campaign").await;
    let project_b = app.seed_project(&partner_b, "Autumn Campaign").await;

    create_commission(&app, project_a.project_id, partner_a.partner_id).await;
    create_commission(&app, project_b.project_id, partner_b.partner_id).await;

    let response = app
        .client
        .get(format!(
            "{}/commissions?partner_id={}&status=pending",
            app.address, partner_a.partner_id
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse body");
    let records = body.as_array().expect("array response");
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0]["partner_id"].as_str().expect("partner_id"),
        partner_a.partner_id.to_string()
    );

    app.cleanup().await;
}

#[tokio::test]
async fn totals_sum_by_partner_and_status() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let partner = app.seed_partner("Acme Agency").await;
    let project = app.seed_project(&partner, "Spring Campaign").await;

    create_commission(&app, project.project_id, partner.partner_id).await;
    create_commission(&app, project.project_id, partner.partner_id).await;

    let response = app
        .client
        .get(format!(
            "{}/commissions/totals?partner_id={}&status=pending",
            app.address, partner.partner_id
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse body");
    // 2 x 350.00
    assert_eq!(decimal(&body["total_amount"]), Decimal::new(70_000, 2));

    app.cleanup().await;
}

#[tokio::test]
async fn totals_for_an_unknown_partner_are_zero() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let response = app
        .client
        .get(format!(
            "{}/commissions/totals?partner_id={}",
            app.address,
            Uuid::new_v4()
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse body");
    assert_eq!(decimal(&body["total_amount"]), Decimal::ZERO);

    app.cleanup().await;
}
