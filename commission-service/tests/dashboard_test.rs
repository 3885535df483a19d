//! Integration tests for the partner dashboard.

mod common;

use common::{decimal, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn unknown_partner_is_not_found() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let response = app
        .client
        .get(format!(
            "{}/partners/{}/dashboard",
            app.address,
            Uuid::new_v4()
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn empty_partner_shows_zero_aggregates() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let partner = app.seed_partner("Acme Agency").await;

    let response = app
        .client
        .get(format!(
            "{}/partners/{}/dashboard",
            app.address, partner.partner_id
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse body");

    assert_eq!(decimal(&body["commission_total"]), Decimal::ZERO);
    assert_eq!(decimal(&body["invoice_total"]), Decimal::ZERO);
    assert!(body["projects_by_status"].as_array().expect("array").is_empty());
    assert!(body["invoices_by_status"].as_array().expect("array").is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn rollups_group_by_status() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let partner = app.seed_partner("Acme Agency").await;
    let project = app.seed_project(&partner, "Spring Campaign").await;

    // One rule, two commissions, one invoice
    let response = app
        .client
        .post(format!("{}/commission-rules", app.address))
        .json(&json!({
            "project_id": project.project_id,
            "name": "Standard 3.5%",
            "commission_type": "rate",
            "rate_percent": "3.5"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    for _ in 0..2 {
        let response = app
            .client
            .post(format!("{}/commissions", app.address))
            .json(&json!({
                "project_id": project.project_id,
                "partner_id": partner.partner_id,
                "base_amount": "10000",
                "rate": "3.5"
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 201);
    }

    let response = app
        .client
        .post(format!("{}/invoices", app.address))
        .json(&json!({
            "partner_id": partner.partner_id,
            "issue_date": "2025-03-15",
            "due_date": "2025-04-15",
            "items": [{ "description": "March", "quantity": 1, "unit_price": "1000" }]
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let response = app
        .client
        .get(format!(
            "{}/partners/{}/dashboard",
            app.address, partner.partner_id
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse body");

    let projects = body["projects_by_status"].as_array().expect("array");
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["status"], "active");
    assert_eq!(projects[0]["count"], 1);

    let rules = body["rules_by_status"].as_array().expect("array");
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0]["status"], "unapproved");

    let commissions = body["commissions_by_status"].as_array().expect("array");
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0]["status"], "pending");
    assert_eq!(commissions[0]["count"], 2);
    // 2 x 350.00
    assert_eq!(
        decimal(&commissions[0]["total_amount"]),
        Decimal::new(70_000, 2)
    );
    assert_eq!(decimal(&body["commission_total"]), Decimal::new(70_000, 2));

    let invoices = body["invoices_by_status"].as_array().expect("array");
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["status"], "draft");
    // 1,000 + 100 tax
    assert_eq!(decimal(&body["invoice_total"]), Decimal::new(1_100, 0));

    app.cleanup().await;
}
