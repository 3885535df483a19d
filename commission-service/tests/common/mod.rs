//! Test helper module for commission-service integration tests.
//!
//! Provides common setup utilities for PostgreSQL-based tests. Tests that
//! need a database are skipped when TEST_DATABASE_URL is not set.

#![allow(dead_code)]

use agency_core::config::Config as CoreConfig;
use commission_service::config::{CommissionConfig, DatabaseConfig};
use commission_service::models::{Partner, Project};
use commission_service::services::{init_metrics, Database};
use commission_service::startup::Application;
use std::sync::atomic::{AtomicU32, Ordering};

// Counter for unique schema names
static SCHEMA_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Get the database URL for testing from the environment, if configured.
pub fn get_test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

/// Generate a unique schema name for test isolation.
fn unique_schema_name() -> String {
    let counter = SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("test_commission_{}_{}", std::process::id(), counter)
}

/// Decode a Decimal from a JSON response field.
pub fn decimal(value: &serde_json::Value) -> rust_decimal::Decimal {
    serde_json::from_value(value.clone()).expect("field is not a decimal")
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    pub db: Database,
    schema_name: String,
}

impl TestApp {
    /// Spawn a new test application on a random port, or None when no test
    /// database is configured.
    pub async fn spawn() -> Option<Self> {
        // Initialize metrics (required for metrics endpoint test)
        init_metrics();

        let base_url = get_test_database_url()?;
        let schema_name = unique_schema_name();

        // Create schema for test isolation
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&base_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema_name))
            .execute(&pool)
            .await
            .ok();
        sqlx::query(&format!("CREATE SCHEMA {}", schema_name))
            .execute(&pool)
            .await
            .expect("Failed to create test schema");

        pool.close().await;

        // Use ? or & depending on whether URL already has query parameters
        let separator = if base_url.contains('?') { "&" } else { "?" };
        let db_url_with_schema = format!(
            "{}{}options=-c search_path%3D{}",
            base_url, separator, schema_name
        );

        let config = CommissionConfig {
            common: CoreConfig { port: 0 }, // Random port
            service_name: "commission-service-test".to_string(),
            log_level: "warn".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: db_url_with_schema,
                max_connections: 5,
                min_connections: 1,
            },
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let db = app.db();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        Some(TestApp {
            address,
            port,
            client,
            db,
            schema_name,
        })
    }

    /// Seed a partner row directly through the database layer.
    pub async fn seed_partner(&self, name: &str) -> Partner {
        self.db
            .create_partner(name)
            .await
            .expect("Failed to seed partner")
    }

    /// Seed a project row under a partner.
    pub async fn seed_project(&self, partner: &Partner, name: &str) -> Project {
        self.db
            .create_project(partner.partner_id, name, "active")
            .await
            .expect("Failed to seed project")
    }

    /// Cleanup test resources (schema).
    pub async fn cleanup(&self) {
        let Some(base_url) = get_test_database_url() else {
            return;
        };
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&base_url)
            .await
            .ok();

        if let Some(pool) = pool {
            let _ = sqlx::query(&format!(
                "DROP SCHEMA IF EXISTS {} CASCADE",
                self.schema_name
            ))
            .execute(&pool)
            .await;
            pool.close().await;
        }
    }
}
