//! Application startup and lifecycle management.

use crate::config::CommissionConfig;
use crate::handlers::{commissions, dashboard, health, invoices, rules};
use crate::services::Database;
use agency_core::error::AppError;
use axum::routing::{get, patch, post};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: CommissionConfig,
    pub db: Database,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration. Connects the
    /// pool, runs migrations, and binds the listener (port 0 = random port
    /// for testing).
    pub async fn build(config: CommissionConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Commission service listening on port {}", port);

        let state = AppState { config, db };

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a handle to the database.
    pub fn db(&self) -> Database {
        self.state.db.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = Router::new()
            .route("/health", get(health::health))
            .route("/ready", get(health::ready))
            .route("/metrics", get(health::metrics))
            .route(
                "/commission-rules",
                post(rules::create_rule).get(rules::list_rules),
            )
            .route("/commission-rules/usable", get(rules::list_usable_rules))
            .route(
                "/commission-rules/:id",
                get(rules::get_rule)
                    .put(rules::update_rule)
                    .delete(rules::delete_rule),
            )
            .route("/commission-rules/:id/status", patch(rules::update_rule_status))
            .route("/commission-rules/:id/calculate", post(rules::calculate))
            .route(
                "/commissions",
                post(commissions::create_commission).get(commissions::list_commissions),
            )
            .route("/commissions/totals", get(commissions::commission_totals))
            .route(
                "/commissions/:id",
                get(commissions::get_commission)
                    .put(commissions::update_commission)
                    .delete(commissions::delete_commission),
            )
            .route(
                "/commissions/:id/status",
                patch(commissions::update_commission_status),
            )
            .route(
                "/invoices",
                post(invoices::create_invoice).get(invoices::list_invoices),
            )
            .route(
                "/invoices/:id",
                get(invoices::get_invoice)
                    .put(invoices::update_invoice)
                    .delete(invoices::delete_invoice),
            )
            .route("/invoices/:id/status", patch(invoices::update_invoice_status))
            .route("/partners/:id/dashboard", get(dashboard::partner_dashboard))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state);

        axum::serve(self.listener, router).await
    }
}
