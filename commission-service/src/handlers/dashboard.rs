//! Partner dashboard handler.

use crate::startup::AppState;
use agency_core::error::AppError;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use tracing::instrument;
use uuid::Uuid;

/// Read-only rollups for one partner: project, rule, commission, and invoice
/// counts and sums grouped by status.
#[instrument(skip(state))]
pub async fn partner_dashboard(
    State(state): State<AppState>,
    Path(partner_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .db
        .get_partner(partner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Partner not found")))?;

    let dashboard = state.db.partner_dashboard(partner_id).await?;
    Ok(Json(dashboard))
}
