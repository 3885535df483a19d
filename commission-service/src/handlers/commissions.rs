//! Commission record handlers.

use crate::dtos::{
    CommissionTotalsResponse, CreateCommissionRequest, ListCommissionsQuery, TotalsQuery,
    UpdateCommissionRequest, UpdateCommissionStatusRequest,
};
use crate::models::{CommissionStatus, CreateCommission, ListCommissionsFilter, UpdateCommission};
use crate::startup::AppState;
use agency_core::error::AppError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

fn parse_status(s: &str) -> Result<CommissionStatus, AppError> {
    CommissionStatus::parse(s)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown commission status '{}'", s)))
}

#[instrument(skip(state, payload))]
pub async fn create_commission(
    State(state): State<AppState>,
    Json(payload): Json<CreateCommissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let commission = state
        .db
        .create_commission(&CreateCommission {
            project_id: payload.project_id,
            partner_id: payload.partner_id,
            base_amount: payload.base_amount,
            rate: payload.rate,
            notes: payload.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(commission)))
}

#[instrument(skip(state))]
pub async fn list_commissions(
    State(state): State<AppState>,
    Query(query): Query<ListCommissionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;

    let commissions = state
        .db
        .list_commissions(&ListCommissionsFilter {
            partner_id: query.partner_id,
            project_id: query.project_id,
            status,
            page_size: query.page_size,
        })
        .await?;

    Ok(Json(commissions))
}

#[instrument(skip(state))]
pub async fn get_commission(
    State(state): State<AppState>,
    Path(commission_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let commission = state
        .db
        .get_commission(commission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Commission not found")))?;
    Ok(Json(commission))
}

#[instrument(skip(state, payload))]
pub async fn update_commission(
    State(state): State<AppState>,
    Path(commission_id): Path<Uuid>,
    Json(payload): Json<UpdateCommissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let commission = state
        .db
        .update_commission(
            commission_id,
            &UpdateCommission {
                base_amount: payload.base_amount,
                rate: payload.rate,
                payment_date: payload.payment_date,
                notes: payload.notes,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Commission not found")))?;

    Ok(Json(commission))
}

#[instrument(skip(state, payload))]
pub async fn update_commission_status(
    State(state): State<AppState>,
    Path(commission_id): Path<Uuid>,
    Json(payload): Json<UpdateCommissionStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let target = parse_status(&payload.status)?;

    let commission = state
        .db
        .update_commission_status(commission_id, target, payload.payment_date)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Commission not found")))?;

    Ok(Json(commission))
}

#[instrument(skip(state))]
pub async fn delete_commission(
    State(state): State<AppState>,
    Path(commission_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if state.db.delete_commission(commission_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Commission not found")))
    }
}

/// Sum of commission amounts for a partner, optionally narrowed to a status.
/// An unknown partner or an empty result set totals zero.
#[instrument(skip(state))]
pub async fn commission_totals(
    State(state): State<AppState>,
    Query(query): Query<TotalsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;

    let total_amount = state
        .db
        .sum_commission_amount(query.partner_id, status)
        .await?;

    Ok(Json(CommissionTotalsResponse {
        partner_id: query.partner_id,
        status: status.map(|s| s.as_str().to_string()),
        total_amount,
    }))
}
