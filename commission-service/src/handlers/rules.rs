//! Commission rule handlers.

use crate::dtos::{
    CalculateRequest, CalculateResponse, CreateRuleRequest, ListRulesQuery, UpdateRuleRequest,
    UpdateRuleStatusRequest, UsableRulesQuery,
};
use crate::models::{
    normalize_rule_amounts, CommissionType, CreateCommissionRule, RuleStatus, UpdateCommissionRule,
};
use crate::services::calculator;
use crate::startup::AppState;
use agency_core::error::AppError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

#[instrument(skip(state, payload))]
pub async fn create_rule(
    State(state): State<AppState>,
    Json(payload): Json<CreateRuleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let commission_type = CommissionType::parse(&payload.commission_type).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Unknown commission type '{}'",
            payload.commission_type
        ))
    })?;
    let (rate_percent, fixed_amount) =
        normalize_rule_amounts(commission_type, payload.rate_percent, payload.fixed_amount)?;

    state
        .db
        .get_project(payload.project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    let rule = state
        .db
        .create_rule(&CreateCommissionRule {
            project_id: payload.project_id,
            name: payload.name,
            commission_type,
            rate_percent,
            fixed_amount,
            notes: payload.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(rule)))
}

#[instrument(skip(state))]
pub async fn list_rules(
    State(state): State<AppState>,
    Query(query): Query<ListRulesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rules = state.db.list_rules(query.project_id).await?;
    Ok(Json(rules))
}

/// Confirmed rules only: the read path invoicing builds on.
#[instrument(skip(state))]
pub async fn list_usable_rules(
    State(state): State<AppState>,
    Query(query): Query<UsableRulesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rules = state.db.list_usable_rules(query.project_id).await?;
    Ok(Json(rules))
}

#[instrument(skip(state))]
pub async fn get_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let rule = state
        .db
        .get_rule(rule_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Rule not found")))?;
    Ok(Json(rule))
}

#[instrument(skip(state, payload))]
pub async fn update_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<Uuid>,
    Json(payload): Json<UpdateRuleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let commission_type = CommissionType::parse(&payload.commission_type).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Unknown commission type '{}'",
            payload.commission_type
        ))
    })?;
    let (rate_percent, fixed_amount) =
        normalize_rule_amounts(commission_type, payload.rate_percent, payload.fixed_amount)?;

    let rule = state
        .db
        .update_rule(
            rule_id,
            &UpdateCommissionRule {
                name: payload.name,
                commission_type,
                rate_percent,
                fixed_amount,
                notes: payload.notes,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Rule not found")))?;

    Ok(Json(rule))
}

#[instrument(skip(state, payload))]
pub async fn update_rule_status(
    State(state): State<AppState>,
    Path(rule_id): Path<Uuid>,
    Json(payload): Json<UpdateRuleStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let target = RuleStatus::parse(&payload.status).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Unknown rule status '{}'", payload.status))
    })?;

    let rule = state
        .db
        .update_rule_status(rule_id, target)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Rule not found")))?;

    Ok(Json(rule))
}

#[instrument(skip(state))]
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if state.db.delete_rule(rule_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Rule not found")))
    }
}

/// Preview the commission a rule would yield for a base amount and quantity.
/// Nothing is persisted.
#[instrument(skip(state, payload))]
pub async fn calculate(
    State(state): State<AppState>,
    Path(rule_id): Path<Uuid>,
    Json(payload): Json<CalculateRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let rule = state
        .db
        .get_rule(rule_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Rule not found")))?;

    let commission_amount =
        calculator::calculate_commission(Some(&rule), payload.base_amount, payload.quantity)?;

    Ok(Json(CalculateResponse {
        rule_id,
        base_amount: payload.base_amount,
        quantity: payload.quantity,
        commission_amount,
    }))
}
