//! Invoice handlers.

use crate::dtos::{
    CreateInvoiceRequest, InvoiceItemRequest, ListInvoicesQuery, UpdateInvoiceRequest,
    UpdateInvoiceStatusRequest,
};
use crate::models::{
    CreateInvoice, InvoiceStatus, ListInvoicesFilter, NewInvoiceItem, UpdateInvoice,
};
use crate::startup::AppState;
use agency_core::error::AppError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

fn parse_status(s: &str) -> Result<InvoiceStatus, AppError> {
    InvoiceStatus::parse(s)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown invoice status '{}'", s)))
}

fn to_new_items(items: Vec<InvoiceItemRequest>) -> Vec<NewInvoiceItem> {
    items
        .into_iter()
        .map(|item| NewInvoiceItem {
            commission_id: item.commission_id,
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
        })
        .collect()
}

#[instrument(skip(state, payload))]
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let status = match payload.status.as_deref() {
        Some(s) => parse_status(s)?,
        None => InvoiceStatus::Draft,
    };

    let created = state
        .db
        .create_invoice(&CreateInvoice {
            partner_id: payload.partner_id,
            issue_date: payload.issue_date,
            due_date: payload.due_date,
            status,
            items: to_new_items(payload.items),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state))]
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;

    let invoices = state
        .db
        .list_invoices(&ListInvoicesFilter {
            partner_id: query.partner_id,
            status,
            page_size: query.page_size,
        })
        .await?;

    Ok(Json(invoices))
}

#[instrument(skip(state))]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .db
        .get_invoice_with_items(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    Ok(Json(invoice))
}

#[instrument(skip(state, payload))]
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let updated = state
        .db
        .update_invoice(
            invoice_id,
            &UpdateInvoice {
                issue_date: payload.issue_date,
                due_date: payload.due_date,
                items: to_new_items(payload.items),
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(updated))
}

#[instrument(skip(state, payload))]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<UpdateInvoiceStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let target = parse_status(&payload.status)?;

    let invoice = state
        .db
        .update_invoice_status(invoice_id, target)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(invoice))
}

#[instrument(skip(state))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if state.db.delete_invoice(invoice_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")))
    }
}
