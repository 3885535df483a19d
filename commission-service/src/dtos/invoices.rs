//! Invoice DTOs.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A line item as submitted. Amount is derived server-side as
/// quantity x unit_price and never accepted from the client.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InvoiceItemRequest {
    pub commission_id: Option<Uuid>,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Request to create an invoice.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub partner_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Defaults to "draft" when omitted.
    pub status: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Vec<InvoiceItemRequest>,
}

/// Request to update a draft invoice. The item list replaces the current one
/// wholesale.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(min = 1), nested)]
    pub items: Vec<InvoiceItemRequest>,
}

/// Request to move an invoice through its lifecycle.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInvoiceStatusRequest {
    #[validate(length(min = 1, max = 20))]
    pub status: String,
}

fn default_page_size() -> i32 {
    50
}

/// Query parameters for listing invoices.
#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub partner_id: Option<Uuid>,
    pub status: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
}
