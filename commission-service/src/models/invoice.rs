//! Invoice model: an immutable-once-issued billing document aggregating line
//! items into subtotal/tax/total.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::invoice_item::{InvoiceItem, NewInvoiceItem};

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "issued" => Some(InvoiceStatus::Issued),
            "paid" => Some(InvoiceStatus::Paid),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }

    /// Issued and paid invoices reject edits and deletion.
    pub fn is_immutable(&self) -> bool {
        matches!(self, InvoiceStatus::Issued | InvoiceStatus::Paid)
    }

    /// One-directional transition allow-list for issued documents.
    pub fn can_transition_to(&self, target: InvoiceStatus) -> bool {
        match self {
            InvoiceStatus::Draft => matches!(
                target,
                InvoiceStatus::Issued | InvoiceStatus::Paid | InvoiceStatus::Cancelled
            ),
            InvoiceStatus::Issued => {
                matches!(target, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
            }
            InvoiceStatus::Paid => false,
            InvoiceStatus::Cancelled => false,
        }
    }
}

/// Invoice row. Subtotal, tax and total are always derived from the current
/// items at write time, never independently settable.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub partner_id: Uuid,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub status: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Invoice together with the items it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceWithItems {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub partner_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub items: Vec<NewInvoiceItem>,
}

/// Input for updating a draft invoice. The item list is a wholesale
/// replacement; totals are recomputed from it.
#[derive(Debug, Clone)]
pub struct UpdateInvoice {
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub items: Vec<NewInvoiceItem>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub partner_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    pub page_size: i32,
}
