//! Invoice line item. Item lifetime is fully owned by the invoice; the
//! commission back-reference exists for lookup only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Line item row. `amount` is derived as quantity x unit_price at write time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub commission_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for an item on a new or replaced invoice. A commission reference
/// that does not resolve is tolerated; the item is stored as free text.
#[derive(Debug, Clone)]
pub struct NewInvoiceItem {
    pub commission_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}
