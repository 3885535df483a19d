//! Read models for the partner dashboard.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row count grouped by status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Row count and amount sum grouped by status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTotal {
    pub status: String,
    pub count: i64,
    pub total_amount: Decimal,
}

/// All the rollups a partner's dashboard page needs in one response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerDashboard {
    pub partner_id: Uuid,
    pub projects_by_status: Vec<StatusCount>,
    pub rules_by_status: Vec<StatusCount>,
    pub commission_total: Decimal,
    pub commissions_by_status: Vec<StatusTotal>,
    pub invoice_total: Decimal,
    pub invoices_by_status: Vec<StatusTotal>,
}
