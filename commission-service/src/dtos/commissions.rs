//! Commission record DTOs.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request to record a realized commission.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommissionRequest {
    pub project_id: Uuid,
    pub partner_id: Uuid,
    pub base_amount: Decimal,
    /// Percentage, e.g. 3.5 for 3.5%.
    pub rate: Decimal,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Request to update a commission record. Omitted fields are left unchanged;
/// the stored amount is recomputed from the merged base and rate.
#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateCommissionRequest {
    pub base_amount: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub payment_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Request to move a commission record through its lifecycle.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommissionStatusRequest {
    #[validate(length(min = 1, max = 20))]
    pub status: String,
    pub payment_date: Option<NaiveDate>,
}

fn default_page_size() -> i32 {
    50
}

/// Query parameters for listing commission records.
#[derive(Debug, Deserialize)]
pub struct ListCommissionsQuery {
    pub partner_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
}

/// Query parameters for the totals endpoint.
#[derive(Debug, Deserialize)]
pub struct TotalsQuery {
    pub partner_id: Uuid,
    pub status: Option<String>,
}

/// Totals response. A partner with no matching records totals zero.
#[derive(Debug, Serialize)]
pub struct CommissionTotalsResponse {
    pub partner_id: Uuid,
    pub status: Option<String>,
    pub total_amount: Decimal,
}
