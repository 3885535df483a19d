//! Commission rule DTOs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request to create a commission rule.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRuleRequest {
    pub project_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// "rate" or "fixed".
    #[validate(length(min = 1, max = 20))]
    pub commission_type: String,
    pub rate_percent: Option<Decimal>,
    pub fixed_amount: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Request to update a rule. The economic fields are submitted as a unit so
/// the type/amount pairing is re-validated in full.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRuleRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub commission_type: String,
    pub rate_percent: Option<Decimal>,
    pub fixed_amount: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Request to move a rule through its lifecycle.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRuleStatusRequest {
    #[validate(length(min = 1, max = 20))]
    pub status: String,
}

/// Query parameters for listing rules.
#[derive(Debug, Deserialize, Default)]
pub struct ListRulesQuery {
    pub project_id: Option<Uuid>,
}

/// Query parameters for the usable-rules read path.
#[derive(Debug, Deserialize)]
pub struct UsableRulesQuery {
    pub project_id: Uuid,
}

fn default_quantity() -> i32 {
    1
}

/// Request to preview the commission a rule yields.
#[derive(Debug, Deserialize, Validate)]
pub struct CalculateRequest {
    pub base_amount: Decimal,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Preview result.
#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    pub rule_id: Uuid,
    pub base_amount: Decimal,
    pub quantity: i32,
    pub commission_amount: Decimal,
}
