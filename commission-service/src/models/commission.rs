//! Realized commission record: a materialized amount owed to a partner for a
//! project, distinct from the rule that templated it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Commission record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Approved => "approved",
            CommissionStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CommissionStatus::Pending),
            "approved" => Some(CommissionStatus::Approved),
            "paid" => Some(CommissionStatus::Paid),
            _ => None,
        }
    }

    /// Forward-only allow-list.
    pub fn can_transition_to(&self, target: CommissionStatus) -> bool {
        match self {
            CommissionStatus::Pending => matches!(target, CommissionStatus::Approved),
            CommissionStatus::Approved => matches!(target, CommissionStatus::Paid),
            CommissionStatus::Paid => false,
        }
    }
}

/// Commission row. `amount` is recomputed whenever `base_amount` or `rate`
/// change, never implicitly afterward.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Commission {
    pub commission_id: Uuid,
    pub project_id: Uuid,
    pub partner_id: Uuid,
    pub base_amount: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub status: String,
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a commission record.
#[derive(Debug, Clone)]
pub struct CreateCommission {
    pub project_id: Uuid,
    pub partner_id: Uuid,
    pub base_amount: Decimal,
    pub rate: Decimal,
    pub notes: Option<String>,
}

/// Input for updating a commission record.
#[derive(Debug, Clone, Default)]
pub struct UpdateCommission {
    pub base_amount: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Filter parameters for listing commissions.
#[derive(Debug, Clone, Default)]
pub struct ListCommissionsFilter {
    pub partner_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status: Option<CommissionStatus>,
    pub page_size: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_transitions_are_forward_only() {
        assert!(CommissionStatus::Pending.can_transition_to(CommissionStatus::Approved));
        assert!(CommissionStatus::Approved.can_transition_to(CommissionStatus::Paid));

        assert!(!CommissionStatus::Pending.can_transition_to(CommissionStatus::Paid));
        assert!(!CommissionStatus::Paid.can_transition_to(CommissionStatus::Pending));
        assert!(!CommissionStatus::Approved.can_transition_to(CommissionStatus::Pending));
    }

    #[test]
    fn unknown_commission_status_is_rejected() {
        assert!(CommissionStatus::parse("settled").is_none());
    }
}
