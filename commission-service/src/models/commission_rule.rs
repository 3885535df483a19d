//! Commission rule model: the contractual formula for computing partner
//! commission, not yet realized as money owed.

use agency_core::error::AppError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a rule computes commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    Rate,
    Fixed,
}

impl CommissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionType::Rate => "rate",
            CommissionType::Fixed => "fixed",
        }
    }

    /// Parse a stored or submitted label. Unknown labels are rejected by the
    /// caller, never silently defaulted.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rate" => Some(CommissionType::Rate),
            "fixed" => Some(CommissionType::Fixed),
            _ => None,
        }
    }
}

/// Rule lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Unapproved,
    Reviewing,
    Confirmed,
    Paid,
    Disabled,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Unapproved => "unapproved",
            RuleStatus::Reviewing => "reviewing",
            RuleStatus::Confirmed => "confirmed",
            RuleStatus::Paid => "paid",
            RuleStatus::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unapproved" => Some(RuleStatus::Unapproved),
            "reviewing" => Some(RuleStatus::Reviewing),
            "confirmed" => Some(RuleStatus::Confirmed),
            "paid" => Some(RuleStatus::Paid),
            "disabled" => Some(RuleStatus::Disabled),
            _ => None,
        }
    }

    /// Only confirmed rules may back invoice line items.
    pub fn is_usable_for_invoice(&self) -> bool {
        matches!(self, RuleStatus::Confirmed)
    }

    /// Explicit transition allow-list. Forward along the approval chain,
    /// sideways to disabled from any non-terminal state, and disabled rules
    /// may be re-activated to unapproved.
    pub fn can_transition_to(&self, target: RuleStatus) -> bool {
        match self {
            RuleStatus::Unapproved => {
                matches!(target, RuleStatus::Reviewing | RuleStatus::Disabled)
            }
            RuleStatus::Reviewing => {
                matches!(target, RuleStatus::Confirmed | RuleStatus::Disabled)
            }
            RuleStatus::Confirmed => matches!(target, RuleStatus::Paid | RuleStatus::Disabled),
            RuleStatus::Paid => false,
            RuleStatus::Disabled => matches!(target, RuleStatus::Unapproved),
        }
    }
}

/// Commission rule row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommissionRule {
    pub rule_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub commission_type: String,
    pub rate_percent: Option<Decimal>,
    pub fixed_amount: Option<Decimal>,
    pub status: String,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a commission rule.
#[derive(Debug, Clone)]
pub struct CreateCommissionRule {
    pub project_id: Uuid,
    pub name: String,
    pub commission_type: CommissionType,
    pub rate_percent: Option<Decimal>,
    pub fixed_amount: Option<Decimal>,
    pub notes: Option<String>,
}

/// Input for updating a commission rule. The economic fields are replaced as
/// a unit so the type/amount pairing can be re-validated on every write.
#[derive(Debug, Clone)]
pub struct UpdateCommissionRule {
    pub name: String,
    pub commission_type: CommissionType,
    pub rate_percent: Option<Decimal>,
    pub fixed_amount: Option<Decimal>,
    pub notes: Option<String>,
}

/// Validate that exactly the limb matching `commission_type` is present and
/// non-negative, and blank out the other one.
pub fn normalize_rule_amounts(
    commission_type: CommissionType,
    rate_percent: Option<Decimal>,
    fixed_amount: Option<Decimal>,
) -> Result<(Option<Decimal>, Option<Decimal>), AppError> {
    match commission_type {
        CommissionType::Rate => {
            let rate = rate_percent.ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("rate_percent is required for rate rules"))
            })?;
            if rate < Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "rate_percent must not be negative"
                )));
            }
            Ok((Some(rate), None))
        }
        CommissionType::Fixed => {
            let fixed = fixed_amount.ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("fixed_amount is required for fixed rules"))
            })?;
            if fixed < Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "fixed_amount must not be negative"
                )));
            }
            Ok((None, Some(fixed)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_rule_requires_rate_percent() {
        let result = normalize_rule_amounts(CommissionType::Rate, None, Some(Decimal::ONE));
        assert!(result.is_err());
    }

    #[test]
    fn fixed_rule_requires_fixed_amount() {
        let result = normalize_rule_amounts(CommissionType::Fixed, Some(Decimal::ONE), None);
        assert!(result.is_err());
    }

    #[test]
    fn normalization_blanks_the_inactive_limb() {
        let (rate, fixed) = normalize_rule_amounts(
            CommissionType::Rate,
            Some(Decimal::new(35, 1)),
            Some(Decimal::new(1000, 0)),
        )
        .expect("rate rule should validate");
        assert_eq!(rate, Some(Decimal::new(35, 1)));
        assert_eq!(fixed, None);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(
            normalize_rule_amounts(CommissionType::Rate, Some(Decimal::NEGATIVE_ONE), None)
                .is_err()
        );
        assert!(
            normalize_rule_amounts(CommissionType::Fixed, None, Some(Decimal::NEGATIVE_ONE))
                .is_err()
        );
    }

    #[test]
    fn only_confirmed_rules_are_usable() {
        for status in [
            RuleStatus::Unapproved,
            RuleStatus::Reviewing,
            RuleStatus::Confirmed,
            RuleStatus::Paid,
            RuleStatus::Disabled,
        ] {
            assert_eq!(
                status.is_usable_for_invoice(),
                status == RuleStatus::Confirmed
            );
        }
    }

    #[test]
    fn transition_allow_list() {
        assert!(RuleStatus::Unapproved.can_transition_to(RuleStatus::Reviewing));
        assert!(RuleStatus::Reviewing.can_transition_to(RuleStatus::Confirmed));
        assert!(RuleStatus::Confirmed.can_transition_to(RuleStatus::Paid));
        assert!(RuleStatus::Reviewing.can_transition_to(RuleStatus::Disabled));
        assert!(RuleStatus::Disabled.can_transition_to(RuleStatus::Unapproved));

        assert!(!RuleStatus::Unapproved.can_transition_to(RuleStatus::Paid));
        assert!(!RuleStatus::Paid.can_transition_to(RuleStatus::Disabled));
        assert!(!RuleStatus::Confirmed.can_transition_to(RuleStatus::Unapproved));
    }

    #[test]
    fn unknown_status_label_is_rejected() {
        assert!(RuleStatus::parse("approved").is_none());
        assert!(CommissionType::parse("percentage").is_none());
    }
}
