//! Pure commission and money arithmetic.
//!
//! Everything here is side-effect free: same inputs, same outputs, no pool,
//! no clock. Rounding is half-up (round-to-nearest, ties away from zero)
//! throughout.

use agency_core::error::AppError;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{CommissionRule, CommissionType};

/// Tax applied to invoice subtotals: 10%, rounded to whole currency units.
const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Round a monetary amount to 2 decimal places, half-up.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to whole currency units, half-up.
pub fn round_whole(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Tax on an invoice subtotal.
pub fn tax_amount(subtotal: Decimal) -> Decimal {
    round_whole(subtotal * TAX_RATE)
}

/// Commission for a realized record: base x rate / 100, half-up to 2 places,
/// never negative.
pub fn commission_amount(base_amount: Decimal, rate: Decimal) -> Decimal {
    round_money(base_amount * rate / Decimal::ONE_HUNDRED).max(Decimal::ZERO)
}

/// Compute the commission a rule yields for a base amount and quantity.
///
/// A missing rule yields zero. Rate rules apply `rate_percent` to the base
/// amount (quantity is irrelevant); fixed rules multiply `fixed_amount` by
/// the quantity (base is irrelevant). The result is clamped to zero or more.
pub fn calculate_commission(
    rule: Option<&CommissionRule>,
    base_amount: Decimal,
    quantity: i32,
) -> Result<Decimal, AppError> {
    let Some(rule) = rule else {
        return Ok(Decimal::ZERO);
    };

    let amount = match CommissionType::parse(&rule.commission_type) {
        Some(CommissionType::Rate) => {
            let rate = rule.rate_percent.ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "rule {} is a rate rule without a rate_percent",
                    rule.rule_id
                ))
            })?;
            round_money(base_amount * rate / Decimal::ONE_HUNDRED)
        }
        Some(CommissionType::Fixed) => {
            let fixed = rule.fixed_amount.ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "rule {} is a fixed rule without a fixed_amount",
                    rule.rule_id
                ))
            })?;
            fixed * Decimal::from(quantity)
        }
        None => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "unsupported commission type '{}'",
                rule.commission_type
            )));
        }
    };

    Ok(amount.max(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn rule(commission_type: &str, rate: Option<Decimal>, fixed: Option<Decimal>) -> CommissionRule {
        CommissionRule {
            rule_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "test rule".to_string(),
            commission_type: commission_type.to_string(),
            rate_percent: rate,
            fixed_amount: fixed,
            status: "confirmed".to_string(),
            notes: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn rate_rule_ignores_quantity() {
        // 3.5% of 10,000 -> 350.00
        let r = rule("rate", Some(Decimal::new(35, 1)), None);
        let base = Decimal::new(10_000, 0);
        for qty in [1, 2, 10] {
            let amount = calculate_commission(Some(&r), base, qty).unwrap();
            assert_eq!(amount, Decimal::new(35_000, 2));
        }
    }

    #[test]
    fn fixed_rule_ignores_base() {
        let r = rule("fixed", None, Some(Decimal::new(1_500, 0)));
        for base in [Decimal::ZERO, Decimal::new(999_999, 0)] {
            let amount = calculate_commission(Some(&r), base, 3).unwrap();
            assert_eq!(amount, Decimal::new(4_500, 0));
        }
    }

    #[test]
    fn missing_rule_yields_zero() {
        assert_eq!(
            calculate_commission(None, Decimal::new(10_000, 0), 5).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn result_is_never_negative() {
        let r = rule("rate", Some(Decimal::new(50, 1)), None);
        let amount = calculate_commission(Some(&r), Decimal::new(-10_000, 0), 1).unwrap();
        assert_eq!(amount, Decimal::ZERO);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let r = rule("percentage", Some(Decimal::ONE), None);
        assert!(calculate_commission(Some(&r), Decimal::ONE_HUNDRED, 1).is_err());
    }

    #[test]
    fn rate_rule_without_rate_is_an_error() {
        let r = rule("rate", None, None);
        assert!(calculate_commission(Some(&r), Decimal::ONE_HUNDRED, 1).is_err());
    }

    #[test]
    fn rounding_is_half_up() {
        // 0.125 rounds away from zero; banker's rounding would give 0.12
        assert_eq!(round_money(Decimal::new(125, 3)), Decimal::new(13, 2));
        assert_eq!(round_whole(Decimal::new(105, 1)), Decimal::new(11, 0));
        assert_eq!(round_money(Decimal::new(135, 3)), Decimal::new(14, 2));
    }

    #[test]
    fn tax_is_ten_percent_rounded_to_whole_units() {
        // 1,100,000 subtotal -> 110,000 tax
        assert_eq!(
            tax_amount(Decimal::new(1_100_000, 0)),
            Decimal::new(110_000, 0)
        );
        // 105 subtotal -> 10.5 -> 11
        assert_eq!(tax_amount(Decimal::new(105, 0)), Decimal::new(11, 0));
    }

    #[test]
    fn commission_amount_rounds_to_cents() {
        // 1234.56 * 3.333% = 41.147...88 -> 41.15
        let amount = commission_amount(Decimal::new(123_456, 2), Decimal::new(3_333, 3));
        assert_eq!(amount, Decimal::new(4_115, 2));
    }
}
