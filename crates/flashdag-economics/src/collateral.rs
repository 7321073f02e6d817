//! Collateral ratio, minimum collateral, and position health

use flashdag_common::{units, BPS_DENOMINATOR, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Collateral as a percentage of principal
///
/// `None` when either side is missing (zero or negative).
pub fn collateral_ratio(principal: Decimal, collateral: Decimal) -> Option<Decimal> {
    if principal <= Decimal::ZERO || collateral <= Decimal::ZERO {
        return None;
    }
    collateral
        .checked_mul(Decimal::ONE_HUNDRED)?
        .checked_div(principal)
}

/// Collateral ratio rounded to a whole percent for display
pub fn collateral_ratio_display(principal: Decimal, collateral: Decimal) -> Option<String> {
    collateral_ratio(principal, collateral).map(|ratio| units::display(ratio, 0))
}

/// Minimum collateral for `amount`, in exact integer arithmetic
pub fn min_collateral(amount: U256, min_ratio_bps: u32) -> U256 {
    amount.saturating_mul(U256::from(min_ratio_bps)) / U256::from(BPS_DENOMINATOR)
}

/// Collateral to pre-fill for a display amount, rounded up to 4 places
pub fn suggested_collateral(amount: Decimal, min_ratio_bps: u32) -> Option<Decimal> {
    if amount <= Decimal::ZERO {
        return None;
    }
    let raw = amount * Decimal::from(min_ratio_bps) / Decimal::from(BPS_DENOMINATOR);
    Some(raw.round_dp_with_strategy(4, rust_decimal::RoundingStrategy::AwayFromZero))
}

/// Whether `collateral` covers `amount` at the minimum ratio
pub fn meets_minimum(amount: U256, collateral: U256, min_ratio_bps: u32) -> bool {
    collateral >= min_collateral(amount, min_ratio_bps)
}

/// Collateral divided by outstanding debt
pub fn health_factor(collateral: Decimal, debt: Decimal) -> Option<Decimal> {
    if debt <= Decimal::ZERO {
        return None;
    }
    collateral.checked_div(debt)
}

/// Outstanding debt as a percentage of collateral
pub fn loan_to_value(debt: Decimal, collateral: Decimal) -> Option<Decimal> {
    if collateral <= Decimal::ZERO {
        return None;
    }
    debt.checked_mul(Decimal::ONE_HUNDRED)?.checked_div(collateral)
}

/// Borrower-facing grade of a collateral ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthGrade {
    Excellent,
    Good,
    Fair,
    Risky,
}

impl HealthGrade {
    /// Grade a collateral ratio given in percent
    pub fn from_ratio(ratio_pct: Decimal) -> Self {
        if ratio_pct >= Decimal::from(200) {
            HealthGrade::Excellent
        } else if ratio_pct >= Decimal::from(170) {
            HealthGrade::Good
        } else if ratio_pct >= Decimal::from(150) {
            HealthGrade::Fair
        } else {
            HealthGrade::Risky
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthGrade::Excellent => "Excellent",
            HealthGrade::Good => "Good",
            HealthGrade::Fair => "Fair",
            HealthGrade::Risky => "Risky",
        }
    }
}

/// Liquidation risk derived from a health factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationRisk {
    Low,
    High,
}

impl LiquidationRisk {
    /// Health factor below which a position is flagged
    pub const HIGH_RISK_BELOW: Decimal = Decimal::from_parts(15, 0, 0, false, 1);

    pub fn from_health_factor(health_factor: Decimal) -> Self {
        if health_factor < Self::HIGH_RISK_BELOW {
            LiquidationRisk::High
        } else {
            LiquidationRisk::Low
        }
    }
}

/// Score at or above which a listing counts as low risk
pub const LOW_RISK_SCORE: u8 = 80;

/// Lender-facing risk score of a listing
pub fn risk_score(ratio_pct: Option<Decimal>) -> u8 {
    match ratio_pct {
        Some(ratio) if ratio >= Decimal::from(150) => 85,
        _ => 65,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ratio_display() {
        assert_eq!(collateral_ratio(dec!(100), dec!(150)), Some(dec!(150)));
        assert_eq!(
            collateral_ratio_display(dec!(100), dec!(150)).as_deref(),
            Some("150")
        );
        assert_eq!(
            collateral_ratio_display(dec!(3), dec!(4)).as_deref(),
            Some("133")
        );
        // 112.5% shows as 113
        assert_eq!(
            collateral_ratio_display(dec!(2), dec!(2.25)).as_deref(),
            Some("113")
        );
    }

    #[test]
    fn test_ratio_requires_both_sides() {
        assert_eq!(collateral_ratio(dec!(0), dec!(150)), None);
        assert_eq!(collateral_ratio(dec!(100), dec!(0)), None);
        assert_eq!(collateral_ratio_display(dec!(0), dec!(150)), None);
    }

    #[test]
    fn test_min_collateral_is_exact() {
        let one = U256::from(1_000_000_000_000_000_000u128);
        assert_eq!(
            min_collateral(one, 12_000),
            U256::from(1_200_000_000_000_000_000u128)
        );
        assert_eq!(min_collateral(U256::from(7u64), 12_000), U256::from(8u64));
        assert!(meets_minimum(U256::from(100u64), U256::from(120u64), 12_000));
        assert!(!meets_minimum(U256::from(100u64), U256::from(119u64), 12_000));
    }

    #[test]
    fn test_suggested_collateral_never_under_minimum() {
        assert_eq!(suggested_collateral(dec!(10), 12_000), Some(dec!(12)));
        assert_eq!(suggested_collateral(dec!(1.00001), 12_000), Some(dec!(1.2001)));
        assert_eq!(suggested_collateral(dec!(0), 12_000), None);
    }

    #[test]
    fn test_health_grades() {
        assert_eq!(HealthGrade::from_ratio(dec!(250)), HealthGrade::Excellent);
        assert_eq!(HealthGrade::from_ratio(dec!(170)), HealthGrade::Good);
        assert_eq!(HealthGrade::from_ratio(dec!(150)), HealthGrade::Fair);
        assert_eq!(HealthGrade::from_ratio(dec!(149.9)), HealthGrade::Risky);
    }

    #[test]
    fn test_health_factor_and_ltv() {
        assert_eq!(health_factor(dec!(3), dec!(2)), Some(dec!(1.5)));
        assert_eq!(health_factor(dec!(3), dec!(0)), None);
        assert_eq!(loan_to_value(dec!(1), dec!(2)), Some(dec!(50)));
        assert_eq!(
            LiquidationRisk::from_health_factor(dec!(1.45)),
            LiquidationRisk::High
        );
        assert_eq!(
            LiquidationRisk::from_health_factor(dec!(1.5)),
            LiquidationRisk::Low
        );
    }

    #[test]
    fn test_risk_score() {
        assert_eq!(risk_score(Some(dec!(160))), 85);
        assert_eq!(risk_score(Some(dec!(120))), 65);
        assert_eq!(risk_score(None), 65);
    }
}
