//! Platform constants used for early client-side checks
//!
//! These mirror the contract's limits so forms can fail fast. The contract
//! stays authoritative.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Loan parameter limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformLimits {
    /// Whole tokens
    pub min_loan_amount: Decimal,
    /// Whole tokens
    pub max_loan_amount: Decimal,
    pub min_duration_days: u32,
    pub max_duration_days: u32,
    pub max_interest_rate_bps: u32,
    pub min_collateral_ratio_bps: u32,
    pub liquidation_threshold_bps: u32,
    pub platform_fee_bps: u32,
    pub grace_period_secs: u64,
    pub max_loans_per_user: u32,
}

impl Default for PlatformLimits {
    fn default() -> Self {
        Self {
            min_loan_amount: Decimal::from(crate::MIN_LOAN_AMOUNT),
            max_loan_amount: Decimal::from(crate::MAX_LOAN_AMOUNT),
            min_duration_days: crate::MIN_LOAN_DURATION_DAYS,
            max_duration_days: crate::MAX_LOAN_DURATION_DAYS,
            max_interest_rate_bps: crate::MAX_INTEREST_RATE_BPS,
            min_collateral_ratio_bps: crate::MIN_COLLATERAL_RATIO_BPS,
            liquidation_threshold_bps: crate::LIQUIDATION_THRESHOLD_BPS,
            platform_fee_bps: crate::PLATFORM_FEE_BPS,
            grace_period_secs: crate::GRACE_PERIOD_SECS,
            max_loans_per_user: crate::MAX_LOANS_PER_USER,
        }
    }
}

impl PlatformLimits {
    /// Maximum interest rate as a percentage (30 for 3000 bps)
    pub fn max_interest_rate_pct(&self) -> Decimal {
        Decimal::from(self.max_interest_rate_bps) / Decimal::ONE_HUNDRED
    }

    /// Minimum collateral ratio as a percentage (120 for 12000 bps)
    pub fn min_collateral_ratio_pct(&self) -> Decimal {
        Decimal::from(self.min_collateral_ratio_bps) / Decimal::ONE_HUNDRED
    }

    /// Liquidation threshold as a percentage
    pub fn liquidation_threshold_pct(&self) -> Decimal {
        Decimal::from(self.liquidation_threshold_bps) / Decimal::ONE_HUNDRED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_percentages() {
        let limits = PlatformLimits::default();
        assert_eq!(limits.max_interest_rate_pct(), dec!(30));
        assert_eq!(limits.min_collateral_ratio_pct(), dec!(120));
        assert_eq!(limits.max_loans_per_user, 5);
    }

    #[test]
    fn test_partial_overrides_keep_defaults() {
        let limits: PlatformLimits =
            serde_json::from_str(r#"{"max_loans_per_user": 3}"#).unwrap();
        assert_eq!(limits.max_loans_per_user, 3);
        assert_eq!(limits.min_duration_days, 1);
        assert_eq!(limits.max_loan_amount, dec!(1000000));
    }
}
