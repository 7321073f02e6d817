//! Simple interest over an annual percentage rate
//!
//! Inputs that cannot produce a meaningful figure (no principal, negative rate
//! or duration) yield `None`. Callers must read `None` as "insufficient input"
//! and never substitute zero.

use flashdag_common::DAYS_PER_YEAR;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Interest accrued on `principal` at `rate_pct` APR over `duration_days`
pub fn interest(principal: Decimal, rate_pct: Decimal, duration_days: Decimal) -> Option<Decimal> {
    if principal <= Decimal::ZERO || rate_pct < Decimal::ZERO || duration_days < Decimal::ZERO {
        return None;
    }

    let denominator = Decimal::from(DAYS_PER_YEAR) * Decimal::ONE_HUNDRED;
    principal
        .checked_mul(rate_pct)?
        .checked_mul(duration_days)?
        .checked_div(denominator)
}

/// Principal plus interest
pub fn total_repayment(
    principal: Decimal,
    rate_pct: Decimal,
    duration_days: Decimal,
) -> Option<Decimal> {
    principal.checked_add(interest(principal, rate_pct, duration_days)?)
}

/// Interest accrued per day
pub fn daily_interest(principal: Decimal, rate_pct: Decimal) -> Option<Decimal> {
    interest(principal, rate_pct, Decimal::ONE)
}

/// Interest and repayment figures for one set of loan terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanQuote {
    pub principal: Decimal,
    pub rate_pct: Decimal,
    pub duration_days: Decimal,
    pub interest: Decimal,
    pub total_repayment: Decimal,
}

impl LoanQuote {
    /// Places used when showing repayment totals
    pub const DISPLAY_PLACES: u32 = 4;

    pub fn new(principal: Decimal, rate_pct: Decimal, duration_days: Decimal) -> Option<Self> {
        let interest = interest(principal, rate_pct, duration_days)?;
        let total_repayment = principal.checked_add(interest)?;

        Some(Self {
            principal,
            rate_pct,
            duration_days,
            interest,
            total_repayment,
        })
    }

    /// Total repayment rounded for display
    pub fn total_display(&self) -> String {
        flashdag_common::units::display(self.total_repayment, Self::DISPLAY_PLACES)
    }

    /// Effective return over the loan term, as a percentage of principal
    pub fn term_return_pct(&self) -> Option<Decimal> {
        self.interest
            .checked_div(self.principal)?
            .checked_mul(Decimal::ONE_HUNDRED)
    }
}
