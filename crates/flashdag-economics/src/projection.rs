//! Dashboard projections derived from loan snapshots
//!
//! Everything here is a pure function of contract state plus the current time.
//! Nothing is cached between calls.

use chrono::{DateTime, Utc};
use flashdag_common::{
    units, Address, AmountError, BorrowerInfo, FieldError, FormField, Loan, LoanId, LoanStatus,
    PlatformLimits, RevertCode, SECONDS_PER_DAY, U256,
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::collateral::{collateral_ratio, health_factor, HealthGrade, LiquidationRisk};
use crate::interest::{interest, total_repayment};
use crate::rates::{bps_to_percent, seconds_to_days};

/// Shorten an address for display (`0x1234...abcd`)
pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

fn timestamp(secs: u64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(i64::try_from(secs).ok()?, 0)
}

/// One loan in display units, with derived schedule and debt figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub status: LoanStatus,
    pub status_label: String,
    pub borrower: Address,
    pub lender: Option<Address>,
    pub principal: Decimal,
    pub collateral: Decimal,
    pub rate_pct: Decimal,
    pub duration_days: Decimal,
    pub collateral_ratio: Option<Decimal>,
    pub health_grade: Option<HealthGrade>,
    /// Principal plus interest over the full term
    pub total_owed: Option<Decimal>,
    pub repaid: Decimal,
    pub remaining_debt: Option<Decimal>,
    pub started_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    /// Whole days until due; negative once past due
    pub days_remaining: Option<i64>,
    /// Past due plus the grace period while still funded
    pub overdue: bool,
    /// Share of the total owed already repaid, 0 to 100
    pub progress_pct: Decimal,
    pub can_withdraw_collateral: bool,
    pub purpose: String,
}

impl LoanView {
    pub fn from_loan(
        loan: &Loan,
        now: DateTime<Utc>,
        limits: &PlatformLimits,
        decimals: u8,
    ) -> Result<Self, AmountError> {
        let principal = units::from_base_units(loan.amount, decimals)?;
        let collateral = units::from_base_units(loan.collateral_amount, decimals)?;
        let repaid = units::from_base_units(loan.repaid_amount, decimals)?;
        let rate_pct = bps_to_percent(loan.interest_rate_bps);
        let duration_days = seconds_to_days(loan.duration_secs);

        let ratio = collateral_ratio(principal, collateral);
        let due_at = loan.due_at().and_then(timestamp);

        let days_remaining = due_at.map(|due| {
            let secs = (due - now).num_seconds();
            let day = SECONDS_PER_DAY as i64;
            (secs + day - 1).div_euclid(day)
        });

        let overdue = loan.status == LoanStatus::Funded
            && loan
                .due_at()
                .and_then(|due| due.checked_add(limits.grace_period_secs))
                .and_then(timestamp)
                .is_some_and(|deadline| now > deadline);

        let mut view = Self {
            id: loan.id,
            status: loan.status,
            status_label: loan.status.label().to_string(),
            borrower: loan.borrower,
            lender: loan.has_lender().then_some(loan.lender),
            principal,
            collateral,
            rate_pct,
            duration_days,
            collateral_ratio: ratio,
            health_grade: ratio.map(HealthGrade::from_ratio),
            total_owed: None,
            repaid,
            remaining_debt: None,
            started_at: (loan.start_time > 0)
                .then(|| timestamp(loan.start_time))
                .flatten(),
            due_at,
            days_remaining,
            overdue,
            progress_pct: Decimal::ZERO,
            can_withdraw_collateral: loan.status.collateral_withdrawable(),
            purpose: loan.purpose.clone(),
        };
        view.set_total_owed(total_repayment(principal, rate_pct, duration_days));
        Ok(view)
    }

    /// Replace the estimated total with the contract's own figure
    pub fn with_contract_total(mut self, total: U256, decimals: u8) -> Result<Self, AmountError> {
        self.set_total_owed(Some(units::from_base_units(total, decimals)?));
        Ok(self)
    }

    fn set_total_owed(&mut self, total: Option<Decimal>) {
        self.total_owed = total;
        self.remaining_debt = total.map(|t| (t - self.repaid).max(Decimal::ZERO));
        self.progress_pct = match (self.status, total) {
            (LoanStatus::Repaid, _) => Decimal::ONE_HUNDRED,
            (_, Some(t)) if t > Decimal::ZERO => (self.repaid / t * Decimal::ONE_HUNDRED)
                .min(Decimal::ONE_HUNDRED)
                .max(Decimal::ZERO),
            _ => Decimal::ZERO,
        };
    }

    /// Interest over the full term
    pub fn expected_interest(&self) -> Option<Decimal> {
        interest(self.principal, self.rate_pct, self.duration_days)
    }

    /// Collateral divided by remaining debt
    pub fn health_factor(&self) -> Option<Decimal> {
        health_factor(self.collateral, self.remaining_debt?)
    }

    pub fn liquidation_risk(&self) -> Option<LiquidationRisk> {
        self.health_factor().map(LiquidationRisk::from_health_factor)
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Funded
    }
}

/// Whether an address may open another loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerStatus {
    pub info: BorrowerInfo,
    pub is_blacklisted: bool,
    pub max_loans: u32,
    pub can_borrow: bool,
}

impl BorrowerStatus {
    pub fn new(info: BorrowerInfo, is_blacklisted: bool, limits: &PlatformLimits) -> Self {
        let can_borrow =
            !is_blacklisted && info.active_loans < u64::from(limits.max_loans_per_user);
        Self {
            info,
            is_blacklisted,
            max_loans: limits.max_loans_per_user,
            can_borrow,
        }
    }

    /// Reason the address cannot borrow, if any
    pub fn ineligibility(&self) -> Option<&'static str> {
        if self.is_blacklisted {
            Some(RevertCode::UserBlacklisted.user_message())
        } else if !self.can_borrow {
            Some(RevertCode::MaxLoansExceeded.user_message())
        } else {
            None
        }
    }

    pub fn loans_remaining(&self) -> u64 {
        u64::from(self.max_loans).saturating_sub(self.info.active_loans)
    }
}

/// One loan's collateral position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralPosition {
    pub loan_id: LoanId,
    pub status: LoanStatus,
    pub collateral: Decimal,
    pub locked: bool,
    pub withdrawable: bool,
    pub health_factor: Option<Decimal>,
    pub liquidation_risk: Option<LiquidationRisk>,
}

/// Collateral across a borrower's loans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollateralSummary {
    /// Collateral held in Requested or Funded loans
    pub total_locked: Decimal,
    pub total_withdrawable: Decimal,
    pub positions: Vec<CollateralPosition>,
}

impl CollateralSummary {
    pub fn from_views(views: &[LoanView]) -> Self {
        let mut summary = Self::default();

        for view in views {
            let locked = view.status.holds_collateral();
            let risk = if view.is_active() {
                view.liquidation_risk()
            } else {
                None
            };

            if locked {
                summary.total_locked += view.collateral;
            }
            if view.can_withdraw_collateral {
                summary.total_withdrawable += view.collateral;
            }

            summary.positions.push(CollateralPosition {
                loan_id: view.id,
                status: view.status,
                collateral: view.collateral,
                locked,
                withdrawable: view.can_withdraw_collateral,
                health_factor: if view.is_active() { view.health_factor() } else { None },
                liquidation_risk: risk,
            });
        }

        summary
    }

    /// Active positions flagged for liquidation risk
    pub fn at_risk(&self) -> impl Iterator<Item = &CollateralPosition> {
        self.positions
            .iter()
            .filter(|p| p.liquidation_risk == Some(LiquidationRisk::High))
    }
}

/// A lender's funded positions and expected returns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LenderPortfolio {
    pub active_loans: usize,
    pub total_lent: Decimal,
    pub expected_interest: Decimal,
    /// Principal plus expected interest on active loans
    pub expected_returns: Decimal,
    /// Principal-weighted average rate of active loans
    pub average_rate_pct: Option<Decimal>,
    pub completed_loans: usize,
}

impl LenderPortfolio {
    pub fn from_views(views: &[LoanView]) -> Self {
        let mut portfolio = Self::default();
        let mut weighted_rate = Decimal::ZERO;

        for view in views {
            if view.status == LoanStatus::Repaid {
                portfolio.completed_loans += 1;
            }
            if !view.is_active() {
                continue;
            }

            let interest = view.expected_interest().unwrap_or(Decimal::ZERO);
            portfolio.active_loans += 1;
            portfolio.total_lent += view.principal;
            portfolio.expected_interest += interest;
            weighted_rate += view.principal * view.rate_pct;
        }

        portfolio.expected_returns = portfolio.total_lent + portfolio.expected_interest;
        if portfolio.total_lent > Decimal::ZERO {
            portfolio.average_rate_pct = Some(weighted_rate / portfolio.total_lent);
        }
        portfolio
    }
}

/// Effect of a repayment amount on a loan's remaining debt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentPreview {
    pub remaining_debt: Decimal,
    pub amount: Decimal,
    pub remaining_after: Decimal,
    /// Within tolerance of the whole remaining debt
    pub is_full_repayment: bool,
}

impl RepaymentPreview {
    /// Differences below this settle the loan in full
    pub const FULL_REPAYMENT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

    /// Fractions offered as quick-fill buttons, in percent
    pub const QUICK_FILL_PCT: [u32; 4] = [25, 50, 75, 100];

    pub fn new(remaining_debt: Decimal, amount: Decimal) -> Result<Self, FieldError> {
        if amount <= Decimal::ZERO {
            return Err(FieldError::new(
                FormField::Amount,
                "Repayment amount must be greater than 0",
            ));
        }
        if amount > remaining_debt + Self::FULL_REPAYMENT_TOLERANCE {
            return Err(FieldError::new(
                FormField::Amount,
                "Repayment amount exceeds remaining debt",
            ));
        }

        let is_full_repayment = (remaining_debt - amount).abs() < Self::FULL_REPAYMENT_TOLERANCE;
        Ok(Self {
            remaining_debt,
            amount,
            remaining_after: (remaining_debt - amount).max(Decimal::ZERO),
            is_full_repayment,
        })
    }

    /// Amount to send to the contract; zero settles the loan in full
    pub fn contract_amount(&self, decimals: u8) -> Result<U256, AmountError> {
        if self.is_full_repayment {
            return Ok(U256::ZERO);
        }
        units::to_base_units(self.amount, decimals)
    }

    /// Quick-fill amounts for a remaining debt, truncated to token precision
    pub fn quick_fill(remaining_debt: Decimal, decimals: u8) -> Vec<(u32, Decimal)> {
        Self::QUICK_FILL_PCT
            .iter()
            .map(|&pct| {
                let amount = (remaining_debt * Decimal::from(pct) / Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(decimals as u32, RoundingStrategy::ToZero);
                (pct, amount)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    const WEI: u128 = 1_000_000_000_000_000_000;
    const START: u64 = 1_700_000_000;

    fn loan(status: LoanStatus) -> Loan {
        Loan {
            id: 7,
            borrower: Address::repeat_byte(0xab),
            lender: if status == LoanStatus::Requested {
                Address::ZERO
            } else {
                Address::repeat_byte(0xcd)
            },
            amount: U256::from(100 * WEI),
            interest_rate_bps: 1_000,
            duration_secs: 365 * SECONDS_PER_DAY,
            start_time: if status == LoanStatus::Requested { 0 } else { START },
            collateral_amount: U256::from(150 * WEI),
            status,
            repaid_amount: U256::ZERO,
            is_partially_repaid: false,
            purpose: "Inventory".to_string(),
        }
    }

    fn at(secs: u64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs as i64, 0).unwrap()
    }

    #[test]
    fn test_view_of_funded_loan() {
        let limits = PlatformLimits::default();
        let view = LoanView::from_loan(&loan(LoanStatus::Funded), at(START), &limits, 18).unwrap();

        assert_eq!(view.principal, dec!(100));
        assert_eq!(view.rate_pct, dec!(10));
        assert_eq!(view.duration_days, dec!(365));
        assert_eq!(view.collateral_ratio, Some(dec!(150)));
        assert_eq!(view.health_grade, Some(HealthGrade::Fair));
        assert_eq!(view.total_owed, Some(dec!(110)));
        assert_eq!(view.remaining_debt, Some(dec!(110)));
        assert_eq!(view.days_remaining, Some(365));
        assert!(!view.overdue);
        assert!(!view.can_withdraw_collateral);
        assert_eq!(view.lender, Some(Address::repeat_byte(0xcd)));
    }

    #[test]
    fn test_requested_loan_has_no_schedule() {
        let limits = PlatformLimits::default();
        let view =
            LoanView::from_loan(&loan(LoanStatus::Requested), at(START), &limits, 18).unwrap();
        assert_eq!(view.due_at, None);
        assert_eq!(view.started_at, None);
        assert_eq!(view.days_remaining, None);
        assert_eq!(view.lender, None);
        assert!(!view.overdue);
    }

    #[test]
    fn test_overdue_only_after_grace_period() {
        let limits = PlatformLimits::default();
        let due = START + 365 * SECONDS_PER_DAY;
        let funded = loan(LoanStatus::Funded);

        let view = LoanView::from_loan(&funded, at(due + 3_600), &limits, 18).unwrap();
        assert!(!view.overdue);
        assert_eq!(view.days_remaining, Some(0));

        let view =
            LoanView::from_loan(&funded, at(due + SECONDS_PER_DAY + 1), &limits, 18).unwrap();
        assert!(view.overdue);
        assert_eq!(view.days_remaining, Some(-1));

        let repaid = loan(LoanStatus::Repaid);
        let view =
            LoanView::from_loan(&repaid, at(due + 10 * SECONDS_PER_DAY), &limits, 18).unwrap();
        assert!(!view.overdue);
    }

    #[test]
    fn test_partial_repayment_progress() {
        let limits = PlatformLimits::default();
        let mut funded = loan(LoanStatus::Funded);
        funded.repaid_amount = U256::from(55 * WEI);
        funded.is_partially_repaid = true;

        let view = LoanView::from_loan(&funded, at(START), &limits, 18).unwrap();
        assert_eq!(view.remaining_debt, Some(dec!(55)));
        assert_eq!(view.progress_pct, dec!(50));
        assert_eq!(view.health_factor(), Some(dec!(150) / dec!(55)));
    }

    #[test]
    fn test_contract_total_overrides_estimate() {
        let limits = PlatformLimits::default();
        let view = LoanView::from_loan(&loan(LoanStatus::Funded), at(START), &limits, 18)
            .unwrap()
            .with_contract_total(U256::from(111 * WEI), 18)
            .unwrap();
        assert_eq!(view.total_owed, Some(dec!(111)));
        assert_eq!(view.remaining_debt, Some(dec!(111)));
    }

    #[test]
    fn test_repaid_loan_is_complete_and_withdrawable() {
        let limits = PlatformLimits::default();
        let view = LoanView::from_loan(&loan(LoanStatus::Repaid), at(START), &limits, 18).unwrap();
        assert_eq!(view.progress_pct, dec!(100));
        assert!(view.can_withdraw_collateral);
    }

    #[test]
    fn test_borrower_status() {
        let limits = PlatformLimits::default();
        let info = BorrowerInfo {
            active_loans: 4,
            ..BorrowerInfo::default()
        };

        let status = BorrowerStatus::new(info.clone(), false, &limits);
        assert!(status.can_borrow);
        assert_eq!(status.loans_remaining(), 1);
        assert_eq!(status.ineligibility(), None);

        let full = BorrowerStatus::new(
            BorrowerInfo {
                active_loans: 5,
                ..BorrowerInfo::default()
            },
            false,
            &limits,
        );
        assert!(!full.can_borrow);
        assert_eq!(full.ineligibility(), Some("Maximum 5 active loans per user."));

        let banned = BorrowerStatus::new(info, true, &limits);
        assert!(!banned.can_borrow);
        assert_eq!(banned.ineligibility(), Some("User is blacklisted from platform."));
    }

    #[test]
    fn test_collateral_summary() {
        let limits = PlatformLimits::default();
        let views: Vec<LoanView> = [
            LoanStatus::Requested,
            LoanStatus::Funded,
            LoanStatus::Repaid,
            LoanStatus::Liquidated,
        ]
        .into_iter()
        .map(|status| LoanView::from_loan(&loan(status), at(START), &limits, 18).unwrap())
        .collect();

        let summary = CollateralSummary::from_views(&views);
        assert_eq!(summary.total_locked, dec!(300));
        assert_eq!(summary.total_withdrawable, dec!(150));
        assert_eq!(summary.positions.len(), 4);
        assert_eq!(summary.at_risk().count(), 1);

        let funded = &summary.positions[1];
        assert_eq!(funded.health_factor, Some(dec!(150) / dec!(110)));
        assert_eq!(funded.liquidation_risk, Some(LiquidationRisk::High));
        assert_eq!(summary.positions[0].liquidation_risk, None);
    }

    #[test]
    fn test_lender_portfolio() {
        let limits = PlatformLimits::default();
        let mut second = loan(LoanStatus::Funded);
        second.amount = U256::from(300 * WEI);
        second.collateral_amount = U256::from(450 * WEI);
        second.interest_rate_bps = 2_000;

        let views: Vec<LoanView> = [loan(LoanStatus::Funded), second, loan(LoanStatus::Repaid)]
            .iter()
            .map(|l| LoanView::from_loan(l, at(START), &limits, 18).unwrap())
            .collect();

        let portfolio = LenderPortfolio::from_views(&views);
        assert_eq!(portfolio.active_loans, 2);
        assert_eq!(portfolio.completed_loans, 1);
        assert_eq!(portfolio.total_lent, dec!(400));
        assert_eq!(portfolio.expected_interest, dec!(70));
        assert_eq!(portfolio.expected_returns, dec!(470));
        assert_eq!(portfolio.average_rate_pct, Some(dec!(17.5)));
    }

    #[test]
    fn test_repayment_preview() {
        let partial = RepaymentPreview::new(dec!(110), dec!(55)).unwrap();
        assert_eq!(partial.remaining_after, dec!(55));
        assert!(!partial.is_full_repayment);
        assert_eq!(
            partial.contract_amount(18).unwrap(),
            U256::from(55 * WEI)
        );

        let full = RepaymentPreview::new(dec!(110), dec!(109.9995)).unwrap();
        assert!(full.is_full_repayment);
        assert_eq!(full.contract_amount(18).unwrap(), U256::ZERO);

        assert!(RepaymentPreview::new(dec!(110), dec!(0)).is_err());
        assert!(RepaymentPreview::new(dec!(110), dec!(111)).is_err());
    }

    #[test]
    fn test_quick_fill() {
        let fills = RepaymentPreview::quick_fill(dec!(110), 18);
        assert_eq!(
            fills,
            vec![
                (25, dec!(27.5)),
                (50, dec!(55)),
                (75, dec!(82.5)),
                (100, dec!(110)),
            ]
        );

        let fills = RepaymentPreview::quick_fill(dec!(0.03), 1);
        assert_eq!(fills[0], (25, dec!(0.0)));
    }

    #[test]
    fn test_short_address() {
        let short = short_address(&Address::repeat_byte(0xab));
        assert_eq!(short.len(), 13);
        assert!(short.starts_with("0x"));
        assert!(short.contains("..."));
    }
}
