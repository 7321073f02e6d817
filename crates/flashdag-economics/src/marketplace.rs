//! Lender marketplace: open loan requests, filtering and sorting

use flashdag_common::{units, Address, AmountError, Loan, LoanId, LoanStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::collateral::{collateral_ratio, risk_score, LOW_RISK_SCORE};
use crate::interest::interest;
use crate::rates::{bps_to_percent, seconds_to_days};

/// Rate at or above which a listing counts as high yield
pub const HIGH_YIELD_RATE_PCT: Decimal = Decimal::from_parts(6, 0, 0, false, 0);

/// Term at or below which a listing counts as short term
pub const SHORT_TERM_DAYS: Decimal = Decimal::from_parts(30, 0, 0, false, 0);

/// A loan request waiting for a lender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableLoan {
    pub id: LoanId,
    pub borrower: Address,
    pub amount: Decimal,
    pub collateral: Decimal,
    pub rate_pct: Decimal,
    pub duration_days: Decimal,
    pub collateral_ratio: Option<Decimal>,
    pub risk_score: u8,
    /// Interest the lender earns over the term
    pub expected_return: Option<Decimal>,
    pub purpose: String,
}

impl AvailableLoan {
    /// Listing for a loan, or `None` when it is no longer open
    pub fn from_loan(loan: &Loan, decimals: u8) -> Result<Option<Self>, AmountError> {
        if loan.status != LoanStatus::Requested {
            return Ok(None);
        }

        let amount = units::from_base_units(loan.amount, decimals)?;
        let collateral = units::from_base_units(loan.collateral_amount, decimals)?;
        let rate_pct = bps_to_percent(loan.interest_rate_bps);
        let duration_days = seconds_to_days(loan.duration_secs);
        let ratio = collateral_ratio(amount, collateral);

        Ok(Some(Self {
            id: loan.id,
            borrower: loan.borrower,
            amount,
            collateral,
            rate_pct,
            duration_days,
            collateral_ratio: ratio,
            risk_score: risk_score(ratio),
            expected_return: interest(amount, rate_pct, duration_days),
            purpose: loan.purpose.clone(),
        }))
    }

    pub fn is_low_risk(&self) -> bool {
        self.risk_score >= LOW_RISK_SCORE
    }

    fn matches_search(&self, needle: &str) -> bool {
        self.borrower.to_string().to_lowercase().contains(needle)
            || self.purpose.to_lowercase().contains(needle)
    }
}

/// Open listings among a set of loans
pub fn available_loans<'a>(
    loans: impl IntoIterator<Item = &'a Loan>,
    decimals: u8,
) -> Result<Vec<AvailableLoan>, AmountError> {
    let mut listings = Vec::new();
    for loan in loans {
        if let Some(listing) = AvailableLoan::from_loan(loan, decimals)? {
            listings.push(listing);
        }
    }
    Ok(listings)
}

/// Marketplace tab
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSegment {
    #[default]
    All,
    HighYield,
    ShortTerm,
    LowRisk,
}

impl MarketSegment {
    pub fn matches(&self, loan: &AvailableLoan) -> bool {
        match self {
            MarketSegment::All => true,
            MarketSegment::HighYield => loan.rate_pct >= HIGH_YIELD_RATE_PCT,
            MarketSegment::ShortTerm => loan.duration_days <= SHORT_TERM_DAYS,
            MarketSegment::LowRisk => loan.is_low_risk(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Most recently requested first
    #[default]
    Newest,
    HighestYield,
    LowestRisk,
    ShortestTerm,
}

impl SortOrder {
    pub fn sort(&self, loans: &mut [AvailableLoan]) {
        match self {
            SortOrder::Newest => loans.sort_by(|a, b| b.id.cmp(&a.id)),
            SortOrder::HighestYield => {
                loans.sort_by(|a, b| b.rate_pct.cmp(&a.rate_pct).then(b.id.cmp(&a.id)))
            }
            SortOrder::LowestRisk => {
                loans.sort_by(|a, b| b.risk_score.cmp(&a.risk_score).then(b.id.cmp(&a.id)))
            }
            SortOrder::ShortestTerm => loans.sort_by(|a, b| {
                a.duration_days
                    .cmp(&b.duration_days)
                    .then(b.id.cmp(&a.id))
            }),
        }
    }
}

/// Segment, search and ordering applied to the listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketFilter {
    pub segment: MarketSegment,
    /// Case-insensitive match on borrower address or purpose
    pub search: Option<String>,
    pub sort: SortOrder,
}

impl MarketFilter {
    pub fn new(segment: MarketSegment, sort: SortOrder) -> Self {
        Self {
            segment,
            search: None,
            sort,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = (!search.trim().is_empty()).then(|| search.trim().to_lowercase());
        self
    }

    pub fn apply(&self, loans: &[AvailableLoan]) -> Vec<AvailableLoan> {
        let needle = self.search.as_deref().map(str::to_lowercase);
        let mut selected: Vec<AvailableLoan> = loans
            .iter()
            .filter(|loan| self.segment.matches(loan))
            .filter(|loan| needle.as_deref().map_or(true, |n| loan.matches_search(n)))
            .cloned()
            .collect();
        self.sort.sort(&mut selected);
        selected
    }
}
