//! # FlashDAG Economics
//!
//! Advisory loan economics for the FlashDAG client. Every figure here is for
//! display and early feedback; the lending contract computes the settlement
//! amounts.
//!
//! ## Formulas
//!
//! ```text
//! interest        = P * R * D / (365 * 100)
//! total repayment = P + interest
//! collateral ratio = C / P * 100
//! ```
//!
//! Where P is the principal, R the annual rate in percent, D the duration in
//! days and C the collateral.
//!
//! ## Modules
//!
//! - [`interest`]: Simple interest and repayment totals
//! - [`collateral`]: Collateral ratio, minimum collateral, health grading
//! - [`rates`]: Exact basis-point and duration conversions, market rate bands
//! - [`validation`]: Loan form validation against [`PlatformLimits`]
//! - [`projection`]: Dashboard views derived from loan snapshots
//! - [`marketplace`]: Lender-side listing, filtering and sorting
//!
//! [`PlatformLimits`]: flashdag_common::PlatformLimits

pub mod collateral;
pub mod interest;
pub mod marketplace;
pub mod projection;
pub mod rates;
pub mod validation;

pub use collateral::{collateral_ratio, min_collateral, HealthGrade, LiquidationRisk};
pub use interest::{interest, total_repayment, LoanQuote};
pub use marketplace::{AvailableLoan, MarketFilter, MarketSegment, SortOrder};
pub use projection::{
    BorrowerStatus, CollateralSummary, LenderPortfolio, LoanView, RepaymentPreview,
};
pub use rates::{bps_to_percent, percent_to_bps, RateBand};
pub use validation::{validate_loan_request, LoanForm};
