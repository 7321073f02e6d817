//! # FlashDAG Common
//!
//! Shared types, errors, and token-unit helpers for the FlashDAG micro-lending client.
//!
//! ## Core Types
//!
//! - [`LoanRequest`]: Parameters submitted by a borrower
//! - [`Loan`]: Read-only snapshot of an on-chain loan record
//! - [`LoanStatus`]: Lifecycle stage owned by the lending contract
//! - [`PlatformStats`], [`LenderInfo`], [`BorrowerInfo`]: Aggregate projections
//! - [`PlatformLimits`]: Platform constants used for early client-side checks
//!
//! ## Units
//!
//! - [`units`]: Exact conversion between token display amounts and wei

pub mod error;
pub mod types;
pub mod units;

// Re-export commonly used types at crate root
pub use alloy_primitives::{Address, TxHash, U256};
pub use error::{
    AmountError, ContractError, FieldError, FlashdagError, FormField, Result, RevertCode,
    TransactionError,
};
pub use types::{
    account::{BorrowerInfo, LenderInfo, PlatformStats, TokenMetadata},
    limits::PlatformLimits,
    loan::{Loan, LoanId, LoanRequest, LoanStatus},
};

/// FlashDAG version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Basis-point denominator (100%)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Days used for annualizing simple interest
pub const DAYS_PER_YEAR: u32 = 365;

/// Seconds in one day
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Minimum loan amount in whole tokens
pub const MIN_LOAN_AMOUNT: u64 = 1;

/// Maximum loan amount in whole tokens
pub const MAX_LOAN_AMOUNT: u64 = 1_000_000;

/// Minimum loan duration in days
pub const MIN_LOAN_DURATION_DAYS: u32 = 1;

/// Maximum loan duration in days
pub const MAX_LOAN_DURATION_DAYS: u32 = 365;

/// Maximum interest rate (30%) in basis points
pub const MAX_INTEREST_RATE_BPS: u32 = 3_000;

/// Minimum collateral ratio (120%) in basis points
pub const MIN_COLLATERAL_RATIO_BPS: u32 = 12_000;

/// Collateral ratio at which a funded loan becomes liquidatable
pub const LIQUIDATION_THRESHOLD_BPS: u32 = 12_000;

/// Platform fee (1%) in basis points
pub const PLATFORM_FEE_BPS: u32 = 100;

/// Grace period after the due date, in seconds
pub const GRACE_PERIOD_SECS: u64 = SECONDS_PER_DAY;

/// Maximum concurrently active loans per borrower
pub const MAX_LOANS_PER_USER: u32 = 5;

/// Symbol of the platform token
pub const TOKEN_SYMBOL: &str = "BDAG";

/// Purpose recorded when the borrower leaves it blank
pub const DEFAULT_LOAN_PURPOSE: &str = "General Purpose";
