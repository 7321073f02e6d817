//! Loan records and loan requests
//!
//! A [`Loan`] is a snapshot of contract state. Status transitions, interest
//! accrual and collateral enforcement happen on-chain; nothing here mutates a
//! loan.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::DEFAULT_LOAN_PURPOSE;

/// Contract-assigned loan identifier (starts at 1)
pub type LoanId = u64;

/// Lifecycle stage of a loan, as encoded by the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LoanStatus {
    /// Waiting for a lender
    Requested = 0,
    /// Funded and accruing interest
    Funded = 1,
    /// Fully repaid
    Repaid = 2,
    /// Past due and marked as defaulted
    Defaulted = 3,
    /// Withdrawn by the borrower before funding
    Cancelled = 4,
    /// Collateral seized
    Liquidated = 5,
}

impl LoanStatus {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            LoanStatus::Requested => "Requested",
            LoanStatus::Funded => "Funded",
            LoanStatus::Repaid => "Repaid",
            LoanStatus::Defaulted => "Defaulted",
            LoanStatus::Cancelled => "Cancelled",
            LoanStatus::Liquidated => "Liquidated",
        }
    }

    /// Collateral is still held by the contract
    pub fn holds_collateral(&self) -> bool {
        matches!(self, LoanStatus::Requested | LoanStatus::Funded)
    }

    /// The borrower can take the collateral back
    pub fn collateral_withdrawable(&self) -> bool {
        matches!(self, LoanStatus::Repaid | LoanStatus::Cancelled)
    }

    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        !self.holds_collateral()
    }
}

impl TryFrom<u8> for LoanStatus {
    type Error = ContractError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LoanStatus::Requested),
            1 => Ok(LoanStatus::Funded),
            2 => Ok(LoanStatus::Repaid),
            3 => Ok(LoanStatus::Defaulted),
            4 => Ok(LoanStatus::Cancelled),
            5 => Ok(LoanStatus::Liquidated),
            other => Err(ContractError::Decode(format!("unknown loan status {}", other))),
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Loan parameters in contract encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequest {
    /// Principal in wei
    pub amount: U256,
    /// Annual rate in basis points
    pub interest_rate_bps: u32,
    /// Duration in seconds
    pub duration_secs: u64,
    /// Collateral in wei
    pub collateral_amount: U256,
    /// Free-text purpose
    pub purpose: String,
}

impl LoanRequest {
    /// Create a request; a blank purpose becomes the platform default
    pub fn new(
        amount: U256,
        interest_rate_bps: u32,
        duration_secs: u64,
        collateral_amount: U256,
        purpose: impl Into<String>,
    ) -> Self {
        let purpose = purpose.into();
        let purpose = if purpose.trim().is_empty() {
            DEFAULT_LOAN_PURPOSE.to_string()
        } else {
            purpose
        };

        Self {
            amount,
            interest_rate_bps,
            duration_secs,
            collateral_amount,
            purpose,
        }
    }
}

/// Snapshot of an on-chain loan record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower: Address,
    /// Zero address until funded
    pub lender: Address,
    /// Principal in wei
    pub amount: U256,
    pub interest_rate_bps: u32,
    pub duration_secs: u64,
    /// Unix seconds; zero until funded
    pub start_time: u64,
    /// Collateral in wei
    pub collateral_amount: U256,
    pub status: LoanStatus,
    /// Amount repaid so far, in wei
    pub repaid_amount: U256,
    pub is_partially_repaid: bool,
    pub purpose: String,
}

impl Loan {
    /// Whether a lender has been assigned
    pub fn has_lender(&self) -> bool {
        self.lender != Address::ZERO
    }

    /// Unix timestamp at which the loan falls due
    pub fn due_at(&self) -> Option<u64> {
        if self.start_time == 0 {
            return None;
        }
        self.start_time.checked_add(self.duration_secs)
    }

    pub fn is_borrower(&self, who: Address) -> bool {
        self.borrower == who
    }

    pub fn is_lender(&self, who: Address) -> bool {
        self.has_lender() && self.lender == who
    }
}
