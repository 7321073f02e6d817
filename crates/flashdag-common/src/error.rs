//! Error types for the FlashDAG client
//!
//! One unified error type plus domain-specific variants. Every variant is
//! recoverable: callers surface [`FlashdagError::user_message`] and return the
//! user to an editable form.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::loan::{LoanId, LoanStatus};

/// Result type alias using FlashdagError
pub type Result<T> = std::result::Result<T, FlashdagError>;

/// Unified error type for FlashDAG operations
#[derive(Debug, Error)]
pub enum FlashdagError {
    // Wallet errors
    #[error("Wallet not connected")]
    WalletNotConnected,

    // Input validation errors (never sent to the network)
    #[error("Validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    // Amount conversion errors
    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    // Balance checks performed before submission
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    // Loan lookup errors
    #[error("Loan not found: {0}")]
    LoanNotFound(LoanId),

    #[error("Loan {loan_id} is {actual}, expected {expected}")]
    UnexpectedStatus {
        loan_id: LoanId,
        expected: LoanStatus,
        actual: LoanStatus,
    },

    #[error("Not eligible: {0}")]
    NotEligible(String),

    // Contract errors
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    // Transaction lifecycle errors
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlashdagError {
    /// Status-line text shown to the user
    pub fn user_message(&self) -> String {
        match self {
            FlashdagError::WalletNotConnected => "Please connect your wallet first".to_string(),
            FlashdagError::Validation(errors) => {
                format!("Validation errors: {}", join_field_errors(errors))
            }
            FlashdagError::InsufficientBalance { required, available } => format!(
                "Insufficient balance: {} required, {} available",
                required, available
            ),
            FlashdagError::Contract(ContractError::Reverted { code }) => {
                code.user_message().to_string()
            }
            FlashdagError::Contract(ContractError::RevertedWithReason { reason }) => {
                format!("Error: {}", reason)
            }
            other => format!("Error: {}", other),
        }
    }

    /// Field errors carried by a validation failure
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            FlashdagError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

/// Form field a validation error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Amount,
    Collateral,
    InterestRate,
    Duration,
    Purpose,
}

impl std::fmt::Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FormField::Amount => "amount",
            FormField::Collateral => "collateral",
            FormField::InterestRate => "interestRate",
            FormField::Duration => "duration",
            FormField::Purpose => "purpose",
        };
        f.write_str(name)
    }
}

/// A single client-side validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: FormField,
    pub message: String,
}

impl FieldError {
    pub fn new(field: FormField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Token amount conversion errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,

    #[error("Invalid amount: {0}")]
    Parse(String),

    #[error("Amount must not be negative")]
    Negative,

    #[error("Amount has more than {decimals} decimal places")]
    Precision { decimals: u8 },

    #[error("Amount overflows the supported range")]
    Overflow,

    #[error("Rate {0}% is not a whole number of basis points")]
    FractionalBasisPoints(Decimal),
}

/// Custom errors raised by the lending contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevertCode {
    InvalidAmount,
    InvalidDuration,
    InvalidInterestRate,
    InvalidCollateralAmount,
    InsufficientCollateral,
    LoanNotFound,
    NotBorrower,
    NotLender,
    LoanNotActive,
    UserBlacklisted,
    MaxLoansExceeded,
}

impl RevertCode {
    /// Every known revert code
    pub const ALL: [RevertCode; 11] = [
        RevertCode::InvalidAmount,
        RevertCode::InvalidDuration,
        RevertCode::InvalidInterestRate,
        RevertCode::InvalidCollateralAmount,
        RevertCode::InsufficientCollateral,
        RevertCode::LoanNotFound,
        RevertCode::NotBorrower,
        RevertCode::NotLender,
        RevertCode::LoanNotActive,
        RevertCode::UserBlacklisted,
        RevertCode::MaxLoansExceeded,
    ];

    /// Solidity error name
    pub fn name(&self) -> &'static str {
        match self {
            RevertCode::InvalidAmount => "InvalidAmount",
            RevertCode::InvalidDuration => "InvalidDuration",
            RevertCode::InvalidInterestRate => "InvalidInterestRate",
            RevertCode::InvalidCollateralAmount => "InvalidCollateralAmount",
            RevertCode::InsufficientCollateral => "InsufficientCollateral",
            RevertCode::LoanNotFound => "LoanNotFound",
            RevertCode::NotBorrower => "NotBorrower",
            RevertCode::NotLender => "NotLender",
            RevertCode::LoanNotActive => "LoanNotActive",
            RevertCode::UserBlacklisted => "UserBlacklisted",
            RevertCode::MaxLoansExceeded => "MaxLoansExceeded",
        }
    }

    /// Message shown to the user when the contract reverts with this code
    pub fn user_message(&self) -> &'static str {
        match self {
            RevertCode::InvalidAmount => "Invalid loan amount. Check min/max limits.",
            RevertCode::InvalidDuration => "Invalid loan duration. Must be 1-365 days.",
            RevertCode::InvalidInterestRate => "Interest rate too high. Maximum 30%.",
            RevertCode::InvalidCollateralAmount => {
                "Insufficient collateral. Minimum 120% required."
            }
            RevertCode::InsufficientCollateral => {
                "Collateral ratio below liquidation threshold."
            }
            RevertCode::LoanNotFound => "Loan ID does not exist.",
            RevertCode::NotBorrower => "Only borrower can perform this action.",
            RevertCode::NotLender => "Only lender can perform this action.",
            RevertCode::LoanNotActive => "Loan is not in active state.",
            RevertCode::UserBlacklisted => "User is blacklisted from platform.",
            RevertCode::MaxLoansExceeded => "Maximum 5 active loans per user.",
        }
    }

    /// Look up a code by its Solidity error name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.name() == name)
    }

    /// Find the first known error name mentioned in a free-form revert message
    pub fn find_in(message: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|code| message.contains(code.name()))
    }
}

impl std::fmt::Display for RevertCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Contract call errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContractError {
    #[error("{}", .code.user_message())]
    Reverted { code: RevertCode },

    #[error("Transaction reverted: {reason}")]
    RevertedWithReason { reason: String },

    #[error("Call failed: {0}")]
    Call(String),

    #[error("Unexpected contract data: {0}")]
    Decode(String),
}

/// Transaction lifecycle errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransactionError {
    #[error("Another transaction is in progress: {action}")]
    Busy { action: String },

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Transaction {hash} failed: {reason}")]
    Failed { hash: String, reason: String },
}

// Implement From for common external error types
impl From<serde_json::Error> for FlashdagError {
    fn from(err: serde_json::Error) -> Self {
        FlashdagError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for FlashdagError {
    fn from(err: anyhow::Error) -> Self {
        FlashdagError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_joins_fields() {
        let err = FlashdagError::Validation(vec![
            FieldError::new(FormField::Amount, "Minimum loan amount is 1 BDAG"),
            FieldError::new(FormField::Duration, "Duration must be between 1 and 365 days"),
        ]);
        assert_eq!(
            err.user_message(),
            "Validation errors: Minimum loan amount is 1 BDAG, Duration must be between 1 and 365 days"
        );
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn test_revert_code_lookup() {
        assert_eq!(
            RevertCode::from_name("MaxLoansExceeded"),
            Some(RevertCode::MaxLoansExceeded)
        );
        assert_eq!(RevertCode::from_name("Nope"), None);
        assert_eq!(
            RevertCode::find_in("execution reverted: NotLender()"),
            Some(RevertCode::NotLender)
        );
    }

    #[test]
    fn test_revert_surfaces_user_message() {
        let err = FlashdagError::from(ContractError::Reverted {
            code: RevertCode::UserBlacklisted,
        });
        assert_eq!(err.user_message(), "User is blacklisted from platform.");
    }

    #[test]
    fn test_wallet_not_connected_message() {
        assert_eq!(
            FlashdagError::WalletNotConnected.user_message(),
            "Please connect your wallet first"
        );
    }
}
