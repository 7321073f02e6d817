//! Aggregate read-only projections of contract state

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Platform-wide figures reported by the lending contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_loans: u64,
    /// Wei
    pub total_borrowed: U256,
    /// Wei
    pub total_collateral_locked: U256,
    /// Basis points
    pub utilization_rate_bps: u32,
    /// Basis points
    pub max_utilization_rate_bps: u32,
    /// Recipient of platform fees
    pub treasury: Address,
    pub emergency: bool,
}

/// Per-address lender record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LenderInfo {
    pub total_lent: U256,
    pub active_lends: u64,
    pub total_earned: U256,
    pub is_verified: bool,
    pub reputation_score: u64,
}

/// Per-address borrower record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerInfo {
    pub total_borrowed: U256,
    pub active_loans: u64,
    pub successful_loans: u64,
    pub defaulted_loans: u64,
    pub is_verified: bool,
    pub credit_score: u64,
}

/// ERC-20 metadata of the platform token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            name: "BlockDAG".to_string(),
            symbol: "BDAG".to_string(),
            decimals: crate::units::DEFAULT_DECIMALS,
            total_supply: U256::ZERO,
        }
    }
}
