//! Contract seams
//!
//! The lending and token contracts are external collaborators. Everything the
//! client needs from them goes through these traits, so the same facade runs
//! against the EVM gateway or the in-memory double.

use async_trait::async_trait;
use flashdag_common::{
    Address, BorrowerInfo, LenderInfo, Loan, LoanId, LoanRequest, PlatformStats, Result,
    TokenMetadata, TxHash, U256,
};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

/// Read and write surface of the lending contract
///
/// Write methods return once the transaction is signed and submitted. Whether
/// it was mined is answered by a [`ReceiptSource`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LendingContract: Send + Sync {
    /// Address of the deployed contract (spender for token approvals)
    fn address(&self) -> Address;

    /// Number of loans ever requested; ids run from 1 to this value
    async fn loan_counter(&self) -> Result<u64>;

    /// Loan record, `None` when the id does not exist
    async fn loan(&self, id: LoanId) -> Result<Option<Loan>>;

    /// Contract-side principal plus interest
    async fn total_repayment(&self, id: LoanId) -> Result<U256>;

    async fn platform_stats(&self) -> Result<PlatformStats>;

    async fn lender_info(&self, who: Address) -> Result<LenderInfo>;

    async fn borrower_info(&self, who: Address) -> Result<BorrowerInfo>;

    /// Ids of loans requested by `who`
    async fn user_loans(&self, who: Address) -> Result<Vec<LoanId>>;

    /// Ids of loans funded by `who`
    async fn user_lends(&self, who: Address) -> Result<Vec<LoanId>>;

    async fn is_blacklisted(&self, who: Address) -> Result<bool>;

    async fn request_loan(&self, from: Address, request: LoanRequest) -> Result<TxHash>;

    async fn fund_loan(&self, from: Address, id: LoanId) -> Result<TxHash>;

    /// Repay `amount` wei; zero repays the loan in full
    async fn repay_loan(&self, from: Address, id: LoanId, amount: U256) -> Result<TxHash>;

    async fn cancel_loan(&self, from: Address, id: LoanId) -> Result<TxHash>;

    async fn default_loan(&self, from: Address, id: LoanId) -> Result<TxHash>;

    async fn liquidate_loan(&self, from: Address, id: LoanId) -> Result<TxHash>;
}

/// ERC-20 surface of the platform token
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenContract: Send + Sync {
    async fn metadata(&self) -> Result<TokenMetadata>;

    async fn balance_of(&self, who: Address) -> Result<U256>;

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256>;

    async fn approve(&self, from: Address, spender: Address, amount: U256) -> Result<TxHash>;

    async fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<TxHash>;
}

/// Outcome of a submitted transaction as last observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confirmation {
    /// Not mined yet
    Pending,
    Confirmed,
    /// Mined and reverted, or dropped
    Failed(String),
}

/// Confirmation queries for submitted transactions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    async fn confirmation(&self, hash: TxHash) -> Result<Confirmation>;
}
