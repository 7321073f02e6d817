//! EVM gateway
//!
//! Implements the contract seams over JSON-RPC with `alloy`. Reads go straight
//! to the node; writes are signed by a local private-key wallet and return as
//! soon as the node accepts them.

use alloy::{
    network::{EthereumWallet, ReceiptResponse as _},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
    transports::http::reqwest::Url,
};
use async_trait::async_trait;
use flashdag_common::{
    Address, BorrowerInfo, ContractError, FlashdagError, LenderInfo, Loan, LoanId, LoanRequest,
    LoanStatus, PlatformStats, Result, RevertCode, TokenMetadata, TxHash, U256,
};
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::contract::{Confirmation, LendingContract, ReceiptSource, TokenContract};

sol! {
    #[sol(rpc)]
    interface IMicroLendingPlatform {
        struct LoanRequest {
            uint256 amount;
            uint256 interestRate;
            uint256 duration;
            uint256 collateralAmount;
            string purpose;
        }

        error InvalidAmount();
        error InvalidDuration();
        error InvalidInterestRate();
        error InvalidCollateralAmount();
        error InsufficientCollateral();
        error LoanNotFound();
        error NotBorrower();
        error NotLender();
        error LoanNotActive();
        error UserBlacklisted();
        error MaxLoansExceeded();

        function loanCounter() external view returns (uint256);
        function loans(uint256 loanId) external view returns (
            address borrower,
            address lender,
            uint256 amount,
            uint256 interestRate,
            uint256 duration,
            uint256 startTime,
            uint256 collateralAmount,
            uint8 status,
            uint256 repaidAmount,
            bool isPartiallyRepaid,
            string purpose
        );
        function calculateTotalRepayment(uint256 loanId) external view returns (uint256);
        function getPlatformStats() external view returns (
            uint256 totalLoans,
            uint256 totalBorrowedAmount,
            uint256 totalCollateralLocked,
            uint256 utilizationRate,
            bool emergencyStatus
        );
        function treasury() external view returns (address);
        function maxUtilizationRate() external view returns (uint256);
        function lenders(address user) external view returns (
            uint256 totalLent,
            uint256 activeLends,
            uint256 totalEarned,
            bool isVerified,
            uint256 reputationScore
        );
        function borrowers(address user) external view returns (
            uint256 totalBorrowed,
            uint256 activeLoans,
            uint256 successfulLoans,
            uint256 defaultedLoans,
            bool isVerified,
            uint256 creditScore
        );
        function getUserLoans(address user) external view returns (uint256[] memory);
        function getUserLends(address user) external view returns (uint256[] memory);
        function blacklisted(address user) external view returns (bool);

        function requestLoan(LoanRequest calldata request) external;
        function fundLoan(uint256 loanId) external;
        function repayLoan(uint256 loanId, uint256 amount) external;
        function cancelLoan(uint256 loanId) external;
        function defaultLoan(uint256 loanId) external;
        function liquidateLoan(uint256 loanId) external;
    }
}

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

use IMicroLendingPlatform::{IMicroLendingPlatformErrors, IMicroLendingPlatformInstance};
use IERC20::IERC20Instance;

fn revert_code(err: &IMicroLendingPlatformErrors) -> RevertCode {
    match err {
        IMicroLendingPlatformErrors::InvalidAmount(_) => RevertCode::InvalidAmount,
        IMicroLendingPlatformErrors::InvalidDuration(_) => RevertCode::InvalidDuration,
        IMicroLendingPlatformErrors::InvalidInterestRate(_) => RevertCode::InvalidInterestRate,
        IMicroLendingPlatformErrors::InvalidCollateralAmount(_) => {
            RevertCode::InvalidCollateralAmount
        }
        IMicroLendingPlatformErrors::InsufficientCollateral(_) => {
            RevertCode::InsufficientCollateral
        }
        IMicroLendingPlatformErrors::LoanNotFound(_) => RevertCode::LoanNotFound,
        IMicroLendingPlatformErrors::NotBorrower(_) => RevertCode::NotBorrower,
        IMicroLendingPlatformErrors::NotLender(_) => RevertCode::NotLender,
        IMicroLendingPlatformErrors::LoanNotActive(_) => RevertCode::LoanNotActive,
        IMicroLendingPlatformErrors::UserBlacklisted(_) => RevertCode::UserBlacklisted,
        IMicroLendingPlatformErrors::MaxLoansExceeded(_) => RevertCode::MaxLoansExceeded,
    }
}

/// Map an alloy call error onto the client error taxonomy
///
/// Custom errors are decoded by selector; node messages that only name the
/// error fall back to a text match.
fn call_error(err: alloy::contract::Error) -> FlashdagError {
    if let Some(decoded) = err.as_decoded_interface_error::<IMicroLendingPlatformErrors>() {
        return ContractError::Reverted {
            code: revert_code(&decoded),
        }
        .into();
    }

    let message = err.to_string();
    if let Some(code) = RevertCode::find_in(&message) {
        return ContractError::Reverted { code }.into();
    }
    if message.contains("revert") {
        return ContractError::RevertedWithReason { reason: message }.into();
    }
    match err {
        alloy::contract::Error::TransportError(_) => FlashdagError::Network(message),
        _ => ContractError::Call(message).into(),
    }
}

fn to_u64(value: U256, field: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| ContractError::Decode(format!("{} out of range: {}", field, value)).into())
}

fn to_u32(value: U256, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ContractError::Decode(format!("{} out of range: {}", field, value)).into())
}

/// Lending and token contracts over JSON-RPC
#[derive(Clone)]
pub struct EvmGateway {
    provider: DynProvider,
    platform: Address,
    token: Address,
    signer: Option<Address>,
}

impl EvmGateway {
    /// Connect to the configured endpoint, with a signer when a key is set
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let url = config
            .rpc_url
            .parse::<Url>()
            .map_err(|e| FlashdagError::Config(format!("invalid rpc_url {}: {}", config.rpc_url, e)))?;

        let (provider, signer) = match config.private_key.as_deref() {
            Some(key) => {
                let signer = key
                    .trim()
                    .parse::<PrivateKeySigner>()
                    .map_err(|e| FlashdagError::Config(format!("invalid private_key: {}", e)))?;
                let account = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::new(signer))
                    .connect_http(url)
                    .erased();
                (provider, Some(account))
            }
            None => (ProviderBuilder::new().connect_http(url).erased(), None),
        };

        Ok(Self {
            provider,
            platform: config.platform_address,
            token: config.token_address,
            signer,
        })
    }

    /// Account of the local signer, if any
    pub fn signer(&self) -> Option<Address> {
        self.signer
    }

    /// Fail unless the node serves `expected`
    pub async fn verify_chain(&self, expected: u64) -> Result<()> {
        let actual = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| FlashdagError::Network(e.to_string()))?;
        if actual != expected {
            return Err(FlashdagError::Config(format!(
                "chain id mismatch: configured {}, node reports {}",
                expected, actual
            )));
        }
        Ok(())
    }

    fn lending(&self) -> IMicroLendingPlatformInstance<DynProvider> {
        IMicroLendingPlatform::new(self.platform, self.provider.clone())
    }

    fn erc20(&self) -> IERC20Instance<DynProvider> {
        IERC20::new(self.token, self.provider.clone())
    }

    fn ensure_signer(&self, from: Address) -> Result<()> {
        match self.signer {
            Some(account) if account == from => Ok(()),
            _ => Err(FlashdagError::WalletNotConnected),
        }
    }
}

#[async_trait]
impl LendingContract for EvmGateway {
    fn address(&self) -> Address {
        self.platform
    }

    async fn loan_counter(&self) -> Result<u64> {
        let count = self.lending().loanCounter().call().await.map_err(call_error)?;
        to_u64(count, "loanCounter")
    }

    #[instrument(skip(self))]
    async fn loan(&self, id: LoanId) -> Result<Option<Loan>> {
        let raw = self
            .lending()
            .loans(U256::from(id))
            .call()
            .await
            .map_err(call_error)?;

        if raw.borrower == Address::ZERO {
            debug!("No loan record");
            return Ok(None);
        }

        Ok(Some(Loan {
            id,
            borrower: raw.borrower,
            lender: raw.lender,
            amount: raw.amount,
            interest_rate_bps: to_u32(raw.interestRate, "interestRate")?,
            duration_secs: to_u64(raw.duration, "duration")?,
            start_time: to_u64(raw.startTime, "startTime")?,
            collateral_amount: raw.collateralAmount,
            status: LoanStatus::try_from(raw.status)?,
            repaid_amount: raw.repaidAmount,
            is_partially_repaid: raw.isPartiallyRepaid,
            purpose: raw.purpose,
        }))
    }

    async fn total_repayment(&self, id: LoanId) -> Result<U256> {
        self.lending()
            .calculateTotalRepayment(U256::from(id))
            .call()
            .await
            .map_err(call_error)
    }

    async fn platform_stats(&self) -> Result<PlatformStats> {
        let lending = self.lending();
        let raw = lending.getPlatformStats().call().await.map_err(call_error)?;
        let treasury = lending.treasury().call().await.map_err(call_error)?;
        let max_utilization = lending.maxUtilizationRate().call().await.map_err(call_error)?;

        Ok(PlatformStats {
            total_loans: to_u64(raw.totalLoans, "totalLoans")?,
            total_borrowed: raw.totalBorrowedAmount,
            total_collateral_locked: raw.totalCollateralLocked,
            utilization_rate_bps: to_u32(raw.utilizationRate, "utilizationRate")?,
            max_utilization_rate_bps: to_u32(max_utilization, "maxUtilizationRate")?,
            treasury,
            emergency: raw.emergencyStatus,
        })
    }

    async fn lender_info(&self, who: Address) -> Result<LenderInfo> {
        let raw = self.lending().lenders(who).call().await.map_err(call_error)?;
        Ok(LenderInfo {
            total_lent: raw.totalLent,
            active_lends: to_u64(raw.activeLends, "activeLends")?,
            total_earned: raw.totalEarned,
            is_verified: raw.isVerified,
            reputation_score: to_u64(raw.reputationScore, "reputationScore")?,
        })
    }

    async fn borrower_info(&self, who: Address) -> Result<BorrowerInfo> {
        let raw = self.lending().borrowers(who).call().await.map_err(call_error)?;
        Ok(BorrowerInfo {
            total_borrowed: raw.totalBorrowed,
            active_loans: to_u64(raw.activeLoans, "activeLoans")?,
            successful_loans: to_u64(raw.successfulLoans, "successfulLoans")?,
            defaulted_loans: to_u64(raw.defaultedLoans, "defaultedLoans")?,
            is_verified: raw.isVerified,
            credit_score: to_u64(raw.creditScore, "creditScore")?,
        })
    }

    async fn user_loans(&self, who: Address) -> Result<Vec<LoanId>> {
        let ids = self.lending().getUserLoans(who).call().await.map_err(call_error)?;
        ids.into_iter().map(|id| to_u64(id, "loanId")).collect()
    }

    async fn user_lends(&self, who: Address) -> Result<Vec<LoanId>> {
        let ids = self.lending().getUserLends(who).call().await.map_err(call_error)?;
        ids.into_iter().map(|id| to_u64(id, "loanId")).collect()
    }

    async fn is_blacklisted(&self, who: Address) -> Result<bool> {
        self.lending().blacklisted(who).call().await.map_err(call_error)
    }

    #[instrument(skip(self, request), fields(amount = %request.amount))]
    async fn request_loan(&self, from: Address, request: LoanRequest) -> Result<TxHash> {
        self.ensure_signer(from)?;
        let params = IMicroLendingPlatform::LoanRequest {
            amount: request.amount,
            interestRate: U256::from(request.interest_rate_bps),
            duration: U256::from(request.duration_secs),
            collateralAmount: request.collateral_amount,
            purpose: request.purpose,
        };
        let pending = self
            .lending()
            .requestLoan(params)
            .from(from)
            .send()
            .await
            .map_err(call_error)?;
        Ok(*pending.tx_hash())
    }

    #[instrument(skip(self))]
    async fn fund_loan(&self, from: Address, id: LoanId) -> Result<TxHash> {
        self.ensure_signer(from)?;
        let pending = self
            .lending()
            .fundLoan(U256::from(id))
            .from(from)
            .send()
            .await
            .map_err(call_error)?;
        Ok(*pending.tx_hash())
    }

    #[instrument(skip(self))]
    async fn repay_loan(&self, from: Address, id: LoanId, amount: U256) -> Result<TxHash> {
        self.ensure_signer(from)?;
        let pending = self
            .lending()
            .repayLoan(U256::from(id), amount)
            .from(from)
            .send()
            .await
            .map_err(call_error)?;
        Ok(*pending.tx_hash())
    }

    #[instrument(skip(self))]
    async fn cancel_loan(&self, from: Address, id: LoanId) -> Result<TxHash> {
        self.ensure_signer(from)?;
        let pending = self
            .lending()
            .cancelLoan(U256::from(id))
            .from(from)
            .send()
            .await
            .map_err(call_error)?;
        Ok(*pending.tx_hash())
    }

    #[instrument(skip(self))]
    async fn default_loan(&self, from: Address, id: LoanId) -> Result<TxHash> {
        self.ensure_signer(from)?;
        let pending = self
            .lending()
            .defaultLoan(U256::from(id))
            .from(from)
            .send()
            .await
            .map_err(call_error)?;
        Ok(*pending.tx_hash())
    }

    #[instrument(skip(self))]
    async fn liquidate_loan(&self, from: Address, id: LoanId) -> Result<TxHash> {
        self.ensure_signer(from)?;
        let pending = self
            .lending()
            .liquidateLoan(U256::from(id))
            .from(from)
            .send()
            .await
            .map_err(call_error)?;
        Ok(*pending.tx_hash())
    }
}

#[async_trait]
impl TokenContract for EvmGateway {
    /// Token metadata; unreadable fields fall back to the platform token defaults
    async fn metadata(&self) -> Result<TokenMetadata> {
        let erc20 = self.erc20();
        let defaults = TokenMetadata::default();

        let name = erc20.name().call().await;
        let symbol = erc20.symbol().call().await;
        let decimals = erc20.decimals().call().await;
        let total_supply = erc20.totalSupply().call().await;

        let fallback = |field: &str, err: alloy::contract::Error| {
            warn!(field, error = %err, "Token metadata read failed; using default");
        };

        Ok(TokenMetadata {
            name: name.unwrap_or_else(|e| {
                fallback("name", e);
                defaults.name.clone()
            }),
            symbol: symbol.unwrap_or_else(|e| {
                fallback("symbol", e);
                defaults.symbol.clone()
            }),
            decimals: decimals.unwrap_or_else(|e| {
                fallback("decimals", e);
                defaults.decimals
            }),
            total_supply: total_supply.unwrap_or_else(|e| {
                fallback("totalSupply", e);
                defaults.total_supply
            }),
        })
    }

    async fn balance_of(&self, who: Address) -> Result<U256> {
        self.erc20().balanceOf(who).call().await.map_err(call_error)
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        self.erc20()
            .allowance(owner, spender)
            .call()
            .await
            .map_err(call_error)
    }

    #[instrument(skip(self))]
    async fn approve(&self, from: Address, spender: Address, amount: U256) -> Result<TxHash> {
        self.ensure_signer(from)?;
        let pending = self
            .erc20()
            .approve(spender, amount)
            .from(from)
            .send()
            .await
            .map_err(call_error)?;
        Ok(*pending.tx_hash())
    }

    #[instrument(skip(self))]
    async fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<TxHash> {
        self.ensure_signer(from)?;
        let pending = self
            .erc20()
            .transfer(to, amount)
            .from(from)
            .send()
            .await
            .map_err(call_error)?;
        Ok(*pending.tx_hash())
    }
}

#[async_trait]
impl ReceiptSource for EvmGateway {
    async fn confirmation(&self, hash: TxHash) -> Result<Confirmation> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| FlashdagError::Network(e.to_string()))?;

        Ok(match receipt {
            None => Confirmation::Pending,
            Some(receipt) if receipt.status() => Confirmation::Confirmed,
            Some(receipt) => Confirmation::Failed(format!(
                "Transaction reverted in block {}",
                receipt
                    .block_number()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            )),
        })
    }
}
