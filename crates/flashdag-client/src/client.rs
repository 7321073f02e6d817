//! Lending client facade
//!
//! Every write follows the same order: wallet check, local validation,
//! eligibility and balance checks, token approval when the allowance is short,
//! then the action itself. Each step that fails stops the flow before anything
//! further is sent.

use std::sync::Arc;

use chrono::Utc;
use flashdag_common::{
    units, Address, FlashdagError, LenderInfo, Loan, LoanId, LoanStatus, PlatformLimits,
    PlatformStats, Result, RevertCode, TokenMetadata, TxHash, U256,
};
use flashdag_economics::{
    marketplace::available_loans, validate_loan_request, AvailableLoan, BorrowerStatus,
    CollateralSummary, LenderPortfolio, LoanForm, LoanView, MarketFilter, RepaymentPreview,
};
use futures::future::try_join_all;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::contract::{LendingContract, ReceiptSource, TokenContract};
use crate::tx::{PollConfig, TxAction, TxTracker};
use crate::wallet::WalletSession;

/// Facade over the lending and token contracts for one wallet session
pub struct LendingClient {
    lending: Arc<dyn LendingContract>,
    token: Arc<dyn TokenContract>,
    receipts: Arc<dyn ReceiptSource>,
    wallet: WalletSession,
    tracker: TxTracker,
    limits: PlatformLimits,
    poll: PollConfig,
    metadata: RwLock<Option<TokenMetadata>>,
}

impl LendingClient {
    pub fn new(
        lending: Arc<dyn LendingContract>,
        token: Arc<dyn TokenContract>,
        receipts: Arc<dyn ReceiptSource>,
        wallet: WalletSession,
        limits: PlatformLimits,
        poll: PollConfig,
    ) -> Self {
        Self {
            lending,
            token,
            receipts,
            wallet,
            tracker: TxTracker::new(),
            limits,
            poll,
            metadata: RwLock::new(None),
        }
    }

    pub fn wallet(&self) -> &WalletSession {
        &self.wallet
    }

    pub fn tracker(&self) -> &TxTracker {
        &self.tracker
    }

    pub fn limits(&self) -> &PlatformLimits {
        &self.limits
    }

    // ============ Reads ============

    /// Token metadata, read once per client
    pub async fn token_metadata(&self) -> Result<TokenMetadata> {
        if let Some(metadata) = self.metadata.read().clone() {
            return Ok(metadata);
        }
        let metadata = self.token.metadata().await?;
        debug!(symbol = %metadata.symbol, decimals = metadata.decimals, "Token metadata loaded");
        *self.metadata.write() = Some(metadata.clone());
        Ok(metadata)
    }

    async fn decimals(&self) -> Result<u8> {
        Ok(self.token_metadata().await?.decimals)
    }

    async fn to_display(&self, amount: U256) -> Result<Decimal> {
        Ok(units::from_base_units(amount, self.decimals().await?)?)
    }

    pub async fn platform_stats(&self) -> Result<PlatformStats> {
        self.lending.platform_stats().await
    }

    /// Token balance of the connected wallet
    pub async fn balance(&self) -> Result<Decimal> {
        let account = self.wallet.require()?;
        let raw = self.token.balance_of(account).await?;
        self.to_display(raw).await
    }

    pub async fn borrower_status(&self) -> Result<BorrowerStatus> {
        let account = self.wallet.require()?;
        let (info, blacklisted) = futures::try_join!(
            self.lending.borrower_info(account),
            self.lending.is_blacklisted(account),
        )?;
        Ok(BorrowerStatus::new(info, blacklisted, &self.limits))
    }

    pub async fn lender_info(&self) -> Result<LenderInfo> {
        let account = self.wallet.require()?;
        self.lending.lender_info(account).await
    }

    async fn load(&self, id: LoanId) -> Result<Loan> {
        self.lending
            .loan(id)
            .await?
            .ok_or(FlashdagError::LoanNotFound(id))
    }

    async fn view(&self, loan: &Loan, decimals: u8) -> Result<LoanView> {
        let view = LoanView::from_loan(loan, Utc::now(), &self.limits, decimals)?;
        if loan.status != LoanStatus::Funded {
            return Ok(view);
        }
        let total = self.lending.total_repayment(loan.id).await?;
        Ok(view.with_contract_total(total, decimals)?)
    }

    async fn views(&self, ids: &[LoanId]) -> Result<Vec<LoanView>> {
        let decimals = self.decimals().await?;
        let loans = try_join_all(ids.iter().map(|id| self.load(*id))).await?;
        try_join_all(loans.iter().map(|loan| self.view(loan, decimals))).await
    }

    pub async fn loan_view(&self, id: LoanId) -> Result<LoanView> {
        let decimals = self.decimals().await?;
        let loan = self.load(id).await?;
        self.view(&loan, decimals).await
    }

    /// Loans requested by the connected wallet
    pub async fn my_loans(&self) -> Result<Vec<LoanView>> {
        let account = self.wallet.require()?;
        let ids = self.lending.user_loans(account).await?;
        self.views(&ids).await
    }

    /// Loans funded by the connected wallet
    pub async fn my_lends(&self) -> Result<Vec<LoanView>> {
        let account = self.wallet.require()?;
        let ids = self.lending.user_lends(account).await?;
        self.views(&ids).await
    }

    /// Open loan requests, filtered and sorted
    #[instrument(skip(self))]
    pub async fn marketplace(&self, filter: &MarketFilter) -> Result<Vec<AvailableLoan>> {
        let decimals = self.decimals().await?;
        let count = self.lending.loan_counter().await?;
        let loans: Vec<Loan> = try_join_all((1..=count).map(|id| self.lending.loan(id)))
            .await?
            .into_iter()
            .flatten()
            .collect();

        let listing = available_loans(&loans, decimals)?;
        debug!(open = listing.len(), total = count, "Marketplace loaded");
        Ok(filter.apply(&listing))
    }

    pub async fn collateral_summary(&self) -> Result<CollateralSummary> {
        Ok(CollateralSummary::from_views(&self.my_loans().await?))
    }

    pub async fn lender_portfolio(&self) -> Result<LenderPortfolio> {
        Ok(LenderPortfolio::from_views(&self.my_lends().await?))
    }

    /// Effect of repaying `amount` on a loan; `None` previews full repayment
    pub async fn repayment_preview(
        &self,
        id: LoanId,
        amount: Option<Decimal>,
    ) -> Result<RepaymentPreview> {
        let view = self.loan_view(id).await?;
        let remaining = view.remaining_debt.unwrap_or(Decimal::ZERO);
        RepaymentPreview::new(remaining, amount.unwrap_or(remaining))
            .map_err(|e| FlashdagError::Validation(vec![e]))
    }

    // ============ Writes ============

    async fn ensure_balance(&self, account: Address, required: U256) -> Result<()> {
        let available = self.token.balance_of(account).await?;
        if available >= required {
            return Ok(());
        }
        let decimals = self.decimals().await?;
        Err(FlashdagError::InsufficientBalance {
            required: units::from_base_units(required, decimals)?,
            available: units::from_base_units(available, decimals)?,
        })
    }

    /// Approve the platform for `required` when the current allowance is short
    async fn ensure_allowance(&self, account: Address, required: U256) -> Result<()> {
        let spender = self.lending.address();
        let allowance = self.token.allowance(account, spender).await?;
        if allowance >= required {
            debug!(%allowance, "Allowance sufficient");
            return Ok(());
        }

        info!(%allowance, %required, "Approving platform spend");
        self.tracker
            .execute(TxAction::Approve, self.receipts.as_ref(), self.poll, || {
                self.token.approve(account, spender, required)
            })
            .await?;
        Ok(())
    }

    fn expect_status(loan: &Loan, expected: LoanStatus) -> Result<()> {
        if loan.status != expected {
            return Err(FlashdagError::UnexpectedStatus {
                loan_id: loan.id,
                expected,
                actual: loan.status,
            });
        }
        Ok(())
    }

    /// Validate a borrow form and request the loan
    #[instrument(skip(self, form))]
    pub async fn request_loan(&self, form: &LoanForm) -> Result<TxHash> {
        let account = self.wallet.require()?;

        let errors = validate_loan_request(form, &self.limits);
        if !errors.is_empty() {
            return Err(FlashdagError::Validation(errors));
        }

        let decimals = self.decimals().await?;
        let request = form.to_request(&self.limits, decimals)?;

        let status = self.borrower_status().await?;
        if let Some(reason) = status.ineligibility() {
            return Err(FlashdagError::NotEligible(reason.to_string()));
        }

        self.ensure_balance(account, request.collateral_amount).await?;
        self.ensure_allowance(account, request.collateral_amount).await?;

        let hash = self
            .tracker
            .execute(TxAction::RequestLoan, self.receipts.as_ref(), self.poll, || {
                self.lending.request_loan(account, request)
            })
            .await?;
        info!(%hash, "Loan requested");
        Ok(hash)
    }

    #[instrument(skip(self))]
    pub async fn fund_loan(&self, id: LoanId) -> Result<TxHash> {
        let account = self.wallet.require()?;
        let loan = self.load(id).await?;
        Self::expect_status(&loan, LoanStatus::Requested)?;
        if loan.is_borrower(account) {
            return Err(FlashdagError::NotEligible(
                "Cannot fund your own loan".to_string(),
            ));
        }

        self.ensure_balance(account, loan.amount).await?;
        self.ensure_allowance(account, loan.amount).await?;

        self.tracker
            .execute(TxAction::FundLoan(id), self.receipts.as_ref(), self.poll, || {
                self.lending.fund_loan(account, id)
            })
            .await
    }

    /// Repay part of a loan, or all of it when `amount` is `None`
    #[instrument(skip(self))]
    pub async fn repay_loan(&self, id: LoanId, amount: Option<Decimal>) -> Result<TxHash> {
        let account = self.wallet.require()?;
        let loan = self.load(id).await?;
        Self::expect_status(&loan, LoanStatus::Funded)?;
        if !loan.is_borrower(account) {
            return Err(FlashdagError::NotEligible(
                RevertCode::NotBorrower.user_message().to_string(),
            ));
        }

        let decimals = self.decimals().await?;
        let total = self.lending.total_repayment(id).await?;
        let remaining_wei = total.saturating_sub(loan.repaid_amount);
        let remaining = units::from_base_units(remaining_wei, decimals)?;

        let preview = RepaymentPreview::new(remaining, amount.unwrap_or(remaining))
            .map_err(|e| FlashdagError::Validation(vec![e]))?;
        let contract_amount = preview.contract_amount(decimals)?;
        let required = if preview.is_full_repayment {
            remaining_wei
        } else {
            contract_amount
        };

        self.ensure_balance(account, required).await?;
        self.ensure_allowance(account, required).await?;

        self.tracker
            .execute(TxAction::RepayLoan(id), self.receipts.as_ref(), self.poll, || {
                self.lending.repay_loan(account, id, contract_amount)
            })
            .await
    }

    /// Withdraw an unfunded request and release its collateral
    #[instrument(skip(self))]
    pub async fn cancel_loan(&self, id: LoanId) -> Result<TxHash> {
        let account = self.wallet.require()?;
        let loan = self.load(id).await?;
        Self::expect_status(&loan, LoanStatus::Requested)?;
        if !loan.is_borrower(account) {
            return Err(FlashdagError::NotEligible(
                RevertCode::NotBorrower.user_message().to_string(),
            ));
        }

        self.tracker
            .execute(TxAction::CancelLoan(id), self.receipts.as_ref(), self.poll, || {
                self.lending.cancel_loan(account, id)
            })
            .await
    }

    /// Mark an overdue loan as defaulted; the contract decides whether it is
    #[instrument(skip(self))]
    pub async fn default_loan(&self, id: LoanId) -> Result<TxHash> {
        let account = self.wallet.require()?;
        let loan = self.load(id).await?;
        Self::expect_status(&loan, LoanStatus::Funded)?;

        self.tracker
            .execute(TxAction::DefaultLoan(id), self.receipts.as_ref(), self.poll, || {
                self.lending.default_loan(account, id)
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn liquidate_loan(&self, id: LoanId) -> Result<TxHash> {
        let account = self.wallet.require()?;
        let loan = self.load(id).await?;
        Self::expect_status(&loan, LoanStatus::Funded)?;
        if !loan.is_lender(account) {
            return Err(FlashdagError::NotEligible(
                RevertCode::NotLender.user_message().to_string(),
            ));
        }

        self.tracker
            .execute(TxAction::LiquidateLoan(id), self.receipts.as_ref(), self.poll, || {
                self.lending.liquidate_loan(account, id)
            })
            .await
    }

    /// Approve the platform to spend `amount` tokens
    pub async fn approve(&self, amount: Decimal) -> Result<TxHash> {
        let account = self.wallet.require()?;
        let amount = units::to_base_units(amount, self.decimals().await?)?;
        let spender = self.lending.address();

        self.tracker
            .execute(TxAction::Approve, self.receipts.as_ref(), self.poll, || {
                self.token.approve(account, spender, amount)
            })
            .await
    }

    pub async fn transfer(&self, to: Address, amount: Decimal) -> Result<TxHash> {
        let account = self.wallet.require()?;
        let amount = units::to_base_units(amount, self.decimals().await?)?;
        self.ensure_balance(account, amount).await?;

        self.tracker
            .execute(TxAction::Transfer, self.receipts.as_ref(), self.poll, || {
                self.token.transfer(account, to, amount)
            })
            .await
    }
}
