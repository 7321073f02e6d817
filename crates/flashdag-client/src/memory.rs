//! In-memory contract double
//!
//! Scripted stand-in for the lending and token contracts, used by tests and
//! local demos. It enforces enough of the contract rules to drive the client
//! end to end, but it is not a reference implementation and its figures are
//! never authoritative.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use flashdag_common::{
    Address, BorrowerInfo, ContractError, FlashdagError, LenderInfo, Loan, LoanId, LoanRequest,
    LoanStatus, PlatformLimits, PlatformStats, Result, RevertCode, TokenMetadata, TxHash, U256,
    BPS_DENOMINATOR, DAYS_PER_YEAR, SECONDS_PER_DAY,
};
use flashdag_economics::collateral::min_collateral;
use parking_lot::Mutex;
use tracing::debug;

use crate::contract::{Confirmation, LendingContract, ReceiptSource, TokenContract};

/// How the double settles the transactions it accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmMode {
    /// Confirmed on the first poll
    Immediate,
    /// Pending for this many polls, then confirmed
    After(u32),
    /// Pending forever
    Never,
    /// Mined and reverted; state is left unchanged
    Revert(String),
}

#[derive(Debug, Clone)]
struct Receipt {
    pending_polls: u32,
    outcome: Confirmation,
}

fn revert(code: RevertCode) -> FlashdagError {
    ContractError::Reverted { code }.into()
}

fn revert_reason(reason: &str) -> FlashdagError {
    ContractError::RevertedWithReason {
        reason: reason.to_string(),
    }
    .into()
}

/// Lending platform and token contract held in memory
pub struct InMemoryContracts {
    platform: Address,
    token: TokenMetadata,
    limits: PlatformLimits,
    now: AtomicU64,
    nonce: AtomicU64,
    loan_counter: AtomicU64,

    loans: DashMap<LoanId, Loan>,
    balances: DashMap<Address, U256>,
    allowances: DashMap<(Address, Address), U256>,
    borrowers: DashMap<Address, BorrowerInfo>,
    lenders: DashMap<Address, LenderInfo>,
    blacklist: DashSet<Address>,
    receipts: DashMap<TxHash, Receipt>,

    confirm_mode: Mutex<ConfirmMode>,
    scripted_failures: Mutex<VecDeque<FlashdagError>>,
    calls: DashMap<&'static str, usize>,
}

impl Default for InMemoryContracts {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryContracts {
    /// Start time reported for freshly funded loans
    pub const GENESIS_TIME: u64 = 1_700_000_000;

    /// Utilization cap reported in platform stats
    pub const MAX_UTILIZATION_RATE_BPS: u32 = 8_000;

    /// Fee recipient reported in platform stats
    pub fn treasury() -> Address {
        Address::repeat_byte(0x7e)
    }

    pub fn new() -> Self {
        Self {
            platform: Address::repeat_byte(0xf1),
            token: TokenMetadata {
                total_supply: U256::from(1_000_000_000u64) * U256::from(10u64).pow(U256::from(18u64)),
                ..TokenMetadata::default()
            },
            limits: PlatformLimits::default(),
            now: AtomicU64::new(Self::GENESIS_TIME),
            nonce: AtomicU64::new(0),
            loan_counter: AtomicU64::new(0),
            loans: DashMap::new(),
            balances: DashMap::new(),
            allowances: DashMap::new(),
            borrowers: DashMap::new(),
            lenders: DashMap::new(),
            blacklist: DashSet::new(),
            receipts: DashMap::new(),
            confirm_mode: Mutex::new(ConfirmMode::Immediate),
            scripted_failures: Mutex::new(VecDeque::new()),
            calls: DashMap::new(),
        }
    }

    // ============ Scripting ============

    pub fn mint(&self, to: Address, amount: U256) {
        self.credit(to, amount);
    }

    pub fn blacklist(&self, who: Address) {
        self.blacklist.insert(who);
    }

    pub fn set_confirm_mode(&self, mode: ConfirmMode) {
        *self.confirm_mode.lock() = mode;
    }

    /// Fail the next write submission with `err`
    pub fn fail_next_submission(&self, err: FlashdagError) {
        self.scripted_failures.lock().push_back(err);
    }

    pub fn advance_time(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    /// Insert a loan record directly
    pub fn insert_loan(&self, loan: Loan) {
        self.loan_counter.fetch_max(loan.id, Ordering::SeqCst);
        self.loans.insert(loan.id, loan);
    }

    /// Number of times `method` was called
    pub fn calls(&self, method: &str) -> usize {
        self.calls.get(method).map(|c| *c).unwrap_or(0)
    }

    /// Number of write submissions accepted or refused
    pub fn submissions(&self) -> usize {
        [
            "request_loan",
            "fund_loan",
            "repay_loan",
            "cancel_loan",
            "default_loan",
            "liquidate_loan",
            "approve",
            "transfer",
        ]
        .iter()
        .map(|m| self.calls(m))
        .sum()
    }

    pub fn balance(&self, who: Address) -> U256 {
        self.balances.get(&who).map(|b| *b).unwrap_or_default()
    }

    // ============ Internals ============

    fn record(&self, method: &'static str) {
        *self.calls.entry(method).or_insert(0) += 1;
    }

    fn credit(&self, who: Address, amount: U256) {
        let mut balance = self.balances.entry(who).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn allowance_of(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .map(|a| *a)
            .unwrap_or_default()
    }

    /// Move `amount` between two accounts, checking funds first
    fn move_funds(&self, from: Address, to: Address, amount: U256) -> Result<()> {
        if self.balance(from) < amount {
            return Err(revert_reason("ERC20: transfer amount exceeds balance"));
        }
        if let Some(mut balance) = self.balances.get_mut(&from) {
            *balance -= amount;
        }
        self.credit(to, amount);
        Ok(())
    }

    /// Pull `amount` from `owner` into the platform using its allowance
    fn pull(&self, owner: Address, amount: U256) -> Result<()> {
        let allowance = self.allowance_of(owner, self.platform);
        if allowance < amount {
            return Err(revert_reason("ERC20: insufficient allowance"));
        }
        self.move_funds(owner, self.platform, amount)?;
        self.allowances.insert((owner, self.platform), allowance - amount);
        Ok(())
    }

    fn contract_total(&self, loan: &Loan) -> U256 {
        let denominator =
            U256::from(BPS_DENOMINATOR) * U256::from(DAYS_PER_YEAR) * U256::from(SECONDS_PER_DAY);
        let interest = loan.amount * U256::from(loan.interest_rate_bps)
            * U256::from(loan.duration_secs)
            / denominator;
        loan.amount + interest
    }

    fn load(&self, id: LoanId) -> Result<Loan> {
        self.loans
            .get(&id)
            .map(|l| l.clone())
            .ok_or_else(|| revert(RevertCode::LoanNotFound))
    }

    /// Run a write: scripted failures first, then the state change, then a receipt
    fn submit<F>(&self, method: &'static str, apply: F) -> Result<TxHash>
    where
        F: FnOnce() -> Result<()>,
    {
        self.record(method);
        if let Some(err) = self.scripted_failures.lock().pop_front() {
            return Err(err);
        }

        let mode = self.confirm_mode.lock().clone();
        if !matches!(mode, ConfirmMode::Revert(_)) {
            apply()?;
        }

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        let hash = TxHash::left_padding_from(&nonce.to_be_bytes());
        let receipt = match mode {
            ConfirmMode::Immediate => Receipt {
                pending_polls: 0,
                outcome: Confirmation::Confirmed,
            },
            ConfirmMode::After(polls) => Receipt {
                pending_polls: polls,
                outcome: Confirmation::Confirmed,
            },
            ConfirmMode::Never => Receipt {
                pending_polls: u32::MAX,
                outcome: Confirmation::Confirmed,
            },
            ConfirmMode::Revert(reason) => Receipt {
                pending_polls: 0,
                outcome: Confirmation::Failed(reason),
            },
        };
        self.receipts.insert(hash, receipt);

        debug!(method, %hash, "Submission accepted");
        Ok(hash)
    }

    fn apply_request(&self, from: Address, request: &LoanRequest) -> Result<()> {
        let limits = &self.limits;
        if self.blacklist.contains(&from) {
            return Err(revert(RevertCode::UserBlacklisted));
        }
        let active = self.borrowers.get(&from).map(|b| b.active_loans).unwrap_or(0);
        if active >= u64::from(limits.max_loans_per_user) {
            return Err(revert(RevertCode::MaxLoansExceeded));
        }
        if request.amount.is_zero() {
            return Err(revert(RevertCode::InvalidAmount));
        }
        if request.interest_rate_bps > limits.max_interest_rate_bps {
            return Err(revert(RevertCode::InvalidInterestRate));
        }
        let min_secs = u64::from(limits.min_duration_days) * SECONDS_PER_DAY;
        let max_secs = u64::from(limits.max_duration_days) * SECONDS_PER_DAY;
        if !(min_secs..=max_secs).contains(&request.duration_secs) {
            return Err(revert(RevertCode::InvalidDuration));
        }
        if request.collateral_amount
            < min_collateral(request.amount, limits.min_collateral_ratio_bps)
        {
            return Err(revert(RevertCode::InvalidCollateralAmount));
        }

        self.pull(from, request.collateral_amount)?;

        let id = self.loan_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.loans.insert(
            id,
            Loan {
                id,
                borrower: from,
                lender: Address::ZERO,
                amount: request.amount,
                interest_rate_bps: request.interest_rate_bps,
                duration_secs: request.duration_secs,
                start_time: 0,
                collateral_amount: request.collateral_amount,
                status: LoanStatus::Requested,
                repaid_amount: U256::ZERO,
                is_partially_repaid: false,
                purpose: request.purpose.clone(),
            },
        );

        let mut borrower = self.borrowers.entry(from).or_default();
        borrower.active_loans += 1;
        Ok(())
    }

    fn apply_fund(&self, from: Address, id: LoanId) -> Result<()> {
        let loan = self.load(id)?;
        if loan.status != LoanStatus::Requested {
            return Err(revert(RevertCode::LoanNotActive));
        }
        if loan.borrower == from {
            return Err(revert_reason("Cannot fund own loan"));
        }

        self.pull(from, loan.amount)?;
        self.move_funds(self.platform, loan.borrower, loan.amount)?;

        if let Some(mut record) = self.loans.get_mut(&id) {
            record.lender = from;
            record.start_time = self.now();
            record.status = LoanStatus::Funded;
        }

        {
            let mut borrower = self.borrowers.entry(loan.borrower).or_default();
            borrower.total_borrowed += loan.amount;
        }
        let mut lender = self.lenders.entry(from).or_default();
        lender.total_lent += loan.amount;
        lender.active_lends += 1;
        Ok(())
    }

    fn apply_repay(&self, from: Address, id: LoanId, amount: U256) -> Result<()> {
        let loan = self.load(id)?;
        if loan.status != LoanStatus::Funded {
            return Err(revert(RevertCode::LoanNotActive));
        }
        if loan.borrower != from {
            return Err(revert(RevertCode::NotBorrower));
        }

        let total = self.contract_total(&loan);
        let remaining = total.saturating_sub(loan.repaid_amount);
        let payment = if amount.is_zero() { remaining } else { amount };
        if payment > remaining {
            return Err(revert(RevertCode::InvalidAmount));
        }

        self.pull(from, payment)?;
        self.move_funds(self.platform, loan.lender, payment)?;

        let repaid = loan.repaid_amount + payment;
        let settled = repaid >= total;
        if let Some(mut record) = self.loans.get_mut(&id) {
            record.repaid_amount = repaid;
            record.is_partially_repaid = !settled;
            if settled {
                record.status = LoanStatus::Repaid;
            }
        }

        if settled {
            self.move_funds(self.platform, from, loan.collateral_amount)?;
            {
                let mut borrower = self.borrowers.entry(from).or_default();
                borrower.active_loans = borrower.active_loans.saturating_sub(1);
                borrower.successful_loans += 1;
            }
            let mut lender = self.lenders.entry(loan.lender).or_default();
            lender.active_lends = lender.active_lends.saturating_sub(1);
            lender.total_earned += total - loan.amount;
        }
        Ok(())
    }

    fn apply_cancel(&self, from: Address, id: LoanId) -> Result<()> {
        let loan = self.load(id)?;
        if loan.borrower != from {
            return Err(revert(RevertCode::NotBorrower));
        }
        if loan.status != LoanStatus::Requested {
            return Err(revert(RevertCode::LoanNotActive));
        }

        self.move_funds(self.platform, from, loan.collateral_amount)?;
        if let Some(mut record) = self.loans.get_mut(&id) {
            record.status = LoanStatus::Cancelled;
        }
        let mut borrower = self.borrowers.entry(from).or_default();
        borrower.active_loans = borrower.active_loans.saturating_sub(1);
        Ok(())
    }

    fn close_to_lender(&self, loan: &Loan, status: LoanStatus) -> Result<()> {
        self.move_funds(self.platform, loan.lender, loan.collateral_amount)?;
        if let Some(mut record) = self.loans.get_mut(&loan.id) {
            record.status = status;
        }
        {
            let mut borrower = self.borrowers.entry(loan.borrower).or_default();
            borrower.active_loans = borrower.active_loans.saturating_sub(1);
            if status == LoanStatus::Defaulted {
                borrower.defaulted_loans += 1;
            }
        }
        let mut lender = self.lenders.entry(loan.lender).or_default();
        lender.active_lends = lender.active_lends.saturating_sub(1);
        Ok(())
    }

    fn apply_default(&self, id: LoanId) -> Result<()> {
        let loan = self.load(id)?;
        if loan.status != LoanStatus::Funded {
            return Err(revert(RevertCode::LoanNotActive));
        }
        let deadline = loan
            .due_at()
            .map(|due| due.saturating_add(self.limits.grace_period_secs))
            .unwrap_or(u64::MAX);
        if self.now() <= deadline {
            return Err(revert_reason("Loan not overdue"));
        }
        self.close_to_lender(&loan, LoanStatus::Defaulted)
    }

    fn apply_liquidate(&self, from: Address, id: LoanId) -> Result<()> {
        let loan = self.load(id)?;
        if loan.status != LoanStatus::Funded {
            return Err(revert(RevertCode::LoanNotActive));
        }
        if loan.lender != from {
            return Err(revert(RevertCode::NotLender));
        }
        self.close_to_lender(&loan, LoanStatus::Liquidated)
    }
}

#[async_trait]
impl LendingContract for InMemoryContracts {
    fn address(&self) -> Address {
        self.platform
    }

    async fn loan_counter(&self) -> Result<u64> {
        self.record("loan_counter");
        Ok(self.loan_counter.load(Ordering::SeqCst))
    }

    async fn loan(&self, id: LoanId) -> Result<Option<Loan>> {
        self.record("loan");
        Ok(self.loans.get(&id).map(|l| l.clone()))
    }

    async fn total_repayment(&self, id: LoanId) -> Result<U256> {
        self.record("total_repayment");
        let loan = self.load(id)?;
        Ok(self.contract_total(&loan))
    }

    async fn platform_stats(&self) -> Result<PlatformStats> {
        self.record("platform_stats");
        let mut stats = PlatformStats {
            total_loans: self.loan_counter.load(Ordering::SeqCst),
            max_utilization_rate_bps: Self::MAX_UTILIZATION_RATE_BPS,
            treasury: Self::treasury(),
            ..PlatformStats::default()
        };
        let mut funded = 0u64;
        for loan in self.loans.iter() {
            if matches!(
                loan.status,
                LoanStatus::Funded | LoanStatus::Repaid | LoanStatus::Defaulted | LoanStatus::Liquidated
            ) {
                stats.total_borrowed += loan.amount;
                funded += 1;
            }
            if loan.status.holds_collateral() {
                stats.total_collateral_locked += loan.collateral_amount;
            }
        }
        if stats.total_loans > 0 {
            stats.utilization_rate_bps = (funded * u64::from(BPS_DENOMINATOR) / stats.total_loans) as u32;
        }
        Ok(stats)
    }

    async fn lender_info(&self, who: Address) -> Result<LenderInfo> {
        self.record("lender_info");
        Ok(self.lenders.get(&who).map(|l| l.clone()).unwrap_or_default())
    }

    async fn borrower_info(&self, who: Address) -> Result<BorrowerInfo> {
        self.record("borrower_info");
        Ok(self.borrowers.get(&who).map(|b| b.clone()).unwrap_or_default())
    }

    async fn user_loans(&self, who: Address) -> Result<Vec<LoanId>> {
        self.record("user_loans");
        let mut ids: Vec<LoanId> = self
            .loans
            .iter()
            .filter(|l| l.borrower == who)
            .map(|l| l.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn user_lends(&self, who: Address) -> Result<Vec<LoanId>> {
        self.record("user_lends");
        let mut ids: Vec<LoanId> = self
            .loans
            .iter()
            .filter(|l| l.is_lender(who))
            .map(|l| l.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn is_blacklisted(&self, who: Address) -> Result<bool> {
        self.record("is_blacklisted");
        Ok(self.blacklist.contains(&who))
    }

    async fn request_loan(&self, from: Address, request: LoanRequest) -> Result<TxHash> {
        self.submit("request_loan", || self.apply_request(from, &request))
    }

    async fn fund_loan(&self, from: Address, id: LoanId) -> Result<TxHash> {
        self.submit("fund_loan", || self.apply_fund(from, id))
    }

    async fn repay_loan(&self, from: Address, id: LoanId, amount: U256) -> Result<TxHash> {
        self.submit("repay_loan", || self.apply_repay(from, id, amount))
    }

    async fn cancel_loan(&self, from: Address, id: LoanId) -> Result<TxHash> {
        self.submit("cancel_loan", || self.apply_cancel(from, id))
    }

    async fn default_loan(&self, _from: Address, id: LoanId) -> Result<TxHash> {
        self.submit("default_loan", || self.apply_default(id))
    }

    async fn liquidate_loan(&self, from: Address, id: LoanId) -> Result<TxHash> {
        self.submit("liquidate_loan", || self.apply_liquidate(from, id))
    }
}

#[async_trait]
impl TokenContract for InMemoryContracts {
    async fn metadata(&self) -> Result<TokenMetadata> {
        self.record("metadata");
        Ok(self.token.clone())
    }

    async fn balance_of(&self, who: Address) -> Result<U256> {
        self.record("balance_of");
        Ok(self.balance(who))
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        self.record("allowance");
        Ok(self.allowance_of(owner, spender))
    }

    async fn approve(&self, from: Address, spender: Address, amount: U256) -> Result<TxHash> {
        self.submit("approve", || {
            self.allowances.insert((from, spender), amount);
            Ok(())
        })
    }

    async fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<TxHash> {
        self.submit("transfer", || self.move_funds(from, to, amount))
    }
}

#[async_trait]
impl ReceiptSource for InMemoryContracts {
    async fn confirmation(&self, hash: TxHash) -> Result<Confirmation> {
        self.record("confirmation");
        let mut receipt = self
            .receipts
            .get_mut(&hash)
            .ok_or_else(|| FlashdagError::Network(format!("unknown transaction {}", hash)))?;

        if receipt.pending_polls > 0 {
            if receipt.pending_polls != u32::MAX {
                receipt.pending_polls -= 1;
            }
            return Ok(Confirmation::Pending);
        }
        Ok(receipt.outcome.clone())
    }
}
