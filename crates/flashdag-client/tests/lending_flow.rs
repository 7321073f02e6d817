//! End-to-end lending flows against the in-memory contracts
//!
//! - Borrow, fund, partial and full repayment
//! - Approval before every token-pulling action
//! - One transaction in flight per session
//! - Contract reverts surfaced without retries

use std::sync::Arc;
use std::time::Duration;

use flashdag_client::memory::{ConfirmMode, InMemoryContracts};
use flashdag_client::{LendingClient, LendingContract, PollConfig, TxAction, TxState, WalletSession};
use flashdag_common::{
    Address, FlashdagError, LoanStatus, PlatformLimits, TransactionError, U256,
};
use flashdag_economics::{LoanForm, MarketFilter, MarketSegment, SortOrder};
use rust_decimal_macros::dec;

const WEI: u128 = 1_000_000_000_000_000_000;

fn tokens(n: u128) -> U256 {
    U256::from(n * WEI)
}

fn borrower() -> Address {
    Address::repeat_byte(0xb0)
}

fn lender() -> Address {
    Address::repeat_byte(0x1e)
}

fn client_for(chain: &Arc<InMemoryContracts>, account: Address, poll: PollConfig) -> LendingClient {
    LendingClient::new(
        chain.clone(),
        chain.clone(),
        chain.clone(),
        WalletSession::connected(account),
        PlatformLimits::default(),
        poll,
    )
}

fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(1),
    }
}

/// Chain with a funded borrower and lender
fn setup() -> (Arc<InMemoryContracts>, LendingClient, LendingClient) {
    let chain = Arc::new(InMemoryContracts::new());
    chain.mint(borrower(), tokens(200));
    chain.mint(lender(), tokens(500));
    let b = client_for(&chain, borrower(), fast_poll());
    let l = client_for(&chain, lender(), fast_poll());
    (chain, b, l)
}

fn standard_form() -> LoanForm {
    LoanForm::from_inputs("100", "150", "10", "30", "Inventory")
}

#[tokio::test]
async fn test_borrow_fund_repay_lifecycle() {
    let (chain, b, l) = setup();

    b.request_loan(&standard_form()).await.unwrap();
    assert_eq!(chain.calls("approve"), 1);
    assert_eq!(chain.calls("request_loan"), 1);
    assert_eq!(chain.balance(borrower()), tokens(50));

    let listing = l.marketplace(&MarketFilter::default()).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].amount, dec!(100));
    assert_eq!(listing[0].purpose, "Inventory");

    l.fund_loan(1).await.unwrap();
    assert_eq!(chain.balance(borrower()), tokens(150));
    assert_eq!(chain.balance(lender()), tokens(400));
    assert!(l.marketplace(&MarketFilter::default()).await.unwrap().is_empty());

    let portfolio = l.lender_portfolio().await.unwrap();
    assert_eq!(portfolio.active_loans, 1);
    assert_eq!(portfolio.total_lent, dec!(100));

    let total = chain.total_repayment(1).await.unwrap();
    let view = b.loan_view(1).await.unwrap();
    assert_eq!(view.status, LoanStatus::Funded);
    assert_eq!(view.total_owed, Some(dec!(100.821917808219178082)));

    b.repay_loan(1, Some(dec!(40))).await.unwrap();
    let view = b.loan_view(1).await.unwrap();
    assert_eq!(view.status, LoanStatus::Funded);
    assert_eq!(view.repaid, dec!(40));
    assert_eq!(view.remaining_debt, Some(dec!(60.821917808219178082)));

    b.repay_loan(1, None).await.unwrap();
    let view = b.loan_view(1).await.unwrap();
    assert_eq!(view.status, LoanStatus::Repaid);
    assert_eq!(view.progress_pct, dec!(100));

    assert_eq!(chain.balance(lender()), tokens(400) + total);
    assert_eq!(chain.balance(borrower()), tokens(300) - total);
    // request, fund, and one per repayment
    assert_eq!(chain.calls("approve"), 4);

    let summary = b.collateral_summary().await.unwrap();
    assert_eq!(summary.total_locked, dec!(0));
}

#[tokio::test]
async fn test_existing_allowance_is_reused() {
    let (chain, b, _) = setup();

    b.approve(dec!(150)).await.unwrap();
    b.tracker().dismiss();
    b.request_loan(&standard_form()).await.unwrap();

    assert_eq!(chain.calls("approve"), 1);
    assert_eq!(chain.calls("request_loan"), 1);
}

#[tokio::test]
async fn test_cancel_returns_collateral() {
    let (chain, b, l) = setup();
    b.request_loan(&standard_form()).await.unwrap();

    let err = l.cancel_loan(1).await.unwrap_err();
    assert!(matches!(err, FlashdagError::NotEligible(_)));

    b.cancel_loan(1).await.unwrap();
    assert_eq!(chain.balance(borrower()), tokens(200));
    assert_eq!(b.loan_view(1).await.unwrap().status, LoanStatus::Cancelled);
    assert!(matches!(
        l.fund_loan(1).await,
        Err(FlashdagError::UnexpectedStatus { .. })
    ));
}

#[tokio::test]
async fn test_default_reverts_until_overdue() {
    let (chain, b, l) = setup();
    b.request_loan(&standard_form()).await.unwrap();
    l.fund_loan(1).await.unwrap();

    let err = l.default_loan(1).await.unwrap_err();
    assert_eq!(err.user_message(), "Error: Loan not overdue");
    assert_eq!(chain.calls("default_loan"), 1);
    assert!(matches!(
        l.tracker().state(),
        TxState::Failed {
            action: TxAction::DefaultLoan(1),
            hash: None,
            ..
        }
    ));

    // 30 day term plus one day of grace
    chain.advance_time(32 * 86_400);
    l.default_loan(1).await.unwrap();

    assert_eq!(chain.calls("default_loan"), 2);
    assert_eq!(b.loan_view(1).await.unwrap().status, LoanStatus::Defaulted);
    assert_eq!(chain.balance(lender()), tokens(550));
}

#[tokio::test]
async fn test_liquidation_is_lender_only() {
    let (chain, b, l) = setup();
    b.request_loan(&standard_form()).await.unwrap();
    l.fund_loan(1).await.unwrap();

    assert!(matches!(
        b.liquidate_loan(1).await,
        Err(FlashdagError::NotEligible(_))
    ));
    assert_eq!(chain.calls("liquidate_loan"), 0);

    l.liquidate_loan(1).await.unwrap();
    assert_eq!(b.loan_view(1).await.unwrap().status, LoanStatus::Liquidated);
}

#[tokio::test]
async fn test_reverted_receipt_leaves_loan_open() {
    let (chain, b, l) = setup();
    b.request_loan(&standard_form()).await.unwrap();
    l.approve(dec!(100)).await.unwrap();

    chain.set_confirm_mode(ConfirmMode::Revert("out of gas".to_string()));
    let err = l.fund_loan(1).await.unwrap_err();

    assert!(matches!(
        err,
        FlashdagError::Transaction(TransactionError::Failed { .. })
    ));
    assert_eq!(chain.calls("fund_loan"), 1);
    assert_eq!(l.loan_view(1).await.unwrap().status, LoanStatus::Requested);
    assert!(!l.tracker().is_busy());
}

#[tokio::test]
async fn test_ineligible_borrower_submits_nothing() {
    let (chain, b, _) = setup();
    chain.blacklist(borrower());

    let err = b.request_loan(&standard_form()).await.unwrap_err();
    assert!(matches!(err, FlashdagError::NotEligible(_)));
    assert_eq!(chain.submissions(), 0);
}

#[tokio::test]
async fn test_insufficient_collateral_balance() {
    let chain = Arc::new(InMemoryContracts::new());
    chain.mint(borrower(), tokens(10));
    let b = client_for(&chain, borrower(), fast_poll());

    match b.request_loan(&standard_form()).await {
        Err(FlashdagError::InsufficientBalance { required, available }) => {
            assert_eq!(required, dec!(150));
            assert_eq!(available, dec!(10));
        }
        other => panic!("expected insufficient balance, got {:?}", other),
    }
    assert_eq!(chain.submissions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_write_refused_while_busy() {
    let (chain, b, _) = setup();
    chain.set_confirm_mode(ConfirmMode::After(3));

    let form = standard_form();
    let (first, second) = tokio::join!(b.request_loan(&form), b.approve(dec!(1)));

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(FlashdagError::Transaction(TransactionError::Busy { .. }))
    ));
    assert_eq!(chain.calls("approve"), 1);
    assert_eq!(chain.calls("request_loan"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_timeout_keeps_transaction_tracked() {
    let (chain, _, l) = setup();
    chain.set_confirm_mode(ConfirmMode::Never);

    let err = l.approve(dec!(10)).await.unwrap_err();
    assert!(matches!(err, FlashdagError::Timeout(_)));
    assert!(matches!(
        l.tracker().state(),
        TxState::Confirming {
            action: TxAction::Approve,
            ..
        }
    ));
    assert!(matches!(
        l.transfer(borrower(), dec!(1)).await,
        Err(FlashdagError::Transaction(TransactionError::Busy { .. }))
    ));

    assert!(l.tracker().abandon().is_some());
    assert_eq!(l.tracker().state(), TxState::Idle);
    assert_eq!(chain.calls("approve"), 1);
}

#[tokio::test]
async fn test_marketplace_segments() {
    let chain = Arc::new(InMemoryContracts::new());
    let other = Address::repeat_byte(0xb1);
    chain.mint(borrower(), tokens(500));
    chain.mint(other, tokens(500));
    chain.mint(lender(), tokens(500));

    let b = client_for(&chain, borrower(), fast_poll());
    let o = client_for(&chain, other, fast_poll());
    let l = client_for(&chain, lender(), fast_poll());

    b.request_loan(&LoanForm::from_inputs("50", "100", "8", "14", "Seeds"))
        .await
        .unwrap();
    o.request_loan(&LoanForm::from_inputs("80", "100", "4", "90", "Delivery van"))
        .await
        .unwrap();
    b.request_loan(&LoanForm::from_inputs("20", "30", "12", "7", "Stall rent"))
        .await
        .unwrap();
    l.fund_loan(3).await.unwrap();

    let all = l.marketplace(&MarketFilter::default()).await.unwrap();
    assert_eq!(all.iter().map(|loan| loan.id).collect::<Vec<_>>(), vec![2, 1]);

    let high_yield = l
        .marketplace(&MarketFilter::new(MarketSegment::HighYield, SortOrder::Newest))
        .await
        .unwrap();
    assert_eq!(high_yield.len(), 1);
    assert_eq!(high_yield[0].id, 1);

    let short = l
        .marketplace(&MarketFilter::new(MarketSegment::All, SortOrder::ShortestTerm))
        .await
        .unwrap();
    assert_eq!(short[0].id, 1);

    let searched = l
        .marketplace(&MarketFilter::default().with_search("VAN"))
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].borrower, other);
}

#[tokio::test]
async fn test_disconnect_blocks_writes() {
    let (chain, b, _) = setup();
    b.wallet().disconnect();

    assert!(matches!(
        b.request_loan(&standard_form()).await,
        Err(FlashdagError::WalletNotConnected)
    ));
    assert!(matches!(b.my_loans().await, Err(FlashdagError::WalletNotConnected)));
    assert_eq!(chain.submissions(), 0);
}
