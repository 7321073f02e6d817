//! Transaction lifecycle tracking
//!
//! ```text
//! Idle -> AwaitingSignature -> Confirming(hash) -> Confirmed(hash)
//!                    |                 |
//!                    +-> Failed        +-> Failed
//! ```
//!
//! A tracker owns at most one in-flight transaction. It refuses a new
//! submission while one is awaiting signature or confirming, never resubmits
//! on failure, and leaves a transaction in `Confirming` when polling times out.
//! Dropping an `execute` future before the wallet answers fails the
//! transaction as cancelled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use flashdag_common::{FlashdagError, LoanId, Result, TransactionError, TxHash};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::contract::{Confirmation, ReceiptSource};

/// What a tracked transaction does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "loan_id")]
pub enum TxAction {
    Approve,
    Transfer,
    RequestLoan,
    FundLoan(LoanId),
    RepayLoan(LoanId),
    CancelLoan(LoanId),
    DefaultLoan(LoanId),
    LiquidateLoan(LoanId),
}

impl std::fmt::Display for TxAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxAction::Approve => write!(f, "approve"),
            TxAction::Transfer => write!(f, "transfer"),
            TxAction::RequestLoan => write!(f, "request loan"),
            TxAction::FundLoan(id) => write!(f, "fund loan #{}", id),
            TxAction::RepayLoan(id) => write!(f, "repay loan #{}", id),
            TxAction::CancelLoan(id) => write!(f, "cancel loan #{}", id),
            TxAction::DefaultLoan(id) => write!(f, "default loan #{}", id),
            TxAction::LiquidateLoan(id) => write!(f, "liquidate loan #{}", id),
        }
    }
}

/// UI-visible state of the tracked transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TxState {
    #[default]
    Idle,
    AwaitingSignature {
        action: TxAction,
    },
    Confirming {
        action: TxAction,
        hash: TxHash,
    },
    Confirmed {
        action: TxAction,
        hash: TxHash,
    },
    Failed {
        action: TxAction,
        hash: Option<TxHash>,
        reason: String,
    },
}

impl TxState {
    /// A transaction is waiting on the wallet or the chain
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            TxState::AwaitingSignature { .. } | TxState::Confirming { .. }
        )
    }

    pub fn action(&self) -> Option<TxAction> {
        match self {
            TxState::Idle => None,
            TxState::AwaitingSignature { action }
            | TxState::Confirming { action, .. }
            | TxState::Confirmed { action, .. }
            | TxState::Failed { action, .. } => Some(*action),
        }
    }

    pub fn hash(&self) -> Option<TxHash> {
        match self {
            TxState::Confirming { hash, .. } | TxState::Confirmed { hash, .. } => Some(*hash),
            TxState::Failed { hash, .. } => *hash,
            _ => None,
        }
    }

    /// Status-line text
    pub fn label(&self) -> String {
        match self {
            TxState::Idle => "Ready".to_string(),
            TxState::AwaitingSignature { action } => {
                format!("Confirm {} in your wallet...", action)
            }
            TxState::Confirming { action, .. } => format!("Waiting for {} to confirm...", action),
            TxState::Confirmed { action, .. } => format!("Transaction confirmed: {}", action),
            TxState::Failed { reason, .. } => reason.clone(),
        }
    }
}

/// Confirmation polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Poll until the transaction settles or `poll.timeout` elapses
///
/// Returns [`Confirmation::Pending`] on timeout. Query errors are logged and
/// polling continues; the transaction itself is never resent.
pub async fn wait_for_confirmation(
    receipts: &dyn ReceiptSource,
    hash: TxHash,
    poll: PollConfig,
) -> Confirmation {
    let polling = async {
        let mut ticker = tokio::time::interval(poll.interval);
        loop {
            ticker.tick().await;
            match receipts.confirmation(hash).await {
                Ok(Confirmation::Pending) => debug!(%hash, "Transaction pending"),
                Ok(settled) => return settled,
                Err(e) => warn!(%hash, error = %e, "Confirmation query failed"),
            }
        }
    };

    tokio::time::timeout(poll.timeout, polling)
        .await
        .unwrap_or(Confirmation::Pending)
}

/// Tracks the single in-flight transaction of a session
#[derive(Debug, Clone, Default)]
pub struct TxTracker {
    state: Arc<Mutex<TxState>>,
}

impl TxTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TxState {
        self.state.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().is_busy()
    }

    /// Clear a settled state; refused while a transaction is in flight
    pub fn dismiss(&self) -> bool {
        let mut state = self.state.lock();
        if state.is_busy() {
            return false;
        }
        *state = TxState::Idle;
        true
    }

    /// Stop tracking a transaction stuck awaiting signature or confirmation
    ///
    /// Returns the hash when the transaction had been submitted; it may still
    /// be mined later.
    pub fn abandon(&self) -> Option<TxHash> {
        let mut state = self.state.lock();
        match *state {
            TxState::Confirming { action, hash } => {
                warn!(%action, %hash, "Abandoning unconfirmed transaction");
                *state = TxState::Idle;
                Some(hash)
            }
            TxState::AwaitingSignature { action } => {
                warn!(%action, "Abandoning unsigned transaction");
                *state = TxState::Idle;
                None
            }
            _ => None,
        }
    }

    fn begin(&self, action: TxAction) -> std::result::Result<(), TransactionError> {
        let mut state = self.state.lock();
        if let Some(current) = state.action().filter(|_| state.is_busy()) {
            return Err(TransactionError::Busy {
                action: current.to_string(),
            });
        }
        *state = TxState::AwaitingSignature { action };
        Ok(())
    }

    fn set(&self, next: TxState) {
        *self.state.lock() = next;
    }

    /// Record the outcome of `hash` unless the tracker has moved on
    fn settle(&self, hash: TxHash, next: TxState) {
        let mut state = self.state.lock();
        match *state {
            TxState::Confirming { hash: current, .. } if current == hash => *state = next,
            _ => debug!(%hash, "Tracker moved on; outcome not recorded"),
        }
    }

    /// Sign, submit and confirm one transaction
    ///
    /// `submit` runs at most once.
    pub async fn execute<F, Fut>(
        &self,
        action: TxAction,
        receipts: &dyn ReceiptSource,
        poll: PollConfig,
        submit: F,
    ) -> Result<TxHash>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TxHash>>,
    {
        self.begin(action)?;
        debug!(%action, "Awaiting signature");

        let mut pending = PendingSignature {
            tracker: self,
            action,
            armed: true,
        };
        let submitted = submit().await;
        pending.armed = false;

        let hash = match submitted {
            Ok(hash) => hash,
            Err(err) => {
                warn!(%action, error = %err, "Submission failed");
                self.set(TxState::Failed {
                    action,
                    hash: None,
                    reason: err.user_message(),
                });
                return Err(err);
            }
        };

        info!(%action, %hash, "Transaction submitted");
        self.set(TxState::Confirming { action, hash });
        self.watch(action, hash, receipts, poll).await
    }

    /// Resume polling a transaction left in `Confirming`
    pub async fn resume(&self, receipts: &dyn ReceiptSource, poll: PollConfig) -> Result<TxHash> {
        match self.state() {
            TxState::Confirming { action, hash } => self.watch(action, hash, receipts, poll).await,
            other => Err(FlashdagError::Internal(format!(
                "no transaction awaiting confirmation ({})",
                other.label()
            ))),
        }
    }

    async fn watch(
        &self,
        action: TxAction,
        hash: TxHash,
        receipts: &dyn ReceiptSource,
        poll: PollConfig,
    ) -> Result<TxHash> {
        match wait_for_confirmation(receipts, hash, poll).await {
            Confirmation::Confirmed => {
                info!(%action, %hash, "Transaction confirmed");
                self.settle(hash, TxState::Confirmed { action, hash });
                Ok(hash)
            }
            Confirmation::Failed(reason) => {
                warn!(%action, %hash, %reason, "Transaction failed");
                self.settle(
                    hash,
                    TxState::Failed {
                        action,
                        hash: Some(hash),
                        reason: reason.clone(),
                    },
                );
                Err(TransactionError::Failed {
                    hash: hash.to_string(),
                    reason,
                }
                .into())
            }
            Confirmation::Pending => {
                warn!(%action, %hash, "Confirmation timed out; transaction left pending");
                Err(FlashdagError::Timeout(format!(
                    "{} ({}) not confirmed after {}s",
                    action,
                    hash,
                    poll.timeout.as_secs()
                )))
            }
        }
    }
}

/// Fails the tracked transaction if `execute` is dropped mid-signature
struct PendingSignature<'a> {
    tracker: &'a TxTracker,
    action: TxAction,
    armed: bool,
}

impl Drop for PendingSignature<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.tracker.state.lock();
        if *state == (TxState::AwaitingSignature { action: self.action }) {
            warn!(action = %self.action, "Signature request dropped");
            *state = TxState::Failed {
                action: self.action,
                hash: None,
                reason: "Transaction cancelled".to_string(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockReceiptSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn poll() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(100),
            timeout: Duration::from_secs(5),
        }
    }

    fn receipts_after(pending_polls: usize, outcome: Confirmation) -> MockReceiptSource {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut receipts = MockReceiptSource::new();
        receipts.expect_confirmation().returning(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < pending_polls {
                Ok(Confirmation::Pending)
            } else {
                Ok(outcome.clone())
            }
        });
        receipts
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_after_polling() {
        let tracker = TxTracker::new();
        let receipts = receipts_after(3, Confirmation::Confirmed);
        let hash = TxHash::repeat_byte(0x01);

        let result = tracker
            .execute(TxAction::FundLoan(1), &receipts, poll(), || async move { Ok(hash) })
            .await;

        assert_eq!(result.unwrap(), hash);
        assert_eq!(
            tracker.state(),
            TxState::Confirmed {
                action: TxAction::FundLoan(1),
                hash
            }
        );
        assert!(!tracker.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_signature_is_not_retried() {
        let tracker = TxTracker::new();
        let mut receipts = MockReceiptSource::new();
        receipts.expect_confirmation().never();
        let attempts = AtomicUsize::new(0);

        let result = tracker
            .execute(TxAction::RequestLoan, &receipts, poll(), || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(TransactionError::Rejected("user denied".to_string()).into())
            })
            .await;

        assert!(matches!(
            result,
            Err(FlashdagError::Transaction(TransactionError::Rejected(_)))
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(
            tracker.state(),
            TxState::Failed { hash: None, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverted_receipt_fails() {
        let tracker = TxTracker::new();
        let receipts = receipts_after(0, Confirmation::Failed("reverted".to_string()));
        let hash = TxHash::repeat_byte(0x02);

        let result = tracker
            .execute(TxAction::RepayLoan(4), &receipts, poll(), || async move { Ok(hash) })
            .await;

        assert!(matches!(
            result,
            Err(FlashdagError::Transaction(TransactionError::Failed { .. }))
        ));
        assert_eq!(tracker.state().hash(), Some(hash));
        assert_eq!(tracker.state().label(), "reverted");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_leaves_transaction_confirming() {
        let tracker = TxTracker::new();
        let receipts = receipts_after(usize::MAX, Confirmation::Confirmed);
        let hash = TxHash::repeat_byte(0x03);

        let result = tracker
            .execute(TxAction::Approve, &receipts, poll(), || async move { Ok(hash) })
            .await;

        assert!(matches!(result, Err(FlashdagError::Timeout(_))));
        assert_eq!(
            tracker.state(),
            TxState::Confirming {
                action: TxAction::Approve,
                hash
            }
        );

        let busy = tracker
            .execute(TxAction::Transfer, &receipts, poll(), || async move { Ok(hash) })
            .await;
        assert!(matches!(
            busy,
            Err(FlashdagError::Transaction(TransactionError::Busy { .. }))
        ));

        assert_eq!(tracker.abandon(), Some(hash));
        assert_eq!(tracker.state(), TxState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_picks_up_pending_transaction() {
        let tracker = TxTracker::new();
        let hash = TxHash::repeat_byte(0x04);
        tracker.set(TxState::Confirming {
            action: TxAction::CancelLoan(2),
            hash,
        });

        let receipts = receipts_after(1, Confirmation::Confirmed);
        assert_eq!(tracker.resume(&receipts, poll()).await.unwrap(), hash);
        assert!(tracker.dismiss());
        assert!(tracker.resume(&receipts, poll()).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_submission_refused() {
        let tracker = TxTracker::new();
        let receipts = receipts_after(0, Confirmation::Confirmed);
        let (release, wait) = tokio::sync::oneshot::channel::<()>();

        let first = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                tracker
                    .execute(TxAction::FundLoan(9), &receipts, poll(), || async move {
                        let _ = wait.await;
                        Ok(TxHash::repeat_byte(0x09))
                    })
                    .await
            })
        };

        while !tracker.is_busy() {
            tokio::task::yield_now().await;
        }

        let mut idle = MockReceiptSource::new();
        idle.expect_confirmation().never();
        let second = tracker
            .execute(TxAction::FundLoan(10), &idle, poll(), || async {
                Ok(TxHash::repeat_byte(0x10))
            })
            .await;
        assert!(matches!(
            second,
            Err(FlashdagError::Transaction(TransactionError::Busy { ref action })) if action == "fund loan #9"
        ));
        assert!(!tracker.dismiss());

        release.send(()).unwrap();
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_signature_request_frees_tracker() {
        let tracker = TxTracker::new();
        let mut silent = MockReceiptSource::new();
        silent.expect_confirmation().never();

        let cancelled = tokio::time::timeout(
            Duration::from_secs(1),
            tracker.execute(TxAction::RequestLoan, &silent, poll(), || {
                std::future::pending::<Result<TxHash>>()
            }),
        )
        .await;

        assert!(cancelled.is_err());
        assert_eq!(
            tracker.state(),
            TxState::Failed {
                action: TxAction::RequestLoan,
                hash: None,
                reason: "Transaction cancelled".to_string(),
            }
        );
        assert!(tracker.dismiss());

        let receipts = receipts_after(0, Confirmation::Confirmed);
        let hash = TxHash::repeat_byte(0x06);
        let next = tracker
            .execute(TxAction::RequestLoan, &receipts, poll(), || async move { Ok(hash) })
            .await;
        assert_eq!(next.unwrap(), hash);
    }

    #[test]
    fn test_abandon_clears_unsigned_transaction() {
        let tracker = TxTracker::new();
        tracker.begin(TxAction::Approve).unwrap();
        assert!(tracker.is_busy());

        assert_eq!(tracker.abandon(), None);
        assert_eq!(tracker.state(), TxState::Idle);
        assert!(tracker.begin(TxAction::Transfer).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_resume_keeps_newer_transaction() {
        let tracker = TxTracker::new();
        let old = TxHash::repeat_byte(0x05);
        tracker.set(TxState::Confirming {
            action: TxAction::Approve,
            hash: old,
        });
        let receipts = receipts_after(2, Confirmation::Confirmed);

        let replace = async {
            assert_eq!(tracker.abandon(), Some(old));
            tracker.begin(TxAction::Transfer).unwrap();
        };
        let (resumed, ()) = tokio::join!(tracker.resume(&receipts, poll()), replace);

        assert_eq!(resumed.unwrap(), old);
        assert_eq!(
            tracker.state(),
            TxState::AwaitingSignature {
                action: TxAction::Transfer
            }
        );
        assert!(tracker.is_busy());
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(TxState::Idle.label(), "Ready");
        assert_eq!(
            TxState::AwaitingSignature {
                action: TxAction::RepayLoan(3)
            }
            .label(),
            "Confirm repay loan #3 in your wallet..."
        );
    }
}
