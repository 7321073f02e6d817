//! # FlashDAG Client
//!
//! Borrower and lender client for the FlashDAG micro-lending contracts on
//! BlockDAG.
//!
//! ## Components
//!
//! - **Contract seams**: [`LendingContract`], [`TokenContract`], [`ReceiptSource`]
//! - **EVM gateway**: alloy bindings over JSON-RPC with a local signer
//! - **Transactions**: one tracked in-flight transaction per session
//! - **Client**: validation, approvals and dashboards behind [`LendingClient`]
//! - **In-memory double**: scripted contracts for tests and demos
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     LendingClient                        │
//! │   WalletSession ── validation ── TxTracker ── views      │
//! ├──────────────────────────────────────────────────────────┤
//! │  LendingContract │ TokenContract │ ReceiptSource         │
//! ├──────────────────┴───────────────┴───────────────────────┤
//! │     EvmGateway (alloy)    │    InMemoryContracts         │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod contract;
pub mod evm;
pub mod memory;
pub mod tx;
pub mod wallet;

pub use client::LendingClient;
pub use config::ClientConfig;
pub use contract::{Confirmation, LendingContract, ReceiptSource, TokenContract};
pub use evm::EvmGateway;
pub use tx::{PollConfig, TxAction, TxState, TxTracker};
pub use wallet::WalletSession;
