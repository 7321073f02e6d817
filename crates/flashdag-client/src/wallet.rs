//! Connected wallet session

use std::sync::Arc;

use flashdag_common::{Address, FlashdagError, Result};
use parking_lot::RwLock;
use tracing::info;

/// Account the user has connected, shared across clones
#[derive(Debug, Clone, Default)]
pub struct WalletSession {
    account: Arc<RwLock<Option<Address>>>,
}

impl WalletSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session already connected to `account`
    pub fn connected(account: Address) -> Self {
        let session = Self::new();
        session.connect(account);
        session
    }

    pub fn connect(&self, account: Address) {
        info!(%account, "Wallet connected");
        *self.account.write() = Some(account);
    }

    pub fn disconnect(&self) {
        if let Some(account) = self.account.write().take() {
            info!(%account, "Wallet disconnected");
        }
    }

    pub fn account(&self) -> Option<Address> {
        *self.account.read()
    }

    pub fn is_connected(&self) -> bool {
        self.account.read().is_some()
    }

    /// Connected account, or [`FlashdagError::WalletNotConnected`]
    pub fn require(&self) -> Result<Address> {
        self.account().ok_or(FlashdagError::WalletNotConnected)
    }
}
