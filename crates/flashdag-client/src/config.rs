//! Client configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `flashdag.toml`, then `FLASHDAG__*` environment variables (nested keys use
//! `__`, e.g. `FLASHDAG__LIMITS__MAX_LOANS_PER_USER`). A `.env` file is loaded
//! first when present.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use flashdag_common::{Address, FlashdagError, PlatformLimits, Result};
use serde::{Deserialize, Serialize};

use crate::tx::PollConfig;

/// BlockDAG testnet RPC endpoint
pub const DEFAULT_RPC_URL: &str = "https://rpc.primordial.bdagscan.com";

/// BlockDAG testnet chain id
pub const DEFAULT_CHAIN_ID: u64 = 1043;

/// Lending client configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Lending platform contract
    pub platform_address: Address,
    /// Platform token contract
    pub token_address: Address,
    /// Hex private key of the local signer; read-only when absent
    pub private_key: Option<String>,
    pub poll_interval_ms: u64,
    pub confirmation_timeout_secs: u64,
    pub limits: PlatformLimits,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            platform_address: Address::ZERO,
            token_address: Address::ZERO,
            private_key: None,
            poll_interval_ms: 2_000,
            confirmation_timeout_secs: 120,
            limits: PlatformLimits::default(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("platform_address", &self.platform_address)
            .field("token_address", &self.token_address)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("confirmation_timeout_secs", &self.confirmation_timeout_secs)
            .field("limits", &self.limits)
            .finish()
    }
}

impl ClientConfig {
    /// Load from `.env`, `flashdag.toml` and the environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();
        Self::load_from(Path::new("flashdag"))
    }

    /// Load from a config file (extension optional, may be missing) and the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let cfg: Self = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("FLASHDAG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(Config::try_deserialize::<Self>)
            .map_err(|e| FlashdagError::Config(e.to_string()))?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(FlashdagError::Config("rpc_url is empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(FlashdagError::Config(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.limits.min_duration_days > self.limits.max_duration_days {
            return Err(FlashdagError::Config(
                "limits.min_duration_days exceeds limits.max_duration_days".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether both contract addresses are set
    pub fn has_contracts(&self) -> bool {
        self.platform_address != Address::ZERO && self.token_address != Address::ZERO
    }

    pub fn poll(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.confirmation_timeout_secs),
        }
    }
}
