//! FlashDAG client binary
//!
//! Connects to the configured chain and prints a JSON snapshot of the platform
//! and, when a signer is configured, of its borrower and lender positions.

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flashdag_client::{ClientConfig, EvmGateway, LendingClient, WalletSession};
use flashdag_common::{units, VERSION};
use flashdag_economics::MarketFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting FlashDAG client v{}", VERSION);

    let config = ClientConfig::load()?;
    info!("Loaded configuration: {:?}", config);

    if !config.has_contracts() {
        bail!("platform_address and token_address must be configured");
    }

    let gateway = Arc::new(EvmGateway::connect(&config)?);
    gateway.verify_chain(config.chain_id).await?;
    info!(chain_id = config.chain_id, rpc = %config.rpc_url, "Connected");

    let wallet = WalletSession::new();
    if let Some(account) = gateway.signer() {
        wallet.connect(account);
    }

    let client = LendingClient::new(
        gateway.clone(),
        gateway.clone(),
        gateway,
        wallet,
        config.limits.clone(),
        config.poll(),
    );

    let token = client.token_metadata().await?;
    let stats = client.platform_stats().await?;
    let market = client.marketplace(&MarketFilter::default()).await?;

    let mut snapshot = serde_json::json!({
        "token": token,
        "platform": {
            "total_loans": stats.total_loans,
            "total_borrowed": units::from_base_units(stats.total_borrowed, token.decimals)?,
            "total_collateral_locked": units::from_base_units(stats.total_collateral_locked, token.decimals)?,
            "utilization_rate_bps": stats.utilization_rate_bps,
            "max_utilization_rate_bps": stats.max_utilization_rate_bps,
            "treasury": stats.treasury,
            "emergency": stats.emergency,
        },
        "marketplace": market,
    });

    if let Some(account) = client.wallet().account() {
        info!(%account, "Loading positions");
        snapshot["account"] = serde_json::json!({
            "address": account,
            "balance": client.balance().await?,
            "borrower": client.borrower_status().await?,
            "loans": client.my_loans().await?,
            "collateral": client.collateral_summary().await?,
            "lends": client.my_lends().await?,
            "portfolio": client.lender_portfolio().await?,
        });
    }

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
