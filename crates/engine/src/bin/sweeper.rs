use std::sync::Arc;

use anyhow::Context;

use bazaar_core::SystemClock;
use bazaar_engine::{Marketplace, spawn_sweeper};
use bazaar_infra::{InMemoryIdentity, InMemoryStore, LogNotifier, MarketplaceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bazaar_observability::init();

    let config = MarketplaceConfig::from_env().context("loading marketplace configuration")?;
    tracing::info!(?config, "starting expiry sweeper");

    let store = Arc::new(InMemoryStore::with_retry_policy(config.retry_policy()));
    let marketplace = Arc::new(Marketplace::new(
        store,
        Arc::new(InMemoryIdentity::new()),
        Arc::new(LogNotifier),
        Arc::new(SystemClock),
        &config,
    ));

    let sweeper = spawn_sweeper(marketplace, config.sweep_interval);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown requested");
    sweeper.shutdown().await;
    Ok(())
}
