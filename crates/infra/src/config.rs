//! Runtime configuration loaded from the environment.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Marketplace runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketplaceConfig {
    /// How often the expiry sweep runs.
    pub sweep_interval: Duration,
    /// Upper bound on a single notification send.
    pub notify_timeout: Duration,
    /// Re-runs allowed after a lost commit race.
    pub store_max_retries: u32,
    /// First retry delay; later retries back off exponentially.
    pub store_retry_base: Duration,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3600),
            notify_timeout: Duration::from_millis(2000),
            store_max_retries: 5,
            store_retry_base: Duration::from_millis(5),
        }
    }
}

impl MarketplaceConfig {
    /// Load configuration from environment variables (after reading `.env`).
    ///
    /// Optional with defaults: `BAZAAR_SWEEP_INTERVAL_SECS` (3600),
    /// `BAZAAR_NOTIFY_TIMEOUT_MS` (2000), `BAZAAR_STORE_MAX_RETRIES` (5),
    /// `BAZAAR_STORE_RETRY_BASE_MS` (5).
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but is not a valid number, or if an
    /// interval/timeout is zero.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let sweep_secs = parse_or(&lookup, "BAZAAR_SWEEP_INTERVAL_SECS", defaults.sweep_interval.as_secs())?;
        if sweep_secs == 0 {
            anyhow::bail!("BAZAAR_SWEEP_INTERVAL_SECS must be greater than zero");
        }
        let notify_ms = parse_or(
            &lookup,
            "BAZAAR_NOTIFY_TIMEOUT_MS",
            defaults.notify_timeout.as_millis() as u64,
        )?;
        if notify_ms == 0 {
            anyhow::bail!("BAZAAR_NOTIFY_TIMEOUT_MS must be greater than zero");
        }
        let store_max_retries = parse_or(&lookup, "BAZAAR_STORE_MAX_RETRIES", defaults.store_max_retries)?;
        let retry_base_ms = parse_or(
            &lookup,
            "BAZAAR_STORE_RETRY_BASE_MS",
            defaults.store_retry_base.as_millis() as u64,
        )?;

        Ok(Self {
            sweep_interval: Duration::from_secs(sweep_secs),
            notify_timeout: Duration::from_millis(notify_ms),
            store_max_retries,
            store_retry_base: Duration::from_millis(retry_base_ms),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.store_max_retries,
            self.store_retry_base,
            self.store_retry_base.saturating_mul(64),
        )
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{key} must be a non-negative integer, got {raw:?}")),
    }
}
