//! Periodic subscription expiry.
//!
//! The sweeper only decides *when* to run; what a run does lives in
//! [`Marketplace::sweep_expired_subscriptions`]. Overlapping runs (a manual
//! admin sweep racing the timer, or two processes) are safe because each
//! subscription is re-checked inside its own unit of work.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use bazaar_infra::Store;

use crate::marketplace::Marketplace;

/// Handle to a running sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Ask the loop to stop and wait for the in-flight run (if any) to finish.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(err) = self.join.await {
            tracing::error!(error = %err, "expiry sweeper task ended abnormally");
        }
    }
}

/// Spawn the expiry loop. The first run happens immediately, then once per `every`.
pub fn spawn_sweeper<S>(marketplace: Arc<Marketplace<S>>, every: Duration) -> SweeperHandle
where
    S: Store + 'static,
{
    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();

    let join = tokio::spawn(async move {
        tracing::info!(interval_secs = every.as_secs(), "expiry sweeper started");

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = signal.notified() => {
                    tracing::info!("expiry sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match marketplace.run_scheduled_sweep().await {
                        // Rows that failed stay lapsed and come back on the next tick.
                        Ok(report) if !report.failed.is_empty() => tracing::warn!(
                            expired = report.processed(),
                            failed = report.failed.len(),
                            "scheduled sweep left subscriptions unexpired"
                        ),
                        Ok(report) if report.processed() > 0 => tracing::info!(
                            expired = report.processed(),
                            deactivated = report.deactivated_listings(),
                            "scheduled sweep expired subscriptions"
                        ),
                        Ok(_) => tracing::debug!("scheduled sweep found nothing to expire"),
                        // A failed run is retried on the next tick.
                        Err(err) => tracing::warn!(error = %err, "scheduled sweep failed"),
                    }
                }
            }
        }
    });

    SweeperHandle { shutdown, join }
}
