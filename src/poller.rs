//! Refresh poller — rebuilds the snapshot on a fixed interval.
//!
//! Runs on startup and then every `update_every`. A failed cycle is
//! logged and the previous snapshot stays published.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::cache::SnapshotCache;
use crate::error::{FetchError, PartialFetchError};
use crate::fetch::{wait_for_shutdown, FetchEngine};

/// Run the refresh poller until shutdown is requested.
pub async fn run_poller(
    engine: Arc<FetchEngine>,
    cache: Arc<SnapshotCache>,
    update_every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    // Run immediately on startup
    info!("🔄 Refresh poller starting — initial fetch...");
    if let Err(e) = refresh_once(&engine, &cache, shutdown.clone()).await {
        error!("Initial refresh failed: {}", e);
    }

    let mut interval = time::interval(update_every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // Skip the immediate tick (we already ran)

    loop {
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            _ = interval.tick() => {}
        }

        info!(interval_secs = update_every.as_secs(), "🔄 Running scheduled refresh...");
        match refresh_once(&engine, &cache, shutdown.clone()).await {
            Ok(_) => {}
            Err(FetchError::Cancelled) => break,
            Err(e) => error!("Scheduled refresh failed — keeping previous snapshot: {}", e),
        }
    }

    info!("Refresh poller stopped");
}

/// Run one refresh cycle and publish the result.
///
/// On error the cache is left untouched.
pub async fn refresh_once(
    engine: &FetchEngine,
    cache: &SnapshotCache,
    shutdown: watch::Receiver<bool>,
) -> Result<Option<PartialFetchError>, FetchError> {
    let report = engine.refresh_all(shutdown).await?;
    cache.swap(report.snapshot);
    Ok(report.partial)
}
