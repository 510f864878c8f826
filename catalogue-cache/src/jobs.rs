//! Background Tasks
//!
//! Process-lifetime loops for the caching layer:
//!
//! - [`metrics_logging_task`]: emits a metrics snapshot on a fixed interval
//! - [`periodic_warming_task`]: re-runs the cache warmer on a fixed interval
//!
//! Both run until the shutdown watch channel flips to `true` (or its sender
//! is dropped).
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(metrics_logging_task(metrics, Duration::from_secs(300), shutdown_rx));
//!
//! // Later, trigger shutdown
//! let _ = shutdown_tx.send(true);
//! handle.await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use catalogue_core::CatalogueService;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::metrics::CacheMetrics;
use crate::store::CacheStore;
use crate::warmer::CacheWarmer;

// `interval` panics on a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Wait until shutdown is requested. A dropped sender counts as a request.
async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Log a metrics snapshot every `period` until shutdown.
///
/// A final snapshot is logged on the way out.
pub async fn metrics_logging_task(
    metrics: Arc<CacheMetrics>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(period.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; nothing has been recorded yet.
    ticker.tick().await;

    tracing::info!(interval_secs = period.as_secs(), "Periodic metrics logging started");

    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown_rx) => {
                tracing::info!("Periodic metrics logging shutting down");
                break;
            }
            _ = ticker.tick() => {
                metrics.log_snapshot();
            }
        }
    }

    metrics.snapshot().log("Final cache performance");
}

/// Re-run `warmer` every `period` until shutdown.
///
/// The first run happens one full period after start; startup warming is
/// triggered separately. Returns the number of completed runs.
pub async fn periodic_warming_task<S, C>(
    warmer: CacheWarmer<S, C>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> u64
where
    S: CatalogueService + ?Sized + 'static,
    C: CacheStore + ?Sized + 'static,
{
    let mut ticker = interval(period.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    tracing::info!(interval_secs = period.as_secs(), "Periodic cache warming scheduled");

    let mut runs = 0u64;
    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown_rx) => {
                tracing::info!(runs, "Periodic cache warming shutting down");
                break;
            }
            _ = ticker.tick() => {
                let report = warmer.warm().await;
                runs += 1;
                if !report.is_complete() {
                    tracing::warn!(
                        run = runs,
                        failed_phases = ?report.failed_phases,
                        "Periodic cache warming incomplete"
                    );
                }
            }
        }
    }

    runs
}
