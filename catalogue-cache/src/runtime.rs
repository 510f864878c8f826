//! Runtime wiring.
//!
//! [`CacheRuntime`] builds the coordinator and warmer from one set of
//! settings and owns the background loops. Dropping the runtime without
//! calling [`CacheRuntime::shutdown`] also stops the loops, because the
//! shutdown sender goes away with it, but nothing waits for them to exit.

use std::sync::Arc;

use catalogue_core::CatalogueService;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{CacheSettings, WarmingPlan};
use crate::coordinator::CachedCatalogue;
use crate::jobs::{metrics_logging_task, periodic_warming_task};
use crate::store::CacheStore;
use crate::warmer::{CacheWarmer, WarmingReport};

/// A running caching layer and its background tasks.
pub struct CacheRuntime<S, C>
where
    S: CatalogueService + ?Sized,
    C: CacheStore + ?Sized,
{
    catalogue: CachedCatalogue<S, C>,
    warmer: CacheWarmer<S, C>,
    shutdown_tx: watch::Sender<bool>,
    metrics_task: JoinHandle<()>,
    warming_task: Option<JoinHandle<u64>>,
    startup_warming: Option<JoinHandle<WarmingReport>>,
}

impl<S, C> CacheRuntime<S, C>
where
    S: CatalogueService + ?Sized + 'static,
    C: CacheStore + ?Sized + 'static,
{
    /// Build the layer and spawn its background tasks.
    ///
    /// Must be called from within a Tokio runtime. Startup warming, when
    /// enabled, runs in the background and does not delay the return.
    pub fn start(service: Arc<S>, store: Arc<C>, settings: CacheSettings, plan: WarmingPlan) -> Self {
        let warmer = CacheWarmer::new(Arc::clone(&service), Arc::clone(&store), &settings, plan);
        let catalogue = CachedCatalogue::new(service, store, settings.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let metrics_task = tokio::spawn(metrics_logging_task(
            Arc::clone(catalogue.metrics()),
            settings.metrics_log_interval,
            shutdown_rx.clone(),
        ));

        let startup_warming = settings
            .warm_on_startup
            .then(|| warmer.warm_in_background());

        let warming_task = settings.warming_interval.map(|period| {
            tokio::spawn(periodic_warming_task(warmer.clone(), period, shutdown_rx))
        });

        tracing::info!(
            ttl_secs = settings.entry_ttl.as_secs(),
            warm_on_startup = settings.warm_on_startup,
            warming_interval_secs = settings.warming_interval.map(|d| d.as_secs()),
            tag_ordering = ?settings.tag_ordering,
            "Catalogue cache started"
        );

        Self {
            catalogue,
            warmer,
            shutdown_tx,
            metrics_task,
            warming_task,
            startup_warming,
        }
    }

    /// The cached catalogue to serve reads from.
    pub fn catalogue(&self) -> &CachedCatalogue<S, C> {
        &self.catalogue
    }

    pub fn warmer(&self) -> &CacheWarmer<S, C> {
        &self.warmer
    }

    /// Take the handle of the startup warming run, if one was started.
    pub fn take_startup_warming(&mut self) -> Option<JoinHandle<WarmingReport>> {
        self.startup_warming.take()
    }

    /// Stop the periodic loops and wait for them to exit.
    ///
    /// An in-flight startup warming run is left to finish on its own; its
    /// writes are bounded by the write-back timeout.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.metrics_task.await {
            tracing::error!(error = %e, "Metrics logging task failed");
        }

        if let Some(handle) = self.warming_task {
            match handle.await {
                Ok(runs) => tracing::info!(runs, "Periodic warming stopped"),
                Err(e) => tracing::error!(error = %e, "Periodic warming task failed"),
            }
        }

        tracing::info!("Catalogue cache stopped");
    }
}
