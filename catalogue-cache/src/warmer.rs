//! Cache warming.
//!
//! Pre-populates entries for the queries in a [`WarmingPlan`] before real
//! traffic asks for them. A run has three phases that execute concurrently
//! on their own tasks:
//!
//! - **Tags**: the distinct tag list.
//! - **Listings**: every planned listing together with the count for its
//!   tag filter.
//! - **Products**: the first unfiltered page, then each product individually.
//!
//! Warming writes straight to the store and never reads first, so existing
//! entries are overwritten and their TTL refreshed. The first failure in a
//! phase ends that phase; the other phases carry on.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use catalogue_core::{CatalogueError, CatalogueService, ProductQuery};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::codec::CacheValue;
use crate::config::{CacheSettings, WarmingPlan};
use crate::error::CacheError;
use crate::keys::KeyDeriver;
use crate::store::CacheStore;

/// One of the three warming phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmPhase {
    Tags,
    Listings,
    Products,
}

impl WarmPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Listings => "listings",
            Self::Products => "products",
        }
    }
}

/// Summary of one warming run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmingReport {
    /// Number of tags in the warmed tag list.
    pub tags_warmed: usize,
    pub listings_warmed: usize,
    pub counts_warmed: usize,
    pub products_warmed: usize,
    /// Phases that stopped early.
    pub failed_phases: Vec<WarmPhase>,
    pub duration: Duration,
}

impl WarmingReport {
    /// True if every phase ran to completion.
    pub fn is_complete(&self) -> bool {
        self.failed_phases.is_empty()
    }
}

#[derive(Debug, Error)]
enum WarmError {
    #[error("authoritative service: {0}")]
    Service(#[from] CatalogueError),

    #[error("cache store: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Debug)]
struct PhaseOutcome {
    phase: WarmPhase,
    written: usize,
    counts: usize,
    error: Option<WarmError>,
}

impl PhaseOutcome {
    fn new(phase: WarmPhase) -> Self {
        Self {
            phase,
            written: 0,
            counts: 0,
            error: None,
        }
    }

    fn failed(mut self, error: WarmError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Pre-populates the cache from the authoritative service.
pub struct CacheWarmer<S, C>
where
    S: CatalogueService + ?Sized,
    C: CacheStore + ?Sized,
{
    service: Arc<S>,
    store: Arc<C>,
    keys: KeyDeriver,
    plan: Arc<WarmingPlan>,
    ttl: Duration,
    write_timeout: Duration,
    service_timeout: Duration,
}

impl<S, C> Clone for CacheWarmer<S, C>
where
    S: CatalogueService + ?Sized,
    C: CacheStore + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            store: Arc::clone(&self.store),
            keys: self.keys,
            plan: Arc::clone(&self.plan),
            ttl: self.ttl,
            write_timeout: self.write_timeout,
            service_timeout: self.service_timeout,
        }
    }
}

impl<S, C> CacheWarmer<S, C>
where
    S: CatalogueService + ?Sized + 'static,
    C: CacheStore + ?Sized + 'static,
{
    pub fn new(service: Arc<S>, store: Arc<C>, settings: &CacheSettings, plan: WarmingPlan) -> Self {
        Self {
            service,
            store,
            keys: KeyDeriver::new(settings.tag_ordering),
            plan: Arc::new(plan),
            ttl: settings.entry_ttl,
            write_timeout: settings.write_back_timeout,
            service_timeout: settings.service_timeout,
        }
    }

    pub fn plan(&self) -> &WarmingPlan {
        &self.plan
    }

    /// Run all three phases concurrently and wait for them to finish.
    pub async fn warm(&self) -> WarmingReport {
        let start = Instant::now();
        tracing::info!(
            listings = self.plan.listings.len(),
            product_sample = self.plan.product_sample_size,
            "Cache warming started"
        );

        let handles = [
            (WarmPhase::Tags, self.spawn_phase(|w| async move { w.warm_tags().await })),
            (
                WarmPhase::Listings,
                self.spawn_phase(|w| async move { w.warm_listings().await }),
            ),
            (
                WarmPhase::Products,
                self.spawn_phase(|w| async move { w.warm_products().await }),
            ),
        ];

        let mut report = WarmingReport::default();
        for (phase, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(phase = phase.as_str(), error = %e, "Warming phase aborted");
                    report.failed_phases.push(phase);
                    continue;
                }
            };

            match outcome.phase {
                WarmPhase::Tags => report.tags_warmed = outcome.written,
                WarmPhase::Listings => {
                    report.listings_warmed = outcome.written;
                    report.counts_warmed = outcome.counts;
                }
                WarmPhase::Products => report.products_warmed = outcome.written,
            }

            if let Some(e) = outcome.error {
                tracing::warn!(
                    phase = outcome.phase.as_str(),
                    warmed = outcome.written,
                    error = %e,
                    "Warming phase stopped early"
                );
                report.failed_phases.push(outcome.phase);
            }
        }

        report.duration = start.elapsed();
        tracing::info!(
            tags = report.tags_warmed,
            listings = report.listings_warmed,
            counts = report.counts_warmed,
            products = report.products_warmed,
            failed_phases = report.failed_phases.len(),
            duration_ms = report.duration.as_millis() as u64,
            "Cache warming completed"
        );
        report
    }

    /// Start a warming run on its own task.
    pub fn warm_in_background(&self) -> JoinHandle<WarmingReport> {
        let warmer = self.clone();
        tokio::spawn(async move { warmer.warm().await })
    }

    fn spawn_phase<F, Fut>(&self, run: F) -> JoinHandle<PhaseOutcome>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = PhaseOutcome> + Send + 'static,
    {
        tokio::spawn(run(self.clone()))
    }

    async fn warm_tags(&self) -> PhaseOutcome {
        let start = Instant::now();
        let outcome = PhaseOutcome::new(WarmPhase::Tags);

        let tags = match self.fetch("Tags", self.service.tags()).await {
            Ok(tags) => tags,
            Err(e) => return outcome.failed(e),
        };
        if let Err(e) = self.write(self.keys.tags_key(), &tags).await {
            return outcome.failed(e);
        }

        tracing::info!(
            count = tags.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Warmed tag list"
        );
        PhaseOutcome {
            written: tags.len(),
            ..outcome
        }
    }

    async fn warm_listings(&self) -> PhaseOutcome {
        let start = Instant::now();
        let mut outcome = PhaseOutcome::new(WarmPhase::Listings);

        for query in &self.plan.listings {
            if let Err(e) = self.warm_listing(query, &mut outcome).await {
                return outcome.failed(e);
            }
        }

        tracing::info!(
            listings = outcome.written,
            counts = outcome.counts,
            duration_ms = start.elapsed().as_millis() as u64,
            "Warmed product listings"
        );
        outcome
    }

    async fn warm_listing(
        &self,
        query: &ProductQuery,
        outcome: &mut PhaseOutcome,
    ) -> Result<(), WarmError> {
        let products = self.fetch("List", self.service.list(query)).await?;
        self.write(&self.keys.list_key(query), &products).await?;
        outcome.written += 1;

        let count = self.fetch("Count", self.service.count(&query.tags)).await?;
        self.write(&self.keys.count_key(&query.tags), &count).await?;
        outcome.counts += 1;

        tracing::debug!(
            tags = ?query.tags,
            order = %query.order,
            page_num = query.page_num,
            page_size = query.page_size,
            items = products.len(),
            "Warmed listing"
        );
        Ok(())
    }

    async fn warm_products(&self) -> PhaseOutcome {
        let start = Instant::now();
        let mut outcome = PhaseOutcome::new(WarmPhase::Products);
        if self.plan.product_sample_size == 0 {
            return outcome;
        }

        let first_page = ProductQuery::all(1, self.plan.product_sample_size);
        let sample = match self.fetch("List", self.service.list(&first_page)).await {
            Ok(sample) => sample,
            Err(e) => return outcome.failed(e),
        };

        for summary in &sample {
            let product = match self.fetch("Get", self.service.get(&summary.id)).await {
                Ok(product) => product,
                Err(e) => return outcome.failed(e),
            };
            if let Err(e) = self.write(&self.keys.product_key(&summary.id), &product).await {
                return outcome.failed(e);
            }
            outcome.written += 1;
        }

        tracing::info!(
            warmed = outcome.written,
            total = sample.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Warmed individual products"
        );
        outcome
    }

    async fn fetch<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, WarmError>
    where
        Fut: Future<Output = Result<T, CatalogueError>>,
    {
        match tokio::time::timeout(self.service_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(WarmError::Service(CatalogueError::Timeout {
                operation,
                after: self.service_timeout,
            })),
        }
    }

    async fn write<T: CacheValue>(&self, key: &str, value: &T) -> Result<(), WarmError> {
        let bytes = value.encode()?;
        match tokio::time::timeout(self.write_timeout, self.store.set(key, bytes, self.ttl)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(WarmError::Cache(CacheError::Timeout {
                operation: "SET",
                after: self.write_timeout,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_completeness() {
        let mut report = WarmingReport::default();
        assert!(report.is_complete());
        report.failed_phases.push(WarmPhase::Listings);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(WarmPhase::Tags.as_str(), "tags");
        assert_eq!(WarmPhase::Products.as_str(), "products");
    }
}
