//! Cached read coordinator.
//!
//! [`CachedCatalogue`] wraps an authoritative [`CatalogueService`] and serves
//! the four read operations through the cache first. Every operation follows
//! the same protocol:
//!
//! 1. Derive the key and read it from the store.
//! 2. On a hit, decode and return. A payload that does not decode is purged
//!    and treated as a miss.
//! 3. On a miss or a store failure, call the authoritative service and return
//!    its result. Successful results are written back on a detached task
//!    bounded by its own timeout.
//!
//! Store failures never reach the caller. Only authoritative errors do, and
//! those are never written to the cache.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use catalogue_core::{
    CatalogueError, CatalogueResult, CatalogueService, HealthEntry, HealthStatus, Product,
    ProductQuery,
};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::codec::CacheValue;
use crate::config::CacheSettings;
use crate::constants::{METRICS_HEALTH_NAME, SCAN_BATCH_SIZE, WRITE_BACK_CHANNEL_CAPACITY};
use crate::error::CacheResult;
use crate::keys::{KeyDeriver, TagOrdering};
use crate::metrics::{CacheMetrics, CacheOutcome, OperationKind};
use crate::store::{scan_keys_by_prefix, CacheStore};

// ============================================================================
// WRITE-BACK EVENTS
// ============================================================================

/// How a background write-back ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteBackOutcome {
    /// The value was stored with the configured TTL.
    Stored,
    /// The store rejected the write.
    Failed(String),
    /// The write did not finish within the write-back timeout.
    TimedOut,
    /// The value could not be serialized; nothing was written.
    EncodeFailed(String),
}

impl WriteBackOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored)
    }
}

/// Completion notice for one background write-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBackEvent {
    pub key: String,
    pub operation: OperationKind,
    pub outcome: WriteBackOutcome,
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Read-through cache in front of an authoritative catalogue service.
///
/// # Type Parameters
///
/// - `S`: The authoritative service consulted on miss
/// - `C`: The cache store
pub struct CachedCatalogue<S, C>
where
    S: CatalogueService + ?Sized,
    C: CacheStore + ?Sized,
{
    service: Arc<S>,
    store: Arc<C>,
    metrics: Arc<CacheMetrics>,
    keys: KeyDeriver,
    settings: CacheSettings,
    write_backs: broadcast::Sender<WriteBackEvent>,
}

impl<S, C> Clone for CachedCatalogue<S, C>
where
    S: CatalogueService + ?Sized,
    C: CacheStore + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            store: Arc::clone(&self.store),
            metrics: Arc::clone(&self.metrics),
            keys: self.keys,
            settings: self.settings.clone(),
            write_backs: self.write_backs.clone(),
        }
    }
}

impl<S, C> CachedCatalogue<S, C>
where
    S: CatalogueService + ?Sized + 'static,
    C: CacheStore + ?Sized + 'static,
{
    /// Create a coordinator with its own metrics recorder.
    pub fn new(service: Arc<S>, store: Arc<C>, settings: CacheSettings) -> Self {
        Self::with_metrics(service, store, Arc::new(CacheMetrics::new()), settings)
    }

    /// Create a coordinator that records into a shared metrics recorder.
    pub fn with_metrics(
        service: Arc<S>,
        store: Arc<C>,
        metrics: Arc<CacheMetrics>,
        settings: CacheSettings,
    ) -> Self {
        if settings.tag_ordering == TagOrdering::Sorted {
            tracing::info!("Tag order normalisation enabled for cache keys");
        }
        let (write_backs, _) = broadcast::channel(WRITE_BACK_CHANNEL_CAPACITY);
        Self {
            service,
            store,
            metrics,
            keys: KeyDeriver::new(settings.tag_ordering),
            settings,
            write_backs,
        }
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn keys(&self) -> &KeyDeriver {
        &self.keys
    }

    pub fn store(&self) -> &Arc<C> {
        &self.store
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Receive a notice for every background write-back started after this
    /// call.
    pub fn subscribe_write_backs(&self) -> broadcast::Receiver<WriteBackEvent> {
        self.write_backs.subscribe()
    }

    /// Delete the cached entry for one product. Returns how many keys existed.
    pub async fn invalidate_product(&self, id: &str) -> CacheResult<u64> {
        let key = self.keys.product_key(id);
        let removed = self.store.delete(&[key.clone()]).await?;
        tracing::debug!(key = %key, removed, "Invalidated cached product");
        Ok(removed)
    }

    /// Delete every entry in the catalogue namespace. Returns how many keys
    /// were removed.
    pub async fn invalidate_all(&self) -> CacheResult<u64> {
        let keys = scan_keys_by_prefix(self.store.as_ref(), self.keys.namespace(), SCAN_BATCH_SIZE)
            .await?;

        let mut removed = 0u64;
        for batch in keys.chunks(SCAN_BATCH_SIZE) {
            removed += self.store.delete(batch).await?;
        }

        tracing::info!(scanned = keys.len(), removed, "Invalidated catalogue cache");
        Ok(removed)
    }

    /// Run one authoritative call under the service timeout.
    async fn call_authoritative<T, Fut>(&self, op: OperationKind, fut: Fut) -> CatalogueResult<T>
    where
        Fut: Future<Output = CatalogueResult<T>>,
    {
        let after = self.settings.service_timeout;
        match tokio::time::timeout(after, fut).await {
            Ok(result) => result,
            Err(_) => Err(CatalogueError::Timeout {
                operation: op.as_str(),
                after,
            }),
        }
    }

    async fn read_through<T, F, Fut>(
        &self,
        op: OperationKind,
        key: String,
        fetch: F,
    ) -> CatalogueResult<T>
    where
        T: CacheValue,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = CatalogueResult<T>> + Send,
    {
        let start = Instant::now();

        let outcome = match self.store.get(&key).await {
            Ok(Some(bytes)) => match T::decode(&bytes) {
                Ok(value) => {
                    let elapsed = start.elapsed();
                    self.metrics.record_hit(op, elapsed);
                    tracing::debug!(
                        operation = %op,
                        key = %key,
                        outcome = %CacheOutcome::Hit,
                        items = value.item_count(),
                        duration_ms = millis(elapsed),
                        "Served from cache"
                    );
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(operation = %op, key = %key, error = %e, "Corrupted cache entry");
                    self.purge(&key).await;
                    CacheOutcome::Miss
                }
            },
            Ok(None) => CacheOutcome::Miss,
            Err(e) => {
                self.metrics.record_error(op, start.elapsed());
                tracing::warn!(
                    operation = %op,
                    key = %key,
                    error = %e,
                    "Cache read failed, falling back to authoritative service"
                );
                CacheOutcome::Error
            }
        };

        // Every fallback round-trip counts as a miss, including one that
        // followed a store error or ended in an authoritative error.
        let result = self.call_authoritative(op, fetch()).await;
        let elapsed = start.elapsed();
        self.metrics.record_miss(op, elapsed);

        match result {
            Ok(value) => {
                tracing::debug!(
                    operation = %op,
                    key = %key,
                    outcome = %outcome,
                    items = value.item_count(),
                    duration_ms = millis(elapsed),
                    "Served from authoritative service"
                );
                self.spawn_write_back(op, key, &value);
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(
                    operation = %op,
                    key = %key,
                    outcome = %outcome,
                    error = %e,
                    duration_ms = millis(elapsed),
                    "Authoritative service failed"
                );
                Err(e)
            }
        }
    }

    /// Best-effort removal of an undecodable entry.
    async fn purge(&self, key: &str) {
        if let Err(e) = self.store.delete(&[key.to_string()]).await {
            tracing::warn!(key = %key, error = %e, "Failed to purge corrupted cache entry");
        }
    }

    /// Write `value` under `key` on a detached task.
    ///
    /// The task is bounded by the write-back timeout and never observed by
    /// the request that triggered it. Completion is reported on the
    /// write-back channel.
    fn spawn_write_back<T: CacheValue>(&self, op: OperationKind, key: String, value: &T) {
        let bytes = match value.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(operation = %op, key = %key, error = %e, "Failed to encode value for cache");
                let _ = self.write_backs.send(WriteBackEvent {
                    key,
                    operation: op,
                    outcome: WriteBackOutcome::EncodeFailed(e.to_string()),
                });
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let events = self.write_backs.clone();
        let ttl = self.settings.entry_ttl;
        let bound = self.settings.write_back_timeout;

        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(bound, store.set(&key, bytes, ttl)).await {
                Ok(Ok(())) => {
                    tracing::trace!(operation = %op, key = %key, "Cached authoritative result");
                    WriteBackOutcome::Stored
                }
                Ok(Err(e)) => {
                    tracing::warn!(operation = %op, key = %key, error = %e, "Cache write-back failed");
                    WriteBackOutcome::Failed(e.to_string())
                }
                Err(_) => {
                    tracing::warn!(
                        operation = %op,
                        key = %key,
                        timeout_ms = millis(bound),
                        "Cache write-back timed out"
                    );
                    WriteBackOutcome::TimedOut
                }
            };
            // No subscribers is the normal case.
            let _ = events.send(WriteBackEvent {
                key,
                operation: op,
                outcome,
            });
        });
    }

    async fn cache_health(&self) -> HealthStatus {
        let bound = self.settings.health_ping_timeout;
        match tokio::time::timeout(bound, self.store.ping()).await {
            Ok(Ok(())) => HealthStatus::Ok,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Cache health ping failed");
                HealthStatus::Err
            }
            Err(_) => {
                tracing::warn!(timeout_ms = millis(bound), "Cache health ping timed out");
                HealthStatus::Err
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl<S, C> CatalogueService for CachedCatalogue<S, C>
where
    S: CatalogueService + ?Sized + 'static,
    C: CacheStore + ?Sized + 'static,
{
    async fn list(&self, query: &ProductQuery) -> CatalogueResult<Vec<Product>> {
        let key = self.keys.list_key(query);
        self.read_through(OperationKind::List, key, || self.service.list(query))
            .await
    }

    async fn get(&self, id: &str) -> CatalogueResult<Product> {
        let key = self.keys.product_key(id);
        self.read_through(OperationKind::Get, key, || self.service.get(id))
            .await
    }

    async fn count(&self, tags: &[String]) -> CatalogueResult<u64> {
        let key = self.keys.count_key(tags);
        self.read_through(OperationKind::Count, key, || self.service.count(tags))
            .await
    }

    async fn tags(&self) -> CatalogueResult<Vec<String>> {
        let key = self.keys.tags_key().to_string();
        self.read_through(OperationKind::Tags, key, || self.service.tags())
            .await
    }

    async fn health(&self) -> Vec<HealthEntry> {
        let mut entries = match tokio::time::timeout(
            self.settings.service_timeout,
            self.service.health(),
        )
        .await
        {
            Ok(entries) => entries,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = millis(self.settings.service_timeout),
                    "Authoritative health check timed out"
                );
                Vec::new()
            }
        };

        let status = self.cache_health().await;
        entries.push(HealthEntry::now(self.settings.health_service_name.clone(), status));

        if self.settings.report_metrics_health {
            self.metrics.snapshot().log("Cache performance at health check");
            entries.push(HealthEntry::ok(METRICS_HEALTH_NAME));
        }

        entries
    }
}
