//! Catalogue Cache - Read-Through Caching for the Product Catalogue
//!
//! Wraps any [`CatalogueService`](catalogue_core::CatalogueService) with a
//! key-value cache:
//!
//! - [`KeyDeriver`]: deterministic keys for every read
//! - [`CacheStore`]: the store contract, with Redis and in-memory backends
//! - [`CacheMetrics`]: hit/miss/error counters and timings
//! - [`CachedCatalogue`]: the read-through coordinator
//! - [`CacheWarmer`]: background pre-population
//! - [`CacheRuntime`]: wiring plus the periodic background loops

pub mod codec;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod jobs;
pub mod keys;
pub mod metrics;
pub mod runtime;
pub mod store;
pub mod telemetry;
pub mod warmer;

pub use codec::CacheValue;
pub use config::{CacheSettings, WarmingPlan};
pub use coordinator::{CachedCatalogue, WriteBackEvent, WriteBackOutcome};
pub use error::{CacheError, CacheResult, ConfigError};
pub use jobs::{metrics_logging_task, periodic_warming_task};
pub use keys::{KeyDeriver, TagOrdering};
pub use metrics::{CacheMetrics, CacheOutcome, MetricsSnapshot, OperationKind};
pub use runtime::CacheRuntime;
pub use store::{scan_keys_by_prefix, CacheStore, InMemoryCacheStore, RedisCacheStore, ScanPage};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
pub use warmer::{CacheWarmer, WarmPhase, WarmingReport};
