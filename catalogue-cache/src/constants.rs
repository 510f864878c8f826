//! Constants for the catalogue cache
//!
//! Default values used by [`crate::CacheSettings`] and the key deriver.
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// KEY FORMAT
// ============================================================================

/// Namespace shared by every cache key this crate writes.
pub const KEY_NAMESPACE: &str = "catalogue:";

/// Placeholder used in list/count keys when no tag filter is given.
pub const ALL_TAGS_SEGMENT: &str = "all";

/// The single key holding the distinct tag list.
pub const TAGS_KEY: &str = "catalogue:tags:all";

// ============================================================================
// TIMEOUTS
// ============================================================================

/// Default TTL for every cache entry kind (30 minutes)
pub const DEFAULT_ENTRY_TTL_SECS: u64 = 1800;

/// Default connect timeout for the cache store
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Default read/write timeout for interactive cache calls
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 3_000;

/// Default bound on a background write-back
pub const DEFAULT_WRITE_BACK_TIMEOUT_MS: u64 = 5_000;

/// Default bound on the health-check ping
pub const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 3_000;

/// Default bound on a call to the authoritative service
pub const DEFAULT_SERVICE_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// BACKGROUND JOBS
// ============================================================================

/// Default interval between periodic metric emissions (5 minutes)
pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 300;

/// Number of products fetched individually during warming
pub const DEFAULT_WARM_PRODUCT_SAMPLE: u32 = 10;

/// Batch size for prefix scans
pub const SCAN_BATCH_SIZE: usize = 100;

/// Capacity of the write-back event channel
pub const WRITE_BACK_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// HEALTH
// ============================================================================

/// Service name reported for the cache store in health checks
pub const DEFAULT_CACHE_HEALTH_NAME: &str = "catalogue-redis";

/// Service name reported for the metrics entry in health checks
pub const METRICS_HEALTH_NAME: &str = "catalogue-metrics";

/// Default cache store address
pub const DEFAULT_REDIS_URL: &str = "redis://redis:6379";
