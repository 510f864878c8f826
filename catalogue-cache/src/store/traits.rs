//! Cache store trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheResult;

/// One page of a prefix scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Keys found in this page. May be empty even when more pages follow.
    pub keys: Vec<String>,
    /// Cursor to resume from, or `None` when the scan is complete.
    pub next_cursor: Option<u64>,
}

/// Remote key-value store used for caching.
///
/// Implementations must be thread-safe and bound every call by a timeout so
/// that a degraded store never stalls the caller indefinitely.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a value.
    ///
    /// Returns `Ok(None)` if the key is definitely absent and `Err` if the
    /// store could not be consulted.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Write a value with a time-to-live, overwriting any existing entry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;

    /// Delete keys. Returns how many existed.
    async fn delete(&self, keys: &[String]) -> CacheResult<u64>;

    /// Scan one page of keys starting with `prefix`, resuming from `cursor`
    /// (0 starts a new scan).
    async fn scan_prefix(&self, prefix: &str, cursor: u64, count: usize) -> CacheResult<ScanPage>;

    /// Check that the store is reachable.
    async fn ping(&self) -> CacheResult<()>;
}

/// Collect every key starting with `prefix`, following the scan cursor to
/// completion.
pub async fn scan_keys_by_prefix<C>(store: &C, prefix: &str, batch: usize) -> CacheResult<Vec<String>>
where
    C: CacheStore + ?Sized,
{
    let mut keys = Vec::new();
    let mut cursor = 0u64;
    loop {
        let page = store.scan_prefix(prefix, cursor, batch).await?;
        keys.extend(page.keys);
        match page.next_cursor {
            Some(next) => cursor = next,
            None => break,
        }
    }
    // SCAN may report a key more than once
    keys.sort();
    keys.dedup();
    Ok(keys)
}
