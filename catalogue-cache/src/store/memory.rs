//! In-process cache store.
//!
//! A `DashMap`-backed [`CacheStore`] that honours TTLs and supports cursor
//! scans. Used for local development and as the reference store in tests.
//! Expiry uses `tokio::time::Instant`, so paused test clocks apply.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::traits::{CacheStore, ScanPage};
use crate::error::CacheResult;

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl StoredEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory cache store with TTL support.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: DashMap<String, StoredEntry>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.value().is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` holds a live entry.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|e| e.is_live(Instant::now()))
            .unwrap_or(false)
    }

    /// Raw bytes stored under `key`, if live. An expired entry found here
    /// is dropped.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        // The shard guard is released; re-check in case a writer refreshed it.
        self.entries.remove_if(key, |_, e| !e.is_live(now));
        None
    }

    /// Remaining time-to-live of `key`, if live.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.expires_at - now)
    }

    /// All live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_live(now))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        before - self.entries.len()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        let now = Instant::now();
        let mut removed = 0u64;
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(key) {
                if entry.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn scan_prefix(&self, prefix: &str, cursor: u64, count: usize) -> CacheResult<ScanPage> {
        let matching: Vec<String> = self
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect();

        let start = (cursor as usize).min(matching.len());
        let end = start.saturating_add(count.max(1)).min(matching.len());
        let next_cursor = (end < matching.len()).then_some(end as u64);

        Ok(ScanPage {
            keys: matching[start..end].to_vec(),
            next_cursor,
        })
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::scan_keys_by_prefix;

    const TTL: Duration = Duration::from_secs(1800);

    #[tokio::test]
    async fn test_absent_is_not_an_error() {
        let store = InMemoryCacheStore::new();
        assert_eq!(store.get("catalogue:product:nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = InMemoryCacheStore::new();
        store.set("k", b"v".to_vec(), TTL).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = InMemoryCacheStore::new();
        store.set("k", b"v".to_vec(), Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.contains_key("k"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        // the read dropped the dead entry
        assert!(store.entries.is_empty());
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_sweeps_unread_entries() {
        let store = InMemoryCacheStore::new();
        store.set("a", b"1".to_vec(), Duration::from_secs(5)).await.unwrap();
        store.set("b", b"2".to_vec(), Duration::from_secs(5)).await.unwrap();
        store.set("c", b"3".to_vec(), TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.entries.len(), 3);
        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.keys(), vec!["c".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshed_entry_survives_expired_read() {
        let store = InMemoryCacheStore::new();
        store.set("k", b"old".to_vec(), Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        store.set("k", b"new".to_vec(), TTL).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.entries.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_set_refreshes_ttl() {
        let store = InMemoryCacheStore::new();
        store.set("k", b"v".to_vec(), TTL).await.unwrap();
        tokio::time::advance(Duration::from_secs(600)).await;
        store.set("k", b"v".to_vec(), TTL).await.unwrap();

        assert_eq!(store.raw("k"), Some(b"v".to_vec()));
        assert_eq!(store.ttl_remaining("k"), Some(TTL));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_counts_existing_keys() {
        let store = InMemoryCacheStore::new();
        store.set("a", b"1".to_vec(), TTL).await.unwrap();
        let removed = store
            .delete(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_scan_pages_through_prefix() {
        let store = InMemoryCacheStore::new();
        for i in 0..7 {
            store
                .set(&format!("catalogue:product:{}", i), b"{}".to_vec(), TTL)
                .await
                .unwrap();
        }
        store.set("other:key", b"x".to_vec(), TTL).await.unwrap();

        let first = store.scan_prefix("catalogue:", 0, 3).await.unwrap();
        assert_eq!(first.keys.len(), 3);
        assert_eq!(first.next_cursor, Some(3));

        // resuming from a cursor continues where the last page stopped
        let second = store.scan_prefix("catalogue:", 3, 3).await.unwrap();
        assert_eq!(second.keys[0], "catalogue:product:3");

        let all = scan_keys_by_prefix(&store, "catalogue:", 3).await.unwrap();
        assert_eq!(all.len(), 7);
        assert!(all.iter().all(|k| k.starts_with("catalogue:")));
    }
}
