//! Catalogue Test Utilities
//!
//! Shared test infrastructure for the catalogue workspace:
//! - A stub authoritative service with call counters and injectable failures
//! - Fault-injecting cache stores
//! - Proptest generators for catalogue types
//! - Fixtures for common scenarios
//! - Custom assertions

pub use catalogue_cache::{
    CacheError, CacheResult, CacheStore, CachedCatalogue, InMemoryCacheStore, ScanPage,
    WriteBackEvent, WriteBackOutcome,
};
pub use catalogue_core::{
    CatalogueError, CatalogueResult, CatalogueService, HealthEntry, Product, ProductQuery,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// STUB AUTHORITATIVE SERVICE
// ============================================================================

/// Operations of [`StubCatalogue`], for counters and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubOp {
    List,
    Get,
    Count,
    Tags,
    Health,
}

#[derive(Debug, Default)]
struct CallCounters {
    list: AtomicUsize,
    get: AtomicUsize,
    count: AtomicUsize,
    tags: AtomicUsize,
    health: AtomicUsize,
}

impl CallCounters {
    fn counter(&self, op: StubOp) -> &AtomicUsize {
        match op {
            StubOp::List => &self.list,
            StubOp::Get => &self.get,
            StubOp::Count => &self.count,
            StubOp::Tags => &self.tags,
            StubOp::Health => &self.health,
        }
    }
}

/// In-memory authoritative catalogue.
///
/// Serves a fixed product set, counts every call per operation, and can be
/// told to fail or stall specific operations.
#[derive(Debug, Default)]
pub struct StubCatalogue {
    products: Vec<Product>,
    tags: Vec<String>,
    calls: CallCounters,
    failures: Mutex<HashMap<StubOp, CatalogueError>>,
    delay: Mutex<Option<Duration>>,
}

impl StubCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(mut self, products: Vec<Product>) -> Self {
        self.products = products;
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Make every later call to `op` fail with `error`.
    pub fn fail(&self, op: StubOp, error: CatalogueError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(op, error);
    }

    /// Stop failing `op`.
    pub fn recover(&self, op: StubOp) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&op);
    }

    /// Sleep this long inside every data call.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Number of calls made to `op`.
    pub fn calls(&self, op: StubOp) -> usize {
        self.calls.counter(op).load(Ordering::SeqCst)
    }

    /// Number of data calls (everything but health).
    pub fn data_calls(&self) -> usize {
        [StubOp::List, StubOp::Get, StubOp::Count, StubOp::Tags]
            .iter()
            .map(|op| self.calls(*op))
            .sum()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn tag_list(&self) -> &[String] {
        &self.tags
    }

    /// Products matching `query`, sorted and paginated the way a real store would.
    pub fn expected_page(&self, query: &ProductQuery) -> Vec<Product> {
        let mut matching: Vec<Product> = self
            .products
            .iter()
            .filter(|p| p.has_all_tags(&query.tags))
            .cloned()
            .collect();

        match query.order.as_str() {
            "price" => matching.sort_by(|a, b| a.price.total_cmp(&b.price)),
            "name" => matching.sort_by(|a, b| a.name.cmp(&b.name)),
            _ => {}
        }

        matching
            .into_iter()
            .skip(query.offset())
            .take(query.page_size as usize)
            .collect()
    }

    async fn enter(&self, op: StubOp) -> CatalogueResult<()> {
        self.calls.counter(op).fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&op)
            .cloned();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogueService for StubCatalogue {
    async fn list(&self, query: &ProductQuery) -> CatalogueResult<Vec<Product>> {
        self.enter(StubOp::List).await?;
        Ok(self.expected_page(query))
    }

    async fn get(&self, id: &str) -> CatalogueResult<Product> {
        self.enter(StubOp::Get).await?;
        self.products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| CatalogueError::not_found(id))
    }

    async fn count(&self, tags: &[String]) -> CatalogueResult<u64> {
        self.enter(StubOp::Count).await?;
        Ok(self.products.iter().filter(|p| p.has_all_tags(tags)).count() as u64)
    }

    async fn tags(&self) -> CatalogueResult<Vec<String>> {
        self.enter(StubOp::Tags).await?;
        Ok(self.tags.clone())
    }

    async fn health(&self) -> Vec<HealthEntry> {
        self.calls.counter(StubOp::Health).fetch_add(1, Ordering::SeqCst);
        vec![HealthEntry::ok("catalogue"), HealthEntry::ok("catalogue-db")]
    }
}

// ============================================================================
// FAULT-INJECTING CACHE STORES
// ============================================================================

/// A cache store whose every call fails.
#[derive(Debug)]
pub struct FailingCacheStore {
    error: CacheError,
    calls: AtomicUsize,
}

impl Default for FailingCacheStore {
    fn default() -> Self {
        Self::new(CacheError::Connection("connection refused".to_string()))
    }
}

impl FailingCacheStore {
    pub fn new(error: CacheError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> CacheResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.fail()
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> CacheResult<()> {
        self.fail()
    }

    async fn delete(&self, _keys: &[String]) -> CacheResult<u64> {
        self.fail()
    }

    async fn scan_prefix(&self, _prefix: &str, _cursor: u64, _count: usize) -> CacheResult<ScanPage> {
        self.fail()
    }

    async fn ping(&self) -> CacheResult<()> {
        self.fail()
    }
}

/// A reachable store that never retains anything: every read misses.
#[derive(Debug, Default)]
pub struct ForgetfulCacheStore {
    writes: AtomicUsize,
}

impl ForgetfulCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes accepted and discarded.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for ForgetfulCacheStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> CacheResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, _keys: &[String]) -> CacheResult<u64> {
        Ok(0)
    }

    async fn scan_prefix(&self, _prefix: &str, _cursor: u64, _count: usize) -> CacheResult<ScanPage> {
        Ok(ScanPage::default())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// A store holding one undecodable payload under every key, whose deletes
/// always fail. Writes are accepted and counted but never change what `get`
/// returns.
#[derive(Debug)]
pub struct CorruptedCacheStore {
    payload: Vec<u8>,
    writes: AtomicUsize,
    delete_attempts: AtomicUsize,
}

impl Default for CorruptedCacheStore {
    fn default() -> Self {
        Self::new(b"{\"truncated".to_vec())
    }
}

impl CorruptedCacheStore {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            writes: AtomicUsize::new(0),
            delete_attempts: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for CorruptedCacheStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(Some(self.payload.clone()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> CacheResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, _keys: &[String]) -> CacheResult<u64> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Command {
            command: "DEL",
            reason: "READONLY You can't write against a read only replica".to_string(),
        })
    }

    async fn scan_prefix(&self, _prefix: &str, _cursor: u64, _count: usize) -> CacheResult<ScanPage> {
        Ok(ScanPage::default())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// Wraps a store and delays every call before forwarding it.
#[derive(Debug)]
pub struct SlowCacheStore<C> {
    inner: Arc<C>,
    delay: Duration,
}

impl<C: CacheStore> SlowCacheStore<C> {
    pub fn new(inner: Arc<C>, delay: Duration) -> Self {
        Self { inner, delay }
    }

    pub fn inner(&self) -> &Arc<C> {
        &self.inner
    }
}

#[async_trait]
impl<C: CacheStore> CacheStore for SlowCacheStore<C> {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(keys).await
    }

    async fn scan_prefix(&self, prefix: &str, cursor: u64, count: usize) -> CacheResult<ScanPage> {
        tokio::time::sleep(self.delay).await;
        self.inner.scan_prefix(prefix, cursor, count).await
    }

    async fn ping(&self) -> CacheResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.ping().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for catalogue types.

    use super::*;
    use proptest::prelude::*;

    /// A tag. Never the literal `all`, which stands for "no filter" in keys.
    pub fn arb_tag() -> impl Strategy<Value = String> {
        "[a-z]{1,10}".prop_filter("reserved segment", |t| t != "all")
    }

    pub fn arb_tags() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_tag(), 0..4)
    }

    pub fn arb_order() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            Just("price".to_string()),
            Just("name".to_string()),
        ]
    }

    pub fn arb_query() -> impl Strategy<Value = ProductQuery> {
        (arb_tags(), arb_order(), 1u32..20, 1u32..50).prop_map(|(tags, order, page_num, page_size)| {
            ProductQuery::all(page_num, page_size)
                .with_tags(tags)
                .with_order(order)
        })
    }

    pub fn arb_product() -> impl Strategy<Value = Product> {
        (
            "[a-f0-9]{8}-[a-f0-9]{4}",
            "[A-Za-z ]{1,24}",
            ".{0,60}",
            0.0f32..500.0,
            0i32..1000,
            arb_tags(),
        )
            .prop_map(|(id, name, description, price, count, tags)| Product {
                image_url: vec![format!("/catalogue/images/{}.jpg", id)],
                id,
                name,
                description,
                price,
                count,
                tags,
            })
    }

    /// Products with distinct ids.
    pub fn arb_products(max: usize) -> impl Strategy<Value = Vec<Product>> {
        prop::collection::vec(arb_product(), 0..max).prop_map(|mut products| {
            let mut seen = std::collections::HashSet::new();
            products.retain(|p| seen.insert(p.id.clone()));
            products
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;

    /// The tags every fixture product draws from.
    pub const FIXTURE_TAGS: [&str; 3] = ["brown", "blue", "geek"];

    /// A deterministic product. `i` picks its id, price and tag.
    pub fn product_fixture(i: usize) -> Product {
        let tag = FIXTURE_TAGS[i % FIXTURE_TAGS.len()];
        Product {
            id: format!("product-{:03}", i),
            name: format!("Sock {}", i),
            description: format!("Fixture product number {}", i),
            image_url: vec![format!("/catalogue/images/sock-{}.jpg", i)],
            price: 5.0 + (i % 7) as f32 * 2.5,
            count: (i * 3) as i32,
            tags: vec![tag.to_string()],
        }
    }

    /// `n` fixture products.
    pub fn products(n: usize) -> Vec<Product> {
        (0..n).map(product_fixture).collect()
    }

    /// A stub catalogue with 10 products and the 3 fixture tags.
    pub fn stub_catalogue() -> StubCatalogue {
        StubCatalogue::new()
            .with_products(products(10))
            .with_tags(FIXTURE_TAGS)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for catalogue results and write-back events.

    use super::*;
    use tokio::sync::broadcast;

    /// Assert that a result is a NotFound error for `id`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &CatalogueResult<T>, id: &str) {
        match result {
            Err(CatalogueError::NotFound { id: got }) => {
                assert_eq!(got, id, "Wrong id in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", id, other),
        }
    }

    /// Wait for the next write-back event, failing the test after `within`.
    pub async fn next_write_back(
        rx: &mut broadcast::Receiver<WriteBackEvent>,
        within: Duration,
    ) -> WriteBackEvent {
        match tokio::time::timeout(within, rx.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => panic!("write-back channel failed: {:?}", e),
            Err(_) => panic!("no write-back within {:?}", within),
        }
    }

    /// Wait for the next write-back and assert it stored `key`.
    pub async fn expect_stored(rx: &mut broadcast::Receiver<WriteBackEvent>, key: &str) {
        let event = next_write_back(rx, Duration::from_secs(5)).await;
        assert_eq!(event.key, key, "write-back for unexpected key");
        assert_eq!(event.outcome, WriteBackOutcome::Stored, "write-back did not store");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_stub_filters_and_paginates() {
        let stub = fixtures::stub_catalogue();
        let blue = stub
            .list(&ProductQuery::all(1, 6).with_tags(["blue"]))
            .await
            .unwrap();
        assert!(!blue.is_empty());
        assert!(blue.iter().all(|p| p.tags.contains(&"blue".to_string())));

        let second_page = stub.list(&ProductQuery::all(2, 6)).await.unwrap();
        assert_eq!(second_page.len(), 4);
        assert_eq!(stub.calls(StubOp::List), 2);
    }

    #[tokio::test]
    async fn test_stub_sorts_by_price() {
        let stub = fixtures::stub_catalogue();
        let page = stub
            .list(&ProductQuery::all(1, 10).with_order("price"))
            .await
            .unwrap();
        assert!(page.windows(2).all(|w| w[0].price <= w[1].price));
    }

    #[tokio::test]
    async fn test_stub_failure_injection() {
        let stub = fixtures::stub_catalogue();
        stub.fail(StubOp::Tags, CatalogueError::storage("db down"));
        assert_eq!(
            stub.tags().await.unwrap_err(),
            CatalogueError::storage("db down")
        );
        stub.recover(StubOp::Tags);
        assert_eq!(stub.tags().await.unwrap().len(), 3);
        assert_eq!(stub.calls(StubOp::Tags), 2);
    }

    #[tokio::test]
    async fn test_stub_get_unknown_id() {
        let stub = fixtures::stub_catalogue();
        assertions::assert_not_found(&stub.get("nope").await, "nope");
    }

    #[tokio::test]
    async fn test_failing_store_fails_everything() {
        let store = FailingCacheStore::default();
        assert!(store.get("k").await.is_err());
        assert!(store.ping().await.is_err());
        assert_eq!(store.calls(), 2);
    }

    #[test]
    fn test_fixture_products_are_distinct() {
        let products = fixtures::products(10);
        let ids: std::collections::HashSet<_> = products.iter().map(|p| &p.id).collect();
        assert_eq!(ids.len(), 10);
    }

    proptest! {
        #[test]
        fn prop_generated_tags_avoid_reserved_segment(tags in generators::arb_tags()) {
            prop_assert!(tags.iter().all(|t| t != "all"));
        }

        #[test]
        fn prop_generated_queries_have_positive_pages(query in generators::arb_query()) {
            prop_assert!(query.page_num >= 1);
            prop_assert!(query.page_size >= 1);
        }
    }
}
