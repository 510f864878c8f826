//! The catalogue read contract.

use async_trait::async_trait;

use crate::{CatalogueResult, HealthEntry, Product, ProductQuery};

/// Read operations exposed by a catalogue service.
///
/// Implemented by the authoritative store client and by the caching wrapper
/// around it. Implementations must be thread-safe; a single instance serves
/// all concurrent requests.
#[async_trait]
pub trait CatalogueService: Send + Sync {
    /// List one page of products matching `query`.
    async fn list(&self, query: &ProductQuery) -> CatalogueResult<Vec<Product>>;

    /// Fetch a single product by id.
    ///
    /// Returns [`crate::CatalogueError::NotFound`] if no such product exists.
    async fn get(&self, id: &str) -> CatalogueResult<Product>;

    /// Count products carrying every tag in `tags`.
    async fn count(&self, tags: &[String]) -> CatalogueResult<u64>;

    /// List all distinct tags.
    async fn tags(&self) -> CatalogueResult<Vec<String>>;

    /// Report the health of this service and its dependencies.
    async fn health(&self) -> Vec<HealthEntry>;
}
