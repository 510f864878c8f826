//! Catalogue Core - Entity Types and Service Contract
//!
//! Pure data structures plus the trait every catalogue read path implements.
//! The caching layer in `catalogue-cache` wraps any [`CatalogueService`] and
//! exposes the same trait, so callers cannot tell a cached service from the
//! authoritative one.

pub mod entities;
pub mod error;
pub mod health;
pub mod service;

pub use entities::{Product, ProductQuery};
pub use error::{CatalogueError, CatalogueResult};
pub use health::{HealthEntry, HealthStatus};
pub use service::CatalogueService;
