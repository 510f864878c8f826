//! Cache store backends.
//!
//! [`CacheStore`] is the narrow contract the coordinator and warmer need from
//! a remote key-value store: get, set with TTL, delete, cursor-based prefix
//! scan and ping. "Absent" (`Ok(None)`) and "could not tell" (`Err`) are
//! always distinct outcomes.

pub mod memory;
pub mod redis_store;
pub mod traits;

pub use memory::InMemoryCacheStore;
pub use redis_store::RedisCacheStore;
pub use traits::{scan_keys_by_prefix, CacheStore, ScanPage};
