//! Cache module for VCS Facade.
//!
//! Query-path repository resolution goes through a TTL cache built on
//! Moka. Reconciliation scans resolve repositories directly.

pub mod keys;
pub mod repository_cache;

// Re-exports
pub use keys::RepositoryKey;
pub use repository_cache::{CacheConfig, RepositoryCache};
