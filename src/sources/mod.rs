//! Upstream feed acquisition

pub mod cache;

pub use cache::{CacheStats, SourceCacheManager};
