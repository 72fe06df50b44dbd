//! Utility modules for the epg-merge service
//!
//! Reusable helpers shared by the cache, merge and job layers.

pub mod cron_helper;
pub mod decompression;
pub mod http_client;
pub mod human_format;
pub mod memory_monitor;

// Re-export commonly used types for convenience
pub use decompression::{CompressionFormat, DecompressionService};
pub use http_client::{SourceFetcher, StandardHttpClient};
pub use memory_monitor::MemorySampler;
