use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

pub mod feed;
pub mod job;

pub use feed::{FeedType, Timeframe};
pub use job::{JobRecord, JobStatus};

/// One remote feed file requested for a merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub remote_url: String,
    pub local_cache_path: PathBuf,
}

/// A cached source file available for merging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source: SourceDescriptor,
    pub modified_at: DateTime<Utc>,
    pub size_bytes: u64,
    /// How this entry was obtained during the fetch that produced it
    pub origin: CacheOrigin,
}

impl CacheEntry {
    pub fn path(&self) -> &std::path::Path {
        &self.source.local_cache_path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOrigin {
    /// Young enough to reuse without asking the server
    Fresh,
    /// Older than the freshness window but the server reported the same size
    Revalidated,
    /// Downloaded during this fetch
    Downloaded,
}

/// Outcome of one merge pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    pub output_path: PathBuf,
    pub channels_included: u64,
    pub programs_included: u64,
    pub byte_size: u64,
    pub days_included: u32,
}

impl MergeResult {
    pub fn meta(&self) -> ArchiveMeta {
        ArchiveMeta {
            channels: self.channels_included,
            programs: self.programs_included,
            days_included: self.days_included,
        }
    }
}

/// Counts recorded alongside a promoted or archived file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMeta {
    pub channels: u64,
    pub programs: u64,
    pub days_included: u32,
}

/// A merged output file on disk, current or archived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub channels: u64,
    pub programs: u64,
    pub days_included: u32,
    pub size_bytes: u64,
    pub is_current: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cadence::Daily => write!(f, "daily"),
            Cadence::Weekly => write!(f, "weekly"),
        }
    }
}

/// When and how the scheduled merge runs
///
/// `days_of_week` uses 0 = Sunday through 6 = Saturday and is only consulted
/// for weekly cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub cadence: Cadence,
    pub time_of_day: NaiveTime,
    pub days_of_week: BTreeSet<u8>,
    pub timeframe: Timeframe,
    pub channels_version: String,
    pub timeout_seconds: u64,
}

/// Everything a merge attempt needs, resolved from settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSettings {
    pub sources: Vec<String>,
    pub feed_type: FeedType,
    pub timeframe: Timeframe,
    pub channels_version: String,
    pub output_filename: String,
    pub timeout_seconds: u64,
    pub webhook_url: Option<String>,
    pub archive_retention_days: u32,
}
