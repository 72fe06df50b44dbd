//! Local cache of upstream feed files
//!
//! Each requested source is resolved independently:
//!
//! 1. no cached file: download it
//! 2. cached file younger than the freshness window: reuse it, no network
//! 3. older: HEAD the remote and compare `content-length` with the local
//!    size; equal sizes are treated as unchanged, anything else (including a
//!    failed HEAD) triggers a download
//!
//! Downloads land in a temporary file next to the target and are renamed
//! into place, so a cache file is never observed half written. A source that
//! cannot be downloaded is logged and left out of the result.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::errors::AppResult;
use crate::models::{CacheEntry, CacheOrigin, FeedType, SourceDescriptor, Timeframe};
use crate::settings::validation::validate_sources;
use crate::utils::http_client::SourceFetcher;
use crate::utils::human_format::format_memory;

/// Counters accumulated across fetches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub revalidated: u64,
    pub misses: u64,
    pub downloads: u64,
    pub failures: u64,
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    revalidated: AtomicU64,
    misses: AtomicU64,
    downloads: AtomicU64,
    failures: AtomicU64,
}

pub struct SourceCacheManager {
    fetcher: Arc<dyn SourceFetcher>,
    cache_root: PathBuf,
    base_url: String,
    max_age: Duration,
    counters: CacheCounters,
}

impl SourceCacheManager {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        cache_root: impl Into<PathBuf>,
        base_url: impl Into<String>,
        max_age: Duration,
    ) -> Self {
        Self {
            fetcher,
            cache_root: cache_root.into(),
            base_url: base_url.into(),
            max_age,
            counters: CacheCounters::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            revalidated: self.counters.revalidated.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            downloads: self.counters.downloads.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Where each named source comes from and where it is cached
    pub fn describe(
        &self,
        sources: &[String],
        timeframe: Timeframe,
        feed_type: FeedType,
    ) -> Vec<SourceDescriptor> {
        let cache_dir = timeframe.cache_dir(feed_type, &self.cache_root);
        sources
            .iter()
            .map(|name| SourceDescriptor {
                name: name.clone(),
                remote_url: timeframe.remote_url(feed_type, &self.base_url, name),
                local_cache_path: cache_dir.join(name),
            })
            .collect()
    }

    /// Resolve every source to a usable cache entry, in request order.
    /// Sources that could not be obtained are omitted; an empty result is
    /// for the caller to treat as fatal.
    pub async fn fetch(
        &self,
        sources: &[String],
        timeframe: Timeframe,
        feed_type: FeedType,
    ) -> AppResult<Vec<CacheEntry>> {
        validate_sources(sources)?;

        let descriptors = self.describe(sources, timeframe, feed_type);
        if let Some(dir) = descriptors
            .first()
            .and_then(|d| d.local_cache_path.parent())
        {
            tokio::fs::create_dir_all(dir).await?;
        }

        let mut entries = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if let Some(entry) = self.fetch_one(descriptor).await {
                entries.push(entry);
            }
        }

        info!(
            "Source cache resolved {}/{} sources ({} day {})",
            entries.len(),
            sources.len(),
            timeframe,
            feed_type
        );
        Ok(entries)
    }

    async fn fetch_one(&self, source: SourceDescriptor) -> Option<CacheEntry> {
        let path = source.local_cache_path.clone();

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not stat cache file {}: {}", path.display(), e);
                }
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for {}", source.name);
                return self.download(source).await;
            }
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
            .unwrap_or(Duration::ZERO);

        if age < self.max_age {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Cache hit for {} (age {})",
                source.name,
                humantime::format_duration(Duration::from_secs(age.as_secs()))
            );
            return Self::entry(source, CacheOrigin::Fresh).await;
        }

        match self.fetcher.content_length(&source.remote_url).await {
            Ok(Some(remote_size)) if remote_size == metadata.len() => {
                // Same size is taken as unchanged; a same-size edit upstream goes unnoticed
                self.counters.revalidated.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache for {} revalidated by size ({})",
                    source.name,
                    format_memory(remote_size as f64)
                );
                return Self::entry(source, CacheOrigin::Revalidated).await;
            }
            Ok(remote_size) => {
                debug!(
                    "Cache for {} is stale (local {} bytes, remote {:?})",
                    source.name,
                    metadata.len(),
                    remote_size
                );
            }
            Err(e) => {
                debug!("Freshness check for {} failed: {}", source.name, e);
            }
        }

        self.download(source).await
    }

    async fn download(&self, source: SourceDescriptor) -> Option<CacheEntry> {
        match self.download_atomic(&source).await {
            Ok(bytes) => {
                self.counters.downloads.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Downloaded {} ({})",
                    source.name,
                    format_memory(bytes as f64)
                );
                Self::entry(source, CacheOrigin::Downloaded).await
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Skipping source {}: {}", source.name, e);
                None
            }
        }
    }

    async fn download_atomic(&self, source: &SourceDescriptor) -> AppResult<u64> {
        let target = &source.local_cache_path;
        let dir = target.parent().unwrap_or(Path::new("."));
        tokio::fs::create_dir_all(dir).await?;

        // Dropped (and deleted) on any early return
        let temp_path = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(dir)?
            .into_temp_path();

        let bytes = self
            .fetcher
            .download_to(&source.remote_url, &temp_path)
            .await?;

        temp_path.persist(target).map_err(|e| e.error)?;
        Ok(bytes)
    }

    async fn entry(source: SourceDescriptor, origin: CacheOrigin) -> Option<CacheEntry> {
        match tokio::fs::metadata(&source.local_cache_path).await {
            Ok(metadata) => Some(CacheEntry {
                modified_at: metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now()),
                size_bytes: metadata.len(),
                origin,
                source,
            }),
            Err(e) => {
                warn!(
                    "Cache file {} vanished: {}",
                    source.local_cache_path.display(),
                    e
                );
                None
            }
        }
    }
}
