//! Current/archived versions of the merged output
//!
//! The current output for a filename lives in `current_dir/{name}`. Promoting
//! a new merge moves the previous current file to
//! `archive_dir/{name}.{YYYYMMDD_HHMMSS}` (timestamp taken from the old file's
//! mtime) and carries its metadata row along under the archived name.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::database::repositories::{ArchiveRecord, ArchiveSeaOrmRepository};
use crate::errors::{AppError, AppResult};
use crate::models::{ArchiveEntry, ArchiveMeta};
use crate::settings::validation::{is_plain_filename, validate_output_filename};
use crate::utils::human_format::format_memory;

const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub struct ArchiveStore {
    current_dir: PathBuf,
    archive_dir: PathBuf,
    repository: ArchiveSeaOrmRepository,
}

impl ArchiveStore {
    pub fn new(
        current_dir: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
        repository: ArchiveSeaOrmRepository,
    ) -> Self {
        Self {
            current_dir: current_dir.into(),
            archive_dir: archive_dir.into(),
            repository,
        }
    }

    /// Make `temp_output` the current version of its filename.
    ///
    /// The temp file is copied, not moved, so it stays available to the
    /// caller until it is cleared. The file swap runs to completion on the
    /// blocking pool even if this future is dropped, and the current path is
    /// replaced by a single rename, so a current file exists at every point.
    pub async fn promote(&self, temp_output: &Path, meta: ArchiveMeta) -> AppResult<ArchiveEntry> {
        let filename = temp_output
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::validation(format!("Invalid output path: {}", temp_output.display()))
            })?;
        validate_output_filename(&filename)?;

        let previous_meta = self
            .repository
            .find(&filename)
            .await?
            .map(|record| record.meta)
            .unwrap_or_default();

        let swap = {
            let temp_output = temp_output.to_path_buf();
            let current_dir = self.current_dir.clone();
            let archive_dir = self.archive_dir.clone();
            let filename = filename.clone();
            tokio::task::spawn_blocking(move || {
                swap_in(&temp_output, &current_dir, &archive_dir, &filename)
            })
            .await
            .map_err(|e| AppError::internal(format!("Promotion task failed: {e}")))??
        };

        if let Some(rotated) = &swap.rotated {
            self.repository
                .upsert(&ArchiveRecord {
                    filename: rotated.archived_name.clone(),
                    created_at: rotated.modified,
                    meta: previous_meta,
                    size_bytes: rotated.size_bytes,
                })
                .await?;
            info!("Archived previous {} as {}", filename, rotated.archived_name);
        }

        let size_bytes = swap.size_bytes;
        let created_at = Utc::now();
        self.repository
            .upsert(&ArchiveRecord {
                filename: filename.clone(),
                created_at,
                meta,
                size_bytes,
            })
            .await?;

        info!(
            "Promoted {} to current ({} channels, {} programmes, {})",
            filename,
            meta.channels,
            meta.programs,
            format_memory(size_bytes as f64)
        );

        Ok(ArchiveEntry {
            filename,
            created_at,
            channels: meta.channels,
            programs: meta.programs,
            days_included: meta.days_included,
            size_bytes,
            is_current: true,
        })
    }

    /// Current and archived outputs, newest first
    pub async fn list(&self) -> AppResult<Vec<ArchiveEntry>> {
        let records = self.repository.find_all().await?;
        let mut entries = Vec::new();

        for (dir, is_current) in [(&self.current_dir, true), (&self.archive_dir, false)] {
            for (filename, size, modified) in list_files(dir).await? {
                let record = records.iter().find(|r| r.filename == filename);
                let meta = record.map(|r| r.meta).unwrap_or_default();
                entries.push(ArchiveEntry {
                    created_at: record.map(|r| r.created_at).unwrap_or(modified),
                    filename,
                    channels: meta.channels,
                    programs: meta.programs,
                    days_included: meta.days_included,
                    size_bytes: size,
                    is_current,
                });
            }
        }

        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.is_current.cmp(&a.is_current))
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(entries)
    }

    /// Path of a current or archived file. Names with path components are rejected.
    pub async fn resolve(&self, filename: &str) -> AppResult<(PathBuf, bool)> {
        if !is_plain_filename(filename) {
            return Err(AppError::validation(format!("Invalid filename: '{filename}'")));
        }

        let current = self.current_dir.join(filename);
        if tokio::fs::try_exists(&current).await? {
            return Ok((current, true));
        }
        let archived = self.archive_dir.join(filename);
        if tokio::fs::try_exists(&archived).await? {
            return Ok((archived, false));
        }
        Err(AppError::not_found("archive", filename))
    }

    /// Delete an archived version and its metadata. The current file is refused.
    pub async fn delete_archive(&self, filename: &str) -> AppResult<()> {
        let (path, is_current) = self.resolve(filename).await?;
        if is_current {
            return Err(AppError::validation(format!(
                "Cannot delete current file '{filename}'"
            )));
        }

        tokio::fs::remove_file(&path).await?;
        self.repository.delete(filename).await?;
        info!("Deleted archive {}", filename);
        Ok(())
    }

    /// Delete archived files whose mtime is older than `retention_days`.
    /// Current files are never considered.
    pub async fn sweep_retention(&self, retention_days: u32) -> AppResult<u64> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(retention_days));
        let mut deleted = 0u64;

        for (filename, size, modified) in list_files(&self.archive_dir).await? {
            if modified >= cutoff {
                continue;
            }
            match tokio::fs::remove_file(self.archive_dir.join(&filename)).await {
                Ok(()) => {
                    self.repository.delete(&filename).await?;
                    deleted += 1;
                    debug!(
                        "Removed expired archive {} ({})",
                        filename,
                        format_memory(size as f64)
                    );
                }
                Err(e) => warn!("Could not remove archive {}: {}", filename, e),
            }
        }

        if deleted > 0 {
            info!(
                "Archive retention removed {} files older than {} days",
                deleted, retention_days
            );
        }
        Ok(deleted)
    }
}

/// Previous current file moved aside by [`swap_in`]
struct Rotation {
    archived_name: String,
    modified: DateTime<Utc>,
    size_bytes: u64,
}

struct Swap {
    rotated: Option<Rotation>,
    size_bytes: u64,
}

/// Stage the new output next to the current file, link the old current file
/// into the archive, then rename the staged copy over the current path.
fn swap_in(
    temp_output: &Path,
    current_dir: &Path,
    archive_dir: &Path,
    filename: &str,
) -> std::io::Result<Swap> {
    std::fs::create_dir_all(current_dir)?;
    std::fs::create_dir_all(archive_dir)?;

    // Hidden name so listings never show a partial file
    let staging = current_dir.join(format!(".{filename}.partial"));
    std::fs::copy(temp_output, &staging)?;

    let current_path = current_dir.join(filename);
    let rotated = match std::fs::metadata(&current_path) {
        Ok(metadata) => Some(archive_copy(&current_path, archive_dir, filename, &metadata)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    std::fs::rename(&staging, &current_path)?;
    let size_bytes = std::fs::metadata(&current_path)?.len();
    Ok(Swap {
        rotated,
        size_bytes,
    })
}

/// Link (or copy, keeping the mtime) the current file into the archive. The
/// current path itself is left in place for the caller to replace.
fn archive_copy(
    current_path: &Path,
    archive_dir: &Path,
    filename: &str,
    metadata: &std::fs::Metadata,
) -> std::io::Result<Rotation> {
    let mtime = metadata.modified().ok();
    let modified = mtime.map(DateTime::<Utc>::from).unwrap_or_else(Utc::now);

    let archived_name = free_archive_name(archive_dir, filename, &modified);
    let archived_path = archive_dir.join(&archived_name);

    if let Err(e) = std::fs::hard_link(current_path, &archived_path) {
        // Directories on different filesystems
        debug!("Linking into archive failed ({}), copying instead", e);
        std::fs::copy(current_path, &archived_path)?;
        if let Some(mtime) = mtime {
            std::fs::File::options()
                .write(true)
                .open(&archived_path)?
                .set_modified(mtime)?;
        }
    }

    Ok(Rotation {
        archived_name,
        modified,
        size_bytes: metadata.len(),
    })
}

/// `{name}.{timestamp}`, with a numeric suffix when two versions share a second
fn free_archive_name(archive_dir: &Path, filename: &str, modified: &DateTime<Utc>) -> String {
    let base = format!("{filename}.{}", modified.format(ARCHIVE_TIMESTAMP_FORMAT));
    let mut candidate = base.clone();
    let mut n = 1;
    while archive_dir.join(&candidate).exists() {
        candidate = format!("{base}_{n}");
        n += 1;
    }
    candidate
}

/// Regular, non-hidden files in `dir` with size and mtime
async fn list_files(dir: &Path) -> AppResult<Vec<(String, u64, DateTime<Utc>)>> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        files.push((name, metadata.len(), modified));
    }
    Ok(files)
}
