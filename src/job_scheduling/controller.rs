//! Merge job controller
//!
//! Owns the single-flight running state and composes one attempt as
//! cache → merge under a timeout, then promote. Promotion is the commit
//! point and is never interrupted by the timeout or a cancel. Whatever
//! happens inside the attempt, a terminal [`JobRecord`] is written before the
//! running flag is released, and the webhook (if configured) is told
//! afterwards.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::types::{CancelOutcome, ControllerStatus, JobError, JobTrigger};
use crate::archive::ArchiveStore;
use crate::config::{Config, JobsConfig};
use crate::database::Database;
use crate::database::repositories::{
    ArchiveSeaOrmRepository, JobHistorySeaOrmRepository, SettingsSeaOrmRepository,
};
use crate::errors::{AppResult, SourceError};
use crate::merge::{MergeOutput, StreamingMergeEngine, TempCleanup};
use crate::models::{ArchiveEntry, JobRecord, JobStatus, MergeResult, MergeSettings, ScheduleConfig};
use crate::notifications::WebhookNotifier;
use crate::settings::{SettingsDefaults, SettingsService, keys, load_channel_list};
use crate::sources::{CacheStats, SourceCacheManager};
use crate::utils::{SourceFetcher, StandardHttpClient};
use crate::utils::cron_helper::next_run_after;
use crate::utils::human_format::{format_duration, format_size_mb};
use crate::utils::memory_monitor::MemorySampler;

#[derive(Default)]
struct RunState {
    current_job_id: Option<String>,
    cancel: Option<CancellationToken>,
}

/// Clears the running state however the attempt ends
struct RunningGuard {
    state: Arc<Mutex<RunState>>,
    cancel: CancellationToken,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.current_job_id = None;
        state.cancel = None;
    }
}

fn lock(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum AttemptOutcome {
    Completed(MergeResult, ArchiveEntry),
    Failed(String),
    TimedOut(u64),
    Cancelled,
}

pub struct JobController {
    settings: SettingsService,
    cache: SourceCacheManager,
    merge_engine: StreamingMergeEngine,
    archive: ArchiveStore,
    history: JobHistorySeaOrmRepository,
    notifier: WebhookNotifier,
    config_dir: PathBuf,
    jobs: JobsConfig,
    state: Arc<Mutex<RunState>>,
    next_scheduled_run: Mutex<Option<DateTime<Utc>>>,
}

impl JobController {
    pub fn new(
        config: &Config,
        database: &Database,
        fetcher: Arc<dyn SourceFetcher>,
        http_client: reqwest::Client,
    ) -> Self {
        let connection = database.connection();
        Self {
            settings: SettingsService::new(
                SettingsSeaOrmRepository::new(connection.clone()),
                SettingsDefaults::from(config),
            ),
            cache: SourceCacheManager::new(
                fetcher,
                &config.storage.cache_dir,
                &config.upstream.base_url,
                config.merge.cache_max_age,
            ),
            merge_engine: StreamingMergeEngine::new(&config.storage.temp_dir),
            archive: ArchiveStore::new(
                &config.storage.current_dir,
                &config.storage.archive_dir,
                ArchiveSeaOrmRepository::new(connection.clone()),
            ),
            history: JobHistorySeaOrmRepository::new(connection),
            notifier: WebhookNotifier::new(http_client, config.upstream.webhook_timeout),
            config_dir: config.storage.config_dir.clone(),
            jobs: config.jobs.clone(),
            state: Arc::new(Mutex::new(RunState::default())),
            next_scheduled_run: Mutex::new(None),
        }
    }

    /// Open storage from `config` and build a controller over it. Jobs a
    /// previous process left running are repaired before this returns.
    pub async fn open(config: &Config) -> anyhow::Result<Arc<Self>> {
        config.storage.ensure_directories()?;
        let database = Database::new(&config.storage).await?;
        database.migrate().await?;

        let http_client = StandardHttpClient::new(&config.upstream)?;
        let controller = Arc::new(Self::new(
            config,
            &database,
            Arc::new(http_client.clone()),
            http_client.inner_client().clone(),
        ));

        match controller
            .recover_stuck_jobs(config.jobs.recovery_threshold)
            .await
        {
            Ok(0) => {}
            Ok(recovered) => warn!("Marked {} interrupted jobs as failed", recovered),
            Err(e) => error!("Crash recovery failed: {}", e),
        }
        Ok(controller)
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn archive(&self) -> &ArchiveStore {
        &self.archive
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub(crate) fn max_sleep_chunk(&self) -> Duration {
        self.jobs.max_sleep_chunk
    }

    pub async fn schedule_config(&self) -> AppResult<ScheduleConfig> {
        self.settings.schedule_config().await
    }

    /// Next fire time strictly after now, from the stored schedule
    pub async fn next_run(&self) -> AppResult<DateTime<Utc>> {
        let schedule = self.schedule_config().await?;
        next_run_after(&schedule, Utc::now())
    }

    pub(crate) fn set_next_scheduled_run(&self, next: Option<DateTime<Utc>>) {
        *self
            .next_scheduled_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).current_job_id.is_some()
    }

    pub async fn status(&self) -> AppResult<ControllerStatus> {
        let current_job_id = lock(&self.state).current_job_id.clone();
        let next_scheduled_run = *self
            .next_scheduled_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        Ok(ControllerStatus {
            is_running: current_job_id.is_some(),
            current_job_id,
            latest_job: self.history.latest().await?,
            next_scheduled_run,
        })
    }

    /// Ask the running attempt to stop. It still records a terminal row.
    pub fn cancel(&self) -> CancelOutcome {
        let state = lock(&self.state);
        match (&state.current_job_id, &state.cancel) {
            (Some(job_id), Some(cancel)) => {
                info!("Cancelling merge job {}", job_id);
                cancel.cancel();
                CancelOutcome::Cancelled {
                    job_id: job_id.clone(),
                }
            }
            _ => CancelOutcome::NoJob,
        }
    }

    /// Recent jobs, newest first. `None` uses the configured limit.
    pub async fn history(&self, limit: Option<u64>) -> AppResult<Vec<JobRecord>> {
        self.history
            .recent(limit.unwrap_or(self.jobs.history_limit))
            .await
    }

    pub async fn latest(&self) -> AppResult<Option<JobRecord>> {
        self.history.latest().await
    }

    /// Delete finished job rows older than `retention_days`
    pub async fn cleanup_old_jobs(&self, retention_days: u32) -> AppResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
        let deleted = self.history.delete_started_before(cutoff).await?;
        if deleted > 0 {
            info!("Removed {} job records older than {} days", deleted, retention_days);
        }
        Ok(deleted)
    }

    pub fn clear_temp_files(&self) -> AppResult<TempCleanup> {
        self.merge_engine.clear_temp_files()
    }

    /// Archive retention using the stored (or default) retention window
    pub async fn sweep_archives(&self) -> AppResult<u64> {
        let settings = self.settings.merge_settings().await;
        let days = match settings {
            Ok(settings) => settings.archive_retention_days,
            Err(e) => {
                debug!("Using default archive retention: {}", e);
                self.settings.defaults().archive_retention_days
            }
        };
        self.archive.sweep_retention(days).await
    }

    /// Mark rows left `Running` by a previous process as failed. Rows
    /// younger than `threshold` and the job this process is running are left
    /// alone.
    pub async fn recover_stuck_jobs(&self, threshold: Duration) -> AppResult<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(threshold).unwrap_or_else(|_| chrono::Duration::hours(2));
        let own_job = lock(&self.state).current_job_id.clone();

        let mut recovered = 0;
        for mut record in self.history.find_by_status(JobStatus::Running).await? {
            if record.started_at >= cutoff || own_job.as_deref() == Some(record.job_id.as_str()) {
                continue;
            }

            warn!(
                "Recovering job {} left running since {}",
                record.job_id, record.started_at
            );
            record.status = JobStatus::Failed;
            record.completed_at = Some(Utc::now());
            record.error_message = Some(format!(
                "Job was still running when the service restarted (started {}); marked as failed",
                record.started_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            self.history.save(&record).await?;
            recovered += 1;
        }

        if recovered > 0 {
            info!("Recovered {} stuck jobs", recovered);
        }
        Ok(recovered)
    }

    fn begin(&self, job_id: &str) -> Result<RunningGuard, JobError> {
        let mut state = lock(&self.state);
        if let Some(running) = &state.current_job_id {
            return Err(JobError::AlreadyRunning {
                job_id: running.clone(),
            });
        }

        let cancel = CancellationToken::new();
        state.current_job_id = Some(job_id.to_string());
        state.cancel = Some(cancel.clone());
        Ok(RunningGuard {
            state: self.state.clone(),
            cancel,
        })
    }

    async fn unique_job_id(&self, trigger: JobTrigger) -> AppResult<String> {
        let base = trigger.job_id(Utc::now());
        let mut job_id = base.clone();
        let mut n = 2;
        while self.history.find_by_job_id(&job_id).await?.is_some() {
            job_id = format!("{base}_{n}");
            n += 1;
        }
        Ok(job_id)
    }

    /// Run one attempt to completion and return its terminal record.
    ///
    /// Only a concurrent attempt or an unusable job history prevent a record
    /// from being written; every other failure ends up in the record.
    pub async fn run_attempt(&self, trigger: JobTrigger) -> Result<JobRecord, JobError> {
        let running = lock(&self.state).current_job_id.clone();
        if let Some(job_id) = running {
            return Err(JobError::AlreadyRunning { job_id });
        }

        let job_id = self.unique_job_id(trigger).await?;
        let guard = self.begin(&job_id)?;

        let started_at = Utc::now();
        let started = Instant::now();
        let mut record = JobRecord::running(&job_id, started_at);
        self.history.save(&record).await?;
        info!("Starting {:?} merge job {}", trigger, job_id);

        let sampler = MemorySampler::start(self.jobs.memory_sample_interval);
        let settings = self.settings.merge_settings().await;

        let merged = match &settings {
            Ok(settings) => self.run_with_limits(settings, &guard.cancel).await,
            Err(e) => Err(AttemptOutcome::Failed(e.to_string())),
        };
        let outcome = match merged {
            Ok(result) => match self.archive.promote(&result.output_path, result.meta()).await {
                Ok(entry) => AttemptOutcome::Completed(result, entry),
                Err(e) => AttemptOutcome::Failed(e.to_string()),
            },
            Err(outcome) => outcome,
        };

        let peak_memory_mb = sampler.stop().await;
        let elapsed = started.elapsed();

        record.completed_at = Some(Utc::now());
        record.peak_memory_mb = Some(peak_memory_mb);
        record.execution_time_seconds = Some((elapsed.as_secs_f64() * 100.0).round() / 100.0);

        match outcome {
            AttemptOutcome::Completed(result, entry) => {
                record.status = JobStatus::Success;
                record.merge_filename = Some(entry.filename);
                record.channels_included = Some(result.channels_included);
                record.programs_included = Some(result.programs_included);
                record.file_size = Some(format_size_mb(result.byte_size));
                record.days_included = Some(result.days_included);
            }
            AttemptOutcome::Failed(message) => {
                record.status = JobStatus::Failed;
                record.error_message = Some(message);
            }
            AttemptOutcome::TimedOut(seconds) => {
                record.status = JobStatus::Timeout;
                record.error_message = Some(format!("Job timed out after {seconds} seconds"));
            }
            AttemptOutcome::Cancelled => {
                record.status = JobStatus::Failed;
                record.error_message = Some("Job was cancelled".to_string());
            }
        }

        if let Err(e) = self.history.save(&record).await {
            error!("Failed to persist final state of job {}: {}", job_id, e);
        }
        drop(guard);

        match record.status {
            JobStatus::Success => info!(
                "Merge job {} succeeded in {} ({} channels, {} programmes, peak {:.2}MB)",
                job_id,
                format_duration(elapsed),
                record.channels_included.unwrap_or(0),
                record.programs_included.unwrap_or(0),
                peak_memory_mb
            ),
            _ => warn!(
                "Merge job {} ended {} after {}: {}",
                job_id,
                record.status,
                format_duration(elapsed),
                record.error_message.as_deref().unwrap_or("")
            ),
        }

        self.housekeeping(settings.as_ref().ok()).await;

        if let Some(url) = self.webhook_url().await {
            self.notifier.notify(&url, &record).await;
        }

        Ok(record)
    }

    /// Cache and merge under the timeout. `Err` carries the terminal outcome
    /// of an attempt that produced no output.
    async fn run_with_limits(
        &self,
        settings: &MergeSettings,
        cancel: &CancellationToken,
    ) -> Result<MergeResult, AttemptOutcome> {
        let limit = Duration::from_secs(settings.timeout_seconds);

        tokio::select! {
            result = tokio::time::timeout(limit, self.execute(settings, cancel.clone())) => match result {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(_)) if cancel.is_cancelled() => Err(AttemptOutcome::Cancelled),
                Ok(Err(e)) => Err(AttemptOutcome::Failed(e.to_string())),
                Err(_) => {
                    // Stops a merge still running on the blocking pool
                    cancel.cancel();
                    Err(AttemptOutcome::TimedOut(settings.timeout_seconds))
                }
            },
            _ = cancel.cancelled() => Err(AttemptOutcome::Cancelled),
        }
    }

    async fn execute(
        &self,
        settings: &MergeSettings,
        cancel: CancellationToken,
    ) -> AppResult<MergeResult> {
        let channels = load_channel_list(
            &self.config_dir,
            &settings.channels_version,
            &self.settings.defaults().channels_file,
        )
        .await?;

        let cached = self
            .cache
            .fetch(&settings.sources, settings.timeframe, settings.feed_type)
            .await?;
        if cached.is_empty() {
            return Err(SourceError::NoneObtained.into());
        }

        self.merge_engine
            .merge(
                &cached,
                &channels,
                MergeOutput {
                    filename: settings.output_filename.clone(),
                    days_included: settings.timeframe.days(),
                },
                cancel,
            )
            .await
    }

    /// Webhook target, read on its own so a job that failed on other
    /// malformed settings is still reported
    async fn webhook_url(&self) -> Option<String> {
        match self.settings.get(keys::DISCORD_WEBHOOK).await {
            Ok(Some(url)) if !url.trim().is_empty() => Some(url.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!("Cannot read webhook setting: {}", e);
                None
            }
        }
    }

    async fn housekeeping(&self, settings: Option<&MergeSettings>) {
        if let Err(e) = self.cleanup_old_jobs(self.jobs.history_retention_days).await {
            warn!("Job history cleanup failed: {}", e);
        }

        let retention = settings
            .map(|s| s.archive_retention_days)
            .unwrap_or(self.settings.defaults().archive_retention_days);
        if let Err(e) = self.archive.sweep_retention(retention).await {
            warn!("Archive retention sweep failed: {}", e);
        }
    }
}
