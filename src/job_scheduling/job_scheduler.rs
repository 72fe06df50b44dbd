//! Scheduling loop for unattended merges

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::controller::JobController;
use super::types::{JobError, JobTrigger};
use crate::models::ScheduleConfig;
use crate::utils::cron_helper::next_run_after;

/// Service that sleeps until the configured fire time and runs one attempt
pub struct JobScheduler {
    controller: Arc<JobController>,
}

enum Wake {
    Due,
    ScheduleChanged,
    Shutdown,
}

impl JobScheduler {
    pub fn new(controller: Arc<JobController>) -> Self {
        Self { controller }
    }

    /// Run until `cancellation_token` fires. Job failures never end the loop.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!("Starting merge scheduler");

        loop {
            let schedule = match self.controller.schedule_config().await {
                Ok(schedule) => schedule,
                Err(e) => {
                    error!("Cannot read merge schedule: {}", e);
                    self.controller.set_next_scheduled_run(None);
                    if self.pause(&cancellation_token).await {
                        break;
                    }
                    continue;
                }
            };

            let next = match next_run_after(&schedule, Utc::now()) {
                Ok(next) => next,
                Err(e) => {
                    error!("Cannot compute next merge time: {}", e);
                    if self.pause(&cancellation_token).await {
                        break;
                    }
                    continue;
                }
            };
            self.controller.set_next_scheduled_run(Some(next));
            info!(
                "Next {} merge at {}",
                schedule.cadence,
                next.format("%Y-%m-%d %H:%M:%S UTC")
            );

            match self.wait_until(next, &schedule, &cancellation_token).await {
                Wake::Shutdown => break,
                Wake::ScheduleChanged => continue,
                Wake::Due => {}
            }

            match self.controller.run_attempt(JobTrigger::Scheduled).await {
                Ok(record) => debug!("Scheduled job {} finished: {}", record.job_id, record.status),
                Err(JobError::AlreadyRunning { job_id }) => {
                    warn!("Skipping scheduled merge, job {} is still running", job_id)
                }
                Err(e) => error!("Scheduled merge could not run: {}", e),
            }
        }

        self.controller.set_next_scheduled_run(None);
        info!("Merge scheduler stopped");
    }

    /// Sleep towards `next` in bounded chunks, re-reading the schedule after
    /// each chunk
    async fn wait_until(
        &self,
        next: DateTime<Utc>,
        schedule: &ScheduleConfig,
        cancellation_token: &CancellationToken,
    ) -> Wake {
        loop {
            let remaining = match (next - Utc::now()).to_std() {
                Ok(remaining) if !remaining.is_zero() => remaining,
                _ => return Wake::Due,
            };

            let chunk = remaining.min(self.controller.max_sleep_chunk());
            tokio::select! {
                _ = cancellation_token.cancelled() => return Wake::Shutdown,
                _ = tokio::time::sleep(chunk) => {}
            }

            match self.controller.schedule_config().await {
                Ok(latest) if &latest != schedule => {
                    info!("Merge schedule changed, recomputing next run");
                    return Wake::ScheduleChanged;
                }
                Ok(_) => {}
                Err(e) => warn!("Cannot re-read merge schedule: {}", e),
            }
        }
    }

    /// Wait one sleep chunk; true when shutting down
    async fn pause(&self, cancellation_token: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancellation_token.cancelled() => true,
            _ = tokio::time::sleep(self.controller.max_sleep_chunk()) => false,
        }
    }
}
