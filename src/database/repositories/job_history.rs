//! SeaORM-based job history repository
//!
//! One row per merge attempt, keyed by `job_id`. Timestamps are stored with
//! whole-second precision so that text comparison in SQLite orders them
//! chronologically.

use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::entities::{job_history, prelude::JobHistory};
use crate::errors::{AppError, AppResult};
use crate::models::{JobRecord, JobStatus};

#[derive(Clone)]
pub struct JobHistorySeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl JobHistorySeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Insert a new record or overwrite the existing row with the same job id
    pub async fn save(&self, record: &JobRecord) -> AppResult<()> {
        let existing = JobHistory::find()
            .filter(job_history::Column::JobId.eq(record.job_id.as_str()))
            .one(&*self.connection)
            .await?;

        match existing {
            Some(model) => {
                let current: JobStatus = model.status.parse()?;
                if current != record.status && !current.can_transition_to(record.status) {
                    return Err(AppError::validation(format!(
                        "Job {} cannot move from {} to {}",
                        record.job_id, current, record.status
                    )));
                }
                let mut active: job_history::ActiveModel = model.into();
                Self::apply(&mut active, record);
                active.update(&*self.connection).await?;
            }
            None => {
                let mut active = job_history::ActiveModel {
                    job_id: Set(record.job_id.clone()),
                    ..Default::default()
                };
                Self::apply(&mut active, record);
                active.insert(&*self.connection).await?;
            }
        }

        debug!("Saved job record: {} - {}", record.job_id, record.status);
        Ok(())
    }

    fn apply(active: &mut job_history::ActiveModel, record: &JobRecord) {
        active.status = Set(record.status.as_str().to_string());
        active.started_at = Set(record.started_at.trunc_subsecs(0));
        active.completed_at = Set(record.completed_at.map(|t| t.trunc_subsecs(0)));
        active.merge_filename = Set(record.merge_filename.clone());
        active.channels_included = Set(record.channels_included.map(|v| v as i64));
        active.programs_included = Set(record.programs_included.map(|v| v as i64));
        active.file_size = Set(record.file_size.clone());
        active.peak_memory_mb = Set(record.peak_memory_mb);
        active.days_included = Set(record.days_included.map(|v| v as i32));
        active.error_message = Set(record.error_message.clone());
        active.execution_time_seconds = Set(record.execution_time_seconds);
    }

    pub async fn find_by_job_id(&self, job_id: &str) -> AppResult<Option<JobRecord>> {
        let model = JobHistory::find()
            .filter(job_history::Column::JobId.eq(job_id))
            .one(&*self.connection)
            .await?;

        model.map(Self::model_to_domain).transpose()
    }

    /// Most recent attempts first
    pub async fn recent(&self, limit: u64) -> AppResult<Vec<JobRecord>> {
        let models = JobHistory::find()
            .order_by_desc(job_history::Column::StartedAt)
            .order_by_desc(job_history::Column::Id)
            .limit(limit)
            .all(&*self.connection)
            .await?;

        models.into_iter().map(Self::model_to_domain).collect()
    }

    pub async fn latest(&self) -> AppResult<Option<JobRecord>> {
        Ok(self.recent(1).await?.into_iter().next())
    }

    pub async fn find_by_status(&self, status: JobStatus) -> AppResult<Vec<JobRecord>> {
        let models = JobHistory::find()
            .filter(job_history::Column::Status.eq(status.as_str()))
            .order_by_asc(job_history::Column::StartedAt)
            .all(&*self.connection)
            .await?;

        models.into_iter().map(Self::model_to_domain).collect()
    }

    /// Delete records whose start time is before `cutoff`
    pub async fn delete_started_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = JobHistory::delete_many()
            .filter(job_history::Column::StartedAt.lt(cutoff.trunc_subsecs(0)))
            .filter(job_history::Column::Status.ne(JobStatus::Running.as_str()))
            .exec(&*self.connection)
            .await?;

        if result.rows_affected > 0 {
            info!("Cleaned up {} old job records", result.rows_affected);
        }
        Ok(result.rows_affected)
    }

    fn model_to_domain(model: job_history::Model) -> AppResult<JobRecord> {
        Ok(JobRecord {
            job_id: model.job_id,
            status: model.status.parse()?,
            started_at: model.started_at,
            completed_at: model.completed_at,
            merge_filename: model.merge_filename,
            channels_included: model.channels_included.map(|v| v.max(0) as u64),
            programs_included: model.programs_included.map(|v| v.max(0) as u64),
            file_size: model.file_size,
            peak_memory_mb: model.peak_memory_mb,
            days_included: model.days_included.map(|v| v.max(0) as u32),
            error_message: model.error_message,
            execution_time_seconds: model.execution_time_seconds,
        })
    }
}
