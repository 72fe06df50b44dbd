//! Job scheduling type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::AppError;
use crate::models::JobRecord;

/// What started a merge attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobTrigger {
    /// Fired by the scheduling loop
    Scheduled,
    /// Requested on demand
    Manual,
}

impl JobTrigger {
    /// `scheduled_merge_YYYYMMDD_HHMMSS` or `manual_merge_YYYYMMDD_HHMMSS`
    pub fn job_id(self, at: DateTime<Utc>) -> String {
        let prefix = match self {
            JobTrigger::Scheduled => "scheduled_merge",
            JobTrigger::Manual => "manual_merge",
        };
        format!("{prefix}_{}", at.format("%Y%m%d_%H%M%S"))
    }
}

/// Result of [`super::JobController::cancel`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelOutcome {
    NoJob,
    Cancelled { job_id: String },
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub is_running: bool,
    pub current_job_id: Option<String>,
    pub latest_job: Option<JobRecord>,
    pub next_scheduled_run: Option<DateTime<Utc>>,
}

/// Failures that prevent an attempt from producing a job record at all.
/// Everything that happens inside an attempt is reported through the
/// record's status instead.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("A merge job is already running: {job_id}")]
    AlreadyRunning { job_id: String },

    #[error("Job history unavailable: {0}")]
    History(#[from] AppError),
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::AlreadyRunning { job_id } => AppError::operation_in_progress("merge", job_id),
            JobError::History(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_job_id_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 4, 5, 6).unwrap();
        assert_eq!(
            JobTrigger::Scheduled.job_id(at),
            "scheduled_merge_20250307_040506"
        );
        assert_eq!(JobTrigger::Manual.job_id(at), "manual_merge_20250307_040506");
    }

    #[test]
    fn test_already_running_maps_to_operation_in_progress() {
        let err: AppError = JobError::AlreadyRunning {
            job_id: "manual_merge_20250307_040506".to_string(),
        }
        .into();
        assert!(matches!(
            &err,
            AppError::OperationInProgress { operation_type, resource }
                if operation_type == "merge" && resource == "manual_merge_20250307_040506"
        ));
        assert_eq!(
            err.to_string(),
            "Operation already in progress: merge on manual_merge_20250307_040506"
        );
    }
}
