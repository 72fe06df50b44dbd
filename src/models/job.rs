use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Lifecycle of one merge attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    Timeout,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Timeout
        )
    }

    /// Transitions only ever move forward: a terminal status is final
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Pending => next != JobStatus::Pending,
            JobStatus::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            "timeout" => Ok(JobStatus::Timeout),
            other => Err(AppError::internal(format!("Unknown job status: {other}"))),
        }
    }
}

/// Persisted record of one merge attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub merge_filename: Option<String>,
    pub channels_included: Option<u64>,
    pub programs_included: Option<u64>,
    /// Human readable, e.g. `"12.34MB"`
    pub file_size: Option<String>,
    pub peak_memory_mb: Option<f64>,
    pub days_included: Option<u32>,
    pub error_message: Option<String>,
    pub execution_time_seconds: Option<f64>,
}

impl JobRecord {
    pub fn running(job_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Running,
            started_at,
            completed_at: None,
            merge_filename: None,
            channels_included: None,
            programs_included: None,
            file_size: None,
            peak_memory_mb: None,
            days_included: None,
            error_message: None,
            execution_time_seconds: None,
        }
    }
}
