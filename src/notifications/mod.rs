//! Best-effort completion notifications
//!
//! A Discord-compatible webhook receives one message per finished job.
//! Delivery failures are logged and otherwise ignored; a notification is
//! never retried and never affects the job outcome.

use chrono::Utc;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{JobRecord, JobStatus};

const COLOR_SUCCESS: u32 = 3_066_993;
const COLOR_FAILURE: u32 = 15_158_332;

#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// POST the job summary to `url`. Returns whether the endpoint accepted it.
    pub async fn notify(&self, url: &str, record: &JobRecord) -> bool {
        let payload = build_payload(record);

        match self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if matches!(response.status(), StatusCode::OK | StatusCode::NO_CONTENT) => {
                debug!("Webhook notification sent for job {}", record.job_id);
                true
            }
            Ok(response) => {
                warn!(
                    "Webhook for job {} returned {}",
                    record.job_id,
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!("Webhook for job {} failed: {}", record.job_id, e);
                false
            }
        }
    }
}

fn field(name: &str, value: impl Into<String>) -> Value {
    json!({ "name": name, "value": value.into(), "inline": true })
}

/// Discord message body for a finished job
pub fn build_payload(record: &JobRecord) -> Value {
    let success = record.status == JobStatus::Success;
    let title = match record.status {
        JobStatus::Success => "✅ EPG Merge Completed",
        JobStatus::Timeout => "⏱️ EPG Merge Timed Out",
        _ => "❌ EPG Merge Failed",
    };

    let mut fields = Vec::new();
    if success {
        fields.push(field(
            "Channels",
            record.channels_included.unwrap_or(0).to_string(),
        ));
        fields.push(field(
            "Programs",
            record.programs_included.unwrap_or(0).to_string(),
        ));
        fields.push(field(
            "File Size",
            record.file_size.clone().unwrap_or_else(|| "N/A".to_string()),
        ));
    }
    if let Some(seconds) = record.execution_time_seconds {
        fields.push(field("Execution Time", format!("{seconds:.1}s")));
    }
    if let Some(peak) = record.peak_memory_mb {
        fields.push(field("Peak Memory", format!("{peak:.1}MB")));
    }
    if !success {
        let error = record
            .error_message
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string());
        fields.push(json!({ "name": "Error", "value": error, "inline": false }));
    }

    json!({
        "content": "**EPG Merge Notification**",
        "embeds": [{
            "title": title,
            "description": format!("Job `{}`", record.job_id),
            "color": if success { COLOR_SUCCESS } else { COLOR_FAILURE },
            "fields": fields,
            "footer": { "text": format!("EPG Merge v{}", env!("CARGO_PKG_VERSION")) },
            "timestamp": record.completed_at.unwrap_or_else(Utc::now).to_rfc3339(),
        }]
    })
}
