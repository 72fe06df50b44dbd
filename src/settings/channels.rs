//! Channel list files
//!
//! A channel list is a JSON document `{"channels": ["id", ...]}` stored in the
//! configuration directory under a versioned filename.

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

use super::validation::{is_plain_filename, validate_channels};
use crate::errors::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct ChannelListFile {
    channels: Vec<String>,
}

/// Load the keep-list for a merge. When `version` does not exist the
/// `fallback` file is tried before giving up.
pub async fn load_channel_list(
    config_dir: &Path,
    version: &str,
    fallback: &str,
) -> AppResult<Vec<String>> {
    if !is_plain_filename(version) {
        return Err(AppError::validation(format!(
            "Invalid channels version: '{version}'"
        )));
    }

    let mut path = config_dir.join(version);
    if !tokio::fs::try_exists(&path).await? {
        let fallback_path = config_dir.join(fallback);
        warn!(
            "Channel list {} not found, falling back to {}",
            path.display(),
            fallback_path.display()
        );
        if !tokio::fs::try_exists(&fallback_path).await? {
            return Err(AppError::not_found("channel list", version));
        }
        path = fallback_path;
    }

    let contents = tokio::fs::read_to_string(&path).await?;
    let parsed: ChannelListFile = serde_json::from_str(&contents).map_err(|e| {
        AppError::validation(format!(
            "Channel list {} is not valid: {e}",
            path.display()
        ))
    })?;
    validate_channels(&parsed.channels)?;

    debug!(
        "Loaded {} channels from {}",
        parsed.channels.len(),
        path.display()
    );
    Ok(parsed.channels)
}
