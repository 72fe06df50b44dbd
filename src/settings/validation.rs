//! Input validation for merge requests and stored settings

use crate::errors::{AppError, AppResult};

/// Suffix every upstream source file carries
pub const SOURCE_SUFFIX: &str = ".xml.gz";

pub fn validate_sources(sources: &[String]) -> AppResult<()> {
    if sources.is_empty() {
        return Err(AppError::validation("sources list cannot be empty"));
    }

    for source in sources {
        if !source.ends_with(SOURCE_SUFFIX) || !is_plain_filename(source) {
            return Err(AppError::validation(format!("Invalid source: {source}")));
        }
    }
    Ok(())
}

pub fn validate_channels(channels: &[String]) -> AppResult<()> {
    if channels.is_empty() {
        return Err(AppError::validation("channels list cannot be empty"));
    }

    if let Some(bad) = channels.iter().find(|c| c.trim().is_empty()) {
        return Err(AppError::validation(format!("Invalid channel: '{bad}'")));
    }
    Ok(())
}

/// Output and archive names are resolved inside managed directories, so they
/// must not carry any path component
pub fn validate_output_filename(filename: &str) -> AppResult<()> {
    if !is_plain_filename(filename) {
        return Err(AppError::validation(format!(
            "Invalid output filename: '{filename}'"
        )));
    }
    Ok(())
}

pub fn is_plain_filename(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains("..") && !name.contains('/') && !name.contains('\\')
}
