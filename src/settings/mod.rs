//! Merge and schedule settings
//!
//! Settings live in the key/value store as untyped strings so they can be
//! edited while the service runs. Every job attempt and every scheduling
//! decision re-reads the store and parses it into [`MergeSettings`] or
//! [`ScheduleConfig`]. Malformed values fail the parse with a validation
//! error; keys that are absent fall back to configured defaults.

use chrono::NaiveTime;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::config::Config;
use crate::database::repositories::SettingsSeaOrmRepository;
use crate::errors::{AppError, AppResult};
use crate::models::{Cadence, FeedType, MergeSettings, ScheduleConfig, Timeframe};

pub mod channels;
pub mod validation;

pub use channels::load_channel_list;

/// Setting keys understood by the merge service
pub mod keys {
    pub const SELECTED_SOURCES: &str = "selected_sources";
    pub const MERGE_TIMEFRAME: &str = "merge_timeframe";
    pub const MERGE_CHANNELS_VERSION: &str = "merge_channels_version";
    pub const SELECTED_FEED_TYPE: &str = "selected_feed_type";
    pub const MERGE_TIMEOUT: &str = "merge_timeout";
    pub const MERGE_SCHEDULE: &str = "merge_schedule";
    pub const MERGE_TIME: &str = "merge_time";
    pub const MERGE_DAYS: &str = "merge_days";
    pub const OUTPUT_FILENAME: &str = "output_filename";
    pub const DISCORD_WEBHOOK: &str = "discord_webhook";
    pub const ARCHIVE_RETENTION: &str = "archive_retention";
}

const ALL_DAYS: [u8; 7] = [0, 1, 2, 3, 4, 5, 6];

/// Values used for keys missing from the store
#[derive(Debug, Clone)]
pub struct SettingsDefaults {
    pub output_filename: String,
    pub channels_file: String,
    pub timeout_seconds: u64,
    pub archive_retention_days: u32,
}

impl From<&Config> for SettingsDefaults {
    fn from(config: &Config) -> Self {
        Self {
            output_filename: config.merge.default_output_filename.clone(),
            channels_file: config.merge.default_channels_file.clone(),
            timeout_seconds: config.jobs.default_timeout_seconds,
            archive_retention_days: config.merge.default_archive_retention_days,
        }
    }
}

/// Typed access to the settings store
#[derive(Clone)]
pub struct SettingsService {
    repository: SettingsSeaOrmRepository,
    defaults: SettingsDefaults,
}

impl SettingsService {
    pub fn new(repository: SettingsSeaOrmRepository, defaults: SettingsDefaults) -> Self {
        Self {
            repository,
            defaults,
        }
    }

    pub fn defaults(&self) -> &SettingsDefaults {
        &self.defaults
    }

    pub async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.repository.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.repository.set(key, value).await
    }

    pub async fn merge_settings(&self) -> AppResult<MergeSettings> {
        let values = self.repository.all().await?;
        parse_merge_settings(&values, &self.defaults)
    }

    pub async fn schedule_config(&self) -> AppResult<ScheduleConfig> {
        let values = self.repository.all().await?;
        parse_schedule_config(&values, &self.defaults)
    }
}

fn lookup<'a>(values: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    values
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

pub fn parse_merge_settings(
    values: &BTreeMap<String, String>,
    defaults: &SettingsDefaults,
) -> AppResult<MergeSettings> {
    let sources: Vec<String> = match lookup(values, keys::SELECTED_SOURCES) {
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            AppError::validation(format!("{} is not a JSON string array: {e}", keys::SELECTED_SOURCES))
        })?,
        None => Vec::new(),
    };
    validation::validate_sources(&sources)?;

    let feed_type: FeedType = lookup(values, keys::SELECTED_FEED_TYPE)
        .unwrap_or("iptv")
        .parse()?;

    let output_filename = lookup(values, keys::OUTPUT_FILENAME)
        .unwrap_or(defaults.output_filename.as_str())
        .to_string();
    validation::validate_output_filename(&output_filename)?;

    let archive_retention_days = match lookup(values, keys::ARCHIVE_RETENTION) {
        Some(raw) => raw.parse().map_err(|_| {
            AppError::validation(format!("{} must be a whole number of days: '{raw}'", keys::ARCHIVE_RETENTION))
        })?,
        None => defaults.archive_retention_days,
    };

    Ok(MergeSettings {
        sources,
        feed_type,
        timeframe: parse_timeframe(values)?,
        channels_version: parse_channels_version(values, defaults),
        output_filename,
        timeout_seconds: parse_timeout(values, defaults)?,
        webhook_url: lookup(values, keys::DISCORD_WEBHOOK).map(str::to_string),
        archive_retention_days,
    })
}

pub fn parse_schedule_config(
    values: &BTreeMap<String, String>,
    defaults: &SettingsDefaults,
) -> AppResult<ScheduleConfig> {
    let cadence = match lookup(values, keys::MERGE_SCHEDULE).unwrap_or("daily") {
        "daily" => Cadence::Daily,
        "weekly" => Cadence::Weekly,
        other => {
            return Err(AppError::validation(format!(
                "{} must be daily or weekly: '{other}'",
                keys::MERGE_SCHEDULE
            )));
        }
    };

    let raw_time = lookup(values, keys::MERGE_TIME).unwrap_or("00:00");
    let time_of_day = NaiveTime::parse_from_str(raw_time, "%H:%M").map_err(|_| {
        AppError::validation(format!("{} must be HH:MM: '{raw_time}'", keys::MERGE_TIME))
    })?;

    Ok(ScheduleConfig {
        cadence,
        time_of_day,
        days_of_week: parse_days(lookup(values, keys::MERGE_DAYS))?,
        timeframe: parse_timeframe(values)?,
        channels_version: parse_channels_version(values, defaults),
        timeout_seconds: parse_timeout(values, defaults)?,
    })
}

fn parse_timeframe(values: &BTreeMap<String, String>) -> AppResult<Timeframe> {
    lookup(values, keys::MERGE_TIMEFRAME).unwrap_or("3").parse()
}

fn parse_channels_version(values: &BTreeMap<String, String>, defaults: &SettingsDefaults) -> String {
    lookup(values, keys::MERGE_CHANNELS_VERSION)
        .unwrap_or(defaults.channels_file.as_str())
        .to_string()
}

fn parse_timeout(values: &BTreeMap<String, String>, defaults: &SettingsDefaults) -> AppResult<u64> {
    match lookup(values, keys::MERGE_TIMEOUT) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(seconds) if seconds > 0 => Ok(seconds),
            _ => Err(AppError::validation(format!(
                "{} must be a positive number of seconds: '{raw}'",
                keys::MERGE_TIMEOUT
            ))),
        },
        None => Ok(defaults.timeout_seconds),
    }
}

/// Weekly run days, 0 = Sunday. An unreadable or empty list means every day;
/// a readable list with a day outside 0..=6 is rejected.
fn parse_days(raw: Option<&str>) -> AppResult<BTreeSet<u8>> {
    let Some(raw) = raw else {
        return Ok(ALL_DAYS.into_iter().collect());
    };

    let days: Vec<i64> = match serde_json::from_str(raw) {
        Ok(days) => days,
        Err(e) => {
            warn!("Could not parse {} '{}': {}; using every day", keys::MERGE_DAYS, raw, e);
            return Ok(ALL_DAYS.into_iter().collect());
        }
    };

    let mut set = BTreeSet::new();
    for day in days {
        match u8::try_from(day) {
            Ok(d) if d <= 6 => {
                set.insert(d);
            }
            _ => {
                return Err(AppError::validation(format!(
                    "{} entries must be between 0 and 6: {day}",
                    keys::MERGE_DAYS
                )));
            }
        }
    }

    if set.is_empty() {
        set.extend(ALL_DAYS);
    }
    Ok(set)
}
