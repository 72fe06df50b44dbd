use anyhow::Result;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

/// Prefix for environment overrides, e.g. `EPG_MERGE_STORAGE__CACHE_DIR`
pub const ENV_PREFIX: &str = "EPG_MERGE_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Filesystem layout and database location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding channel list JSON files
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    /// Local cache of downloaded upstream feeds
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Directory holding the current merged output
    #[serde(default = "default_current_dir")]
    pub current_dir: PathBuf,
    /// Directory holding superseded merged outputs
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
    /// Scratch space for freshly merged files before promotion
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Remote feed server and HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_download_timeout", with = "duration")]
    pub download_timeout: Duration,
    #[serde(default = "default_head_timeout", with = "duration")]
    pub head_timeout: Duration,
    #[serde(default = "default_webhook_timeout", with = "duration")]
    pub webhook_timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Used when the `output_filename` setting is absent
    #[serde(default = "default_output_filename")]
    pub default_output_filename: String,
    /// Channel list used when the requested version file is missing
    #[serde(default = "default_channels_file")]
    pub default_channels_file: String,
    /// Cached sources younger than this are reused without a network call
    #[serde(default = "default_cache_max_age", with = "duration")]
    pub cache_max_age: Duration,
    #[serde(default = "default_archive_retention_days")]
    pub default_archive_retention_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Used when the `merge_timeout` setting is absent
    #[serde(default = "default_merge_timeout_seconds")]
    pub default_timeout_seconds: u64,
    /// Running jobs older than this are failed on startup
    #[serde(default = "default_recovery_threshold", with = "duration")]
    pub recovery_threshold: Duration,
    #[serde(default = "default_memory_sample_interval", with = "duration")]
    pub memory_sample_interval: Duration,
    /// Upper bound on a single scheduler sleep before re-reading the schedule
    #[serde(default = "default_max_sleep_chunk", with = "duration")]
    pub max_sleep_chunk: Duration,
    #[serde(default = "default_history_limit")]
    pub history_limit: u64,
    #[serde(default = "default_history_retention_days")]
    pub history_retention_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_DIR)
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}
fn default_current_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CURRENT_DIR)
}
fn default_archive_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ARCHIVE_DIR)
}
fn default_temp_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TEMP_DIR)
}
fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}
fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}
fn default_base_url() -> String {
    DEFAULT_UPSTREAM_BASE_URL.to_string()
}
fn default_download_timeout() -> Duration {
    parse_default_duration(DEFAULT_DOWNLOAD_TIMEOUT)
}
fn default_head_timeout() -> Duration {
    parse_default_duration(DEFAULT_HEAD_TIMEOUT)
}
fn default_webhook_timeout() -> Duration {
    parse_default_duration(DEFAULT_WEBHOOK_TIMEOUT)
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_output_filename() -> String {
    DEFAULT_OUTPUT_FILENAME.to_string()
}
fn default_channels_file() -> String {
    DEFAULT_CHANNELS_FILE.to_string()
}
fn default_cache_max_age() -> Duration {
    parse_default_duration(DEFAULT_CACHE_MAX_AGE)
}
fn default_archive_retention_days() -> u32 {
    DEFAULT_ARCHIVE_RETENTION_DAYS
}
fn default_merge_timeout_seconds() -> u64 {
    DEFAULT_MERGE_TIMEOUT_SECONDS
}
fn default_recovery_threshold() -> Duration {
    parse_default_duration(DEFAULT_RECOVERY_THRESHOLD)
}
fn default_memory_sample_interval() -> Duration {
    parse_default_duration(DEFAULT_MEMORY_SAMPLE_INTERVAL)
}
fn default_max_sleep_chunk() -> Duration {
    parse_default_duration(DEFAULT_MAX_SLEEP_CHUNK)
}
fn default_history_limit() -> u64 {
    DEFAULT_HISTORY_LIMIT
}
fn default_history_retention_days() -> u32 {
    DEFAULT_HISTORY_RETENTION_DAYS
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_log_format() -> String {
    DEFAULT_LOG_FORMAT.to_string()
}

// The DEFAULT_* duration constants are literals covered by tests
fn parse_default_duration(value: &str) -> Duration {
    humantime::parse_duration(value).unwrap_or(Duration::from_secs(60))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            cache_dir: default_cache_dir(),
            current_dir: default_current_dir(),
            archive_dir: default_archive_dir(),
            temp_dir: default_temp_dir(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            download_timeout: default_download_timeout(),
            head_timeout: default_head_timeout(),
            webhook_timeout: default_webhook_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            default_output_filename: default_output_filename(),
            default_channels_file: default_channels_file(),
            cache_max_age: default_cache_max_age(),
            default_archive_retention_days: default_archive_retention_days(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: default_merge_timeout_seconds(),
            recovery_threshold: default_recovery_threshold(),
            memory_sample_interval: default_memory_sample_interval(),
            max_sleep_chunk: default_max_sleep_chunk(),
            history_limit: default_history_limit(),
            history_retention_days: default_history_retention_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl StorageConfig {
    /// Create every configured directory that does not exist yet
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [
            &self.config_dir,
            &self.cache_dir,
            &self.current_dir,
            &self.archive_dir,
            &self.temp_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Convenience for tests and tools: every directory rooted under `base`
    pub fn rooted_at(base: &Path) -> Self {
        Self {
            config_dir: base.join("config"),
            cache_dir: base.join("cache"),
            current_dir: base.join("current"),
            archive_dir: base.join("archives"),
            temp_dir: base.join("tmp"),
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Load configuration layered as defaults, then the TOML file, then
    /// `EPG_MERGE_*` environment variables. A default file is written when
    /// the requested one does not exist.
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !Path::new(config_file).exists() {
            let contents = toml::to_string_pretty(&Self::default())?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
        }

        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_durations_parse() {
        let config = Config::default();
        assert_eq!(config.merge.cache_max_age, Duration::from_secs(24 * 3600));
        assert_eq!(config.jobs.recovery_threshold, Duration::from_secs(2 * 3600));
        assert_eq!(config.jobs.max_sleep_chunk, Duration::from_secs(60));
        assert_eq!(
            config.jobs.memory_sample_interval,
            Duration::from_millis(500)
        );
        assert_eq!(config.upstream.download_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_load_writes_default_file_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let path_str = path.to_string_lossy().to_string();

        let config = Config::load_from_file(&path_str).unwrap();
        assert!(path.exists());
        assert_eq!(config.merge.default_output_filename, DEFAULT_OUTPUT_FILENAME);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[merge]\ncache_max_age = \"6h\"\n\n[jobs]\nrecovery_threshold = 600\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path.to_string_lossy()).unwrap();
        assert_eq!(config.merge.cache_max_age, Duration::from_secs(6 * 3600));
        assert_eq!(config.jobs.recovery_threshold, Duration::from_secs(600));
        assert_eq!(config.storage.cache_dir, PathBuf::from(DEFAULT_CACHE_DIR));
    }

    #[test]
    #[serial_test::serial]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[upstream]\nbase_url = \"http://file.example\"\n").unwrap();

        // SAFETY: serialised with every other test touching the environment
        unsafe {
            std::env::set_var("EPG_MERGE_UPSTREAM__BASE_URL", "http://env.example");
        }
        let config = Config::load_from_file(&path.to_string_lossy());
        unsafe {
            std::env::remove_var("EPG_MERGE_UPSTREAM__BASE_URL");
        }

        assert_eq!(config.unwrap().upstream.base_url, "http://env.example");
    }

    #[test]
    fn test_rooted_storage_layout() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig::rooted_at(dir.path());
        storage.ensure_directories().unwrap();
        assert!(storage.archive_dir.is_dir());
        assert!(storage.temp_dir.is_dir());
    }
}
