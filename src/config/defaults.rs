/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Storage defaults
pub const DEFAULT_CONFIG_DIR: &str = "./data/config";
pub const DEFAULT_CACHE_DIR: &str = "./data/cache";
pub const DEFAULT_CURRENT_DIR: &str = "./data/current";
pub const DEFAULT_ARCHIVE_DIR: &str = "./data/archives";
pub const DEFAULT_TEMP_DIR: &str = "./data/tmp";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/epg-merge.db?mode=rwc";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

// Upstream defaults
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://share.jesmann.com";
pub const DEFAULT_DOWNLOAD_TIMEOUT: &str = "120s";
pub const DEFAULT_HEAD_TIMEOUT: &str = "10s";
pub const DEFAULT_WEBHOOK_TIMEOUT: &str = "10s";
pub const DEFAULT_USER_AGENT: &str = concat!("epg-merge/", env!("CARGO_PKG_VERSION"));

// Merge defaults
pub const DEFAULT_OUTPUT_FILENAME: &str = "merged.xml.gz";
pub const DEFAULT_CHANNELS_FILE: &str = "channels.json";
pub const DEFAULT_CACHE_MAX_AGE: &str = "24h";
pub const DEFAULT_ARCHIVE_RETENTION_DAYS: u32 = 30;

// Job controller defaults
pub const DEFAULT_MERGE_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_RECOVERY_THRESHOLD: &str = "2h";
pub const DEFAULT_MEMORY_SAMPLE_INTERVAL: &str = "500ms";
pub const DEFAULT_MAX_SLEEP_CHUNK: &str = "60s";
pub const DEFAULT_HISTORY_LIMIT: u64 = 50;
pub const DEFAULT_HISTORY_RETENTION_DAYS: u32 = 30;

// Logging defaults
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_FORMAT: &str = "text";
