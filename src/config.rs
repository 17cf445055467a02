//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the timing constants shared across the bot.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_bot_token: String,

    /// Telegram application ID the local Bot API server runs with
    pub api_id: Option<String>,
    /// Telegram application hash the local Bot API server runs with
    pub api_hash: Option<String>,
    /// Base URL of the self-hosted Bot API server used for large files
    pub local_bot_api_url: Option<String>,

    /// Root directory for per-job working directories
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
    /// yt-dlp executable
    #[serde(default = "default_ytdlp_bin")]
    pub ytdlp_bin: String,
    /// ffmpeg executable
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
    /// Browser yt-dlp reads cookies from in the first extractor strategy
    #[serde(default = "default_cookies_browser")]
    pub cookies_browser: String,
    /// MP3 bitrate in kbps
    #[serde(default = "default_audio_bitrate_kbps")]
    pub audio_bitrate_kbps: u32,

    /// yt-dlp run timeout per strategy
    #[serde(default = "default_ytdlp_timeout_secs")]
    pub ytdlp_timeout_secs: u64,
    /// ffmpeg run timeout
    #[serde(default = "default_ffmpeg_timeout_secs")]
    pub ffmpeg_timeout_secs: u64,
    /// How long a recognized link stays selectable
    #[serde(default = "default_pending_link_ttl_secs")]
    pub pending_link_ttl_secs: u64,
    /// Number of download jobs allowed to run at once
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Request timeout for the standard Bot API endpoint
    #[serde(default = "default_primary_upload_timeout_secs")]
    pub primary_upload_timeout_secs: u64,
    /// Request timeout for the self-hosted Bot API server
    #[serde(default = "default_secondary_upload_timeout_secs")]
    pub secondary_upload_timeout_secs: u64,
}

fn default_download_dir() -> String {
    "downloads".to_string()
}

fn default_ytdlp_bin() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_cookies_browser() -> String {
    "firefox".to_string()
}

const fn default_audio_bitrate_kbps() -> u32 {
    192
}

const fn default_ytdlp_timeout_secs() -> u64 {
    600
}

const fn default_ffmpeg_timeout_secs() -> u64 {
    900
}

const fn default_pending_link_ttl_secs() -> u64 {
    900
}

const fn default_max_concurrent_jobs() -> usize {
    2
}

const fn default_primary_upload_timeout_secs() -> u64 {
    180
}

const fn default_secondary_upload_timeout_secs() -> u64 {
    1800
}

/// Endpoint of the self-hosted Bot API server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryEndpoint {
    /// Server base URL
    pub api_url: reqwest::Url,
    /// Parsed application ID
    pub api_id: i32,
}

/// Result of validating the large-file transport settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecondaryTransportConfig {
    /// Nothing configured
    Disabled,
    /// All credentials present and valid
    Enabled(SecondaryEndpoint),
    /// Partially or wrongly configured
    Invalid(String),
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the bot token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked in
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__MAX_CONCURRENT_JOBS=4 ./target/app`
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain UPPER_SNAKE_CASE variables, empty values treated as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let settings: Self = s.try_deserialize()?;

        if settings.telegram_bot_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "TELEGRAM_BOT_TOKEN is empty".to_string(),
            ));
        }

        Ok(settings)
    }

    /// Validates the credentials that gate the large-file transport.
    ///
    /// The transport is enabled only when the server URL, a numeric
    /// `API_ID` and a non-empty `API_HASH` are all present.
    #[must_use]
    pub fn secondary_transport(&self) -> SecondaryTransportConfig {
        let url = non_empty(self.local_bot_api_url.as_deref());
        let api_id = non_empty(self.api_id.as_deref());
        let api_hash = non_empty(self.api_hash.as_deref());

        match (url, api_id, api_hash) {
            (None, None, None) => SecondaryTransportConfig::Disabled,
            (Some(url), Some(api_id), Some(_)) => {
                let Ok(api_id) = api_id.parse::<i32>() else {
                    return SecondaryTransportConfig::Invalid(format!(
                        "API_ID '{api_id}' must be an integer"
                    ));
                };
                match reqwest::Url::parse(url) {
                    Ok(api_url) => {
                        SecondaryTransportConfig::Enabled(SecondaryEndpoint { api_url, api_id })
                    }
                    Err(e) => SecondaryTransportConfig::Invalid(format!(
                        "LOCAL_BOT_API_URL '{url}' is not a valid URL: {e}"
                    )),
                }
            }
            (url, api_id, api_hash) => {
                let missing: Vec<&str> = [
                    ("LOCAL_BOT_API_URL", url.is_none()),
                    ("API_ID", api_id.is_none()),
                    ("API_HASH", api_hash.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                SecondaryTransportConfig::Invalid(format!("missing {}", missing.join(", ")))
            }
        }
    }

    /// Root directory for job working directories
    #[must_use]
    pub fn download_root(&self) -> PathBuf {
        PathBuf::from(&self.download_dir)
    }

    /// yt-dlp timeout
    #[must_use]
    pub const fn ytdlp_timeout(&self) -> Duration {
        Duration::from_secs(self.ytdlp_timeout_secs)
    }

    /// ffmpeg timeout
    #[must_use]
    pub const fn ffmpeg_timeout(&self) -> Duration {
        Duration::from_secs(self.ffmpeg_timeout_secs)
    }

    /// Pending link lifetime
    #[must_use]
    pub const fn pending_link_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_link_ttl_secs)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// Telegram API retry policy
/// First backoff delay for retried Telegram API calls
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling for retried Telegram API calls
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum retries for a Telegram API call
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Connect timeout for both Bot API clients
pub const TELEGRAM_CONNECT_TIMEOUT_SECS: u64 = 60;

/// Minimum interval between two edits of the same status message
pub const PROGRESS_EDIT_INTERVAL: Duration = Duration::from_secs(1);
/// Lifetime of an edit-throttle entry nobody cleaned up
pub const PROGRESS_THROTTLE_TTL: Duration = Duration::from_secs(3600);
/// Maximum number of status messages tracked by the edit throttle
pub const PROGRESS_THROTTLE_MAX_SIZE: u64 = 1_000;
/// Maximum number of remembered links
pub const PENDING_LINKS_MAX_SIZE: u64 = 10_000;

/// Defaults with a dummy token, for unit tests across the crate
#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
    Settings {
        telegram_bot_token: "dummy".to_string(),
        api_id: None,
        api_hash: None,
        local_bot_api_url: None,
        download_dir: default_download_dir(),
        ytdlp_bin: default_ytdlp_bin(),
        ffmpeg_bin: default_ffmpeg_bin(),
        cookies_browser: default_cookies_browser(),
        audio_bitrate_kbps: default_audio_bitrate_kbps(),
        ytdlp_timeout_secs: default_ytdlp_timeout_secs(),
        ffmpeg_timeout_secs: default_ffmpeg_timeout_secs(),
        pending_link_ttl_secs: default_pending_link_ttl_secs(),
        max_concurrent_jobs: default_max_concurrent_jobs(),
        primary_upload_timeout_secs: default_primary_upload_timeout_secs(),
        secondary_upload_timeout_secs: default_secondary_upload_timeout_secs(),
    }
}
