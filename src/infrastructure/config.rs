//! Configuration infrastructure
//!
//! Application configuration with serde-backed JSON file loading and
//! sensible defaults, plus the fixed upstream site endpoints.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use super::http_client::HttpClientConfig;

/// Fixed upstream endpoints the pipeline talks to.
pub mod sites {
    pub const HOLOLIVE_TALENTS_URL: &str = "https://hololive.hololivepro.com/talents";
    pub const NIJISANJI_TALENTS_URL: &str = "https://www.nijisanji.jp/talents";
    pub const NIJISANJI_BASE_URL: &str = "https://www.nijisanji.jp";
    pub const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";

    /// Per-talent page on the agency B site, used for slug resolution.
    #[must_use]
    pub fn nijisanji_talent_url(slug: &str) -> String {
        format!("{NIJISANJI_BASE_URL}/talents/l/{slug}")
    }

    /// Per-channel Atom video feed.
    #[must_use]
    pub fn youtube_feed_url(channel_id: &str) -> String {
        format!("{YOUTUBE_BASE_URL}/feeds/videos.xml?channel_id={channel_id}")
    }

    /// Predictable thumbnail location when the feed carries none.
    #[must_use]
    pub fn youtube_thumbnail_url(video_id: &str) -> String {
        format!("https://i.ytimg.com/vi/{video_id}/mqdefault.jpg")
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database location, in sqlx URL form.
    pub database_url: String,

    /// Outbound HTTP settings.
    pub http: HttpClientConfig,

    /// Refresh-cycle settings.
    pub update: UpdateConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/tracker.db".to_string(),
            http: HttpClientConfig::default(),
            update: UpdateConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, falling back to defaults when
    /// the file does not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }
}

/// Settings for the refresh cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Number of members whose feeds are refreshed concurrently.
    pub batch_size: usize,

    /// Roster refresh is skipped when the last successful one is younger
    /// than this many days and the store already covers both groups.
    pub freshness_days: i64,

    /// Pause before each pending-identifier resolution fetch.
    pub resolve_delay_ms: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            freshness_days: 7,
            resolve_delay_ms: 1000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter, e.g. "info" or "vtuber_tracker=debug".
    pub level: String,

    /// Also write daily-rotated log files.
    pub log_to_file: bool,

    /// Directory for log files when file logging is enabled.
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_dir: "logs".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_constants() {
        let config = AppConfig::default();
        assert_eq!(config.update.batch_size, 5);
        assert_eq!(config.update.freshness_days, 7);
        assert_eq!(config.update.resolve_delay_ms, 1000);
    }

    #[tokio::test]
    async fn missing_config_file_falls_back_to_defaults() {
        let config = AppConfig::load("does/not/exist.json").await.unwrap();
        assert_eq!(config.database_url, AppConfig::default().database_url);
    }

    #[tokio::test]
    async fn partial_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(&path, r#"{"update": {"batch_size": 2}}"#).unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.update.batch_size, 2);
        assert_eq!(config.update.freshness_days, 7);
    }
}
