/// Configuration management for the feed client
///
/// Loads configuration from environment variables (after `.env`).
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::services::feed::{clamp_page_size, DEFAULT_PAGE_SIZE};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Feed settings
    pub feed: FeedConfig,
    /// Media host settings
    pub media: MediaConfig,
    /// Log output settings
    pub logging: LoggingConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Avatar shown for users without a photo
    pub placeholder_avatar_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Posts per page, clamped to 1..=100
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Base URL uploaded objects are served from
    pub base_url: String,
    /// Folder for post images
    pub upload_folder: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

// Default values
fn default_placeholder_avatar() -> String {
    "/placeholder-avatar.png".to_string()
}

fn default_media_base_url() -> String {
    "https://media.local".to_string()
}

fn default_upload_folder() -> String {
    "posts".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let is_production = env == "production";

        let app = AppConfig {
            env,
            placeholder_avatar_url: std::env::var("PLACEHOLDER_AVATAR_URL")
                .unwrap_or_else(|_| default_placeholder_avatar()),
        };

        let feed = FeedConfig {
            page_size: std::env::var("FEED_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(clamp_page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE),
        };

        let base_url = match std::env::var("MEDIA_BASE_URL") {
            Ok(url) => url,
            Err(_) if is_production => {
                bail!("MEDIA_BASE_URL environment variable not set")
            }
            Err(_) => default_media_base_url(),
        };
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!("MEDIA_BASE_URL must be an http(s) URL, got {:?}", base_url);
        }

        let media = MediaConfig {
            base_url,
            upload_folder: std::env::var("MEDIA_UPLOAD_FOLDER")
                .map(|folder| folder.trim_matches('/').to_string())
                .ok()
                .filter(|folder| !folder.is_empty())
                .unwrap_or_else(default_upload_folder),
        };

        let logging = LoggingConfig {
            format: match std::env::var("LOG_FORMAT") {
                Ok(value) => parse_log_format(&value)
                    .with_context(|| format!("Invalid LOG_FORMAT {:?}", value))?,
                Err(_) if is_production => LogFormat::Json,
                Err(_) => LogFormat::Pretty,
            },
        };

        Ok(Config {
            app,
            feed,
            media,
            logging,
        })
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat> {
    match value.to_ascii_lowercase().as_str() {
        "json" => Ok(LogFormat::Json),
        "pretty" | "text" => Ok(LogFormat::Pretty),
        other => bail!("expected json or pretty, got {}", other),
    }
}
