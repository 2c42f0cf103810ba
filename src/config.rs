use std::path::Path;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Bluesky posting; omit the section to disable the platform.
    #[serde(default)]
    pub bluesky: Option<BlueskyConfig>,
    /// Instagram posting; omit the section to disable the platform.
    #[serde(default)]
    pub instagram: Option<InstagramConfig>,
}

/// Where the stop-visit telemetry comes from.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub base_url: String,
    /// Sent as the `key` header on every feed request. Overridable with the
    /// SHUTTLE_FEED_KEY environment variable.
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// IANA zone the reports are computed and scheduled in (default:
    /// America/Chicago).
    #[serde(default = "ScheduleConfig::default_timezone")]
    pub timezone: Tz,
    /// Local time the daily report posts (default: 08:00).
    #[serde(default = "ScheduleConfig::default_daily_post_time")]
    pub daily_post_time: NaiveTime,
    /// Local time the weekly report posts on Mondays (default: 09:00).
    #[serde(default = "ScheduleConfig::default_weekly_post_time")]
    pub weekly_post_time: NaiveTime,
    /// Run one daily and one weekly cycle at startup before entering the
    /// scheduled loops (debugging).
    #[serde(default)]
    pub post_immediately: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: Self::default_timezone(),
            daily_post_time: Self::default_daily_post_time(),
            weekly_post_time: Self::default_weekly_post_time(),
            post_immediately: false,
        }
    }
}

impl ScheduleConfig {
    fn default_timezone() -> Tz {
        chrono_tz::America::Chicago
    }
    fn default_daily_post_time() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }
    fn default_weekly_post_time() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlueskyConfig {
    #[serde(default = "BlueskyConfig::default_service")]
    pub service: String,
    /// Handle or DID the bot posts as.
    pub identifier: String,
    /// App password. Overridable with the BLUESKY_PASSWORD environment
    /// variable.
    #[serde(default)]
    pub password: String,
}

impl BlueskyConfig {
    fn default_service() -> String {
        crate::providers::bluesky::DEFAULT_SERVICE.to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstagramConfig {
    pub account_id: String,
    /// Long-lived Graph API token. Overridable with the
    /// INSTAGRAM_ACCESS_TOKEN environment variable.
    #[serde(default)]
    pub access_token: String,
    /// Pre-rendered status images, selected by the period verdict.
    pub good_image_url: String,
    pub bad_image_url: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let mut config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Secrets may live in the environment instead of the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("SHUTTLE_FEED_KEY") {
            self.feed.api_key = key;
        }
        if let Some(bluesky) = self.bluesky.as_mut() {
            if let Ok(password) = std::env::var("BLUESKY_PASSWORD") {
                bluesky.password = password;
            }
        }
        if let Some(instagram) = self.instagram.as_mut() {
            if let Ok(token) = std::env::var("INSTAGRAM_ACCESS_TOKEN") {
                instagram.access_token = token;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.api_key.is_empty() {
            return Err(ConfigError::Incomplete(
                "feed.api_key is empty and SHUTTLE_FEED_KEY is unset",
            ));
        }
        if let Some(bluesky) = &self.bluesky {
            if bluesky.password.is_empty() {
                return Err(ConfigError::Incomplete(
                    "bluesky.password is empty and BLUESKY_PASSWORD is unset",
                ));
            }
        }
        if let Some(instagram) = &self.instagram {
            if instagram.access_token.is_empty() {
                return Err(ConfigError::Incomplete(
                    "instagram.access_token is empty and INSTAGRAM_ACCESS_TOKEN is unset",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Incomplete config: {0}")]
    Incomplete(&'static str),
}
