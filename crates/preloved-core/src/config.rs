use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};

use crate::feed::FeedSettings;

pub const DEFAULT_API_URL: &str = "http://localhost:8088";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub api_key: Option<String>,
    pub low_water_mark: usize,
    pub batch_size: usize,
    pub fetch_concurrency: usize,
    pub like_feedback_type: String,
    pub request_timeout_secs: u64,
    pub flush_interval_secs: u64,
    pub last_user: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let feed = FeedSettings::default();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            low_water_mark: feed.low_water_mark,
            batch_size: feed.batch_size,
            fetch_concurrency: feed.fetch_concurrency,
            like_feedback_type: feed.like_feedback_type,
            request_timeout_secs: 10,
            flush_interval_secs: 30,
            last_user: None,
        }
    }
}

impl Config {
    /// Load the user config, then apply `GORSE_API_URL` / `GORSE_API_KEY`.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Record `user_id` as the last user in the config at `path`.
    ///
    /// A config file that cannot be read is left alone.
    pub fn save_last_user_to(path: &Path, user_id: &str) -> Result<()> {
        let mut config = Self::load_from(path).context("Not overwriting unreadable config")?;
        config.last_user = Some(user_id.to_string());
        config.save_to(path)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("GORSE_API_URL").ok(),
            std::env::var("GORSE_API_KEY").ok(),
        );
    }

    fn apply_overrides(&mut self, api_url: Option<String>, api_key: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.is_empty()) {
            self.api_url = url;
        }
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            low_water_mark: self.low_water_mark,
            batch_size: self.batch_size.max(1),
            fetch_concurrency: self.fetch_concurrency.max(1),
            like_feedback_type: self.like_feedback_type.clone(),
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("preloved"))
    }

    pub fn path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.low_water_mark, 5);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.like_feedback_type, "star");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            api_url: "http://gorse:8087".to_string(),
            last_user: Some("alice".to_string()),
            batch_size: 20,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"low_water_mark": 3}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.low_water_mark, 3);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_save_last_user_keeps_other_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"batch_size": 12}"#).unwrap();

        Config::save_last_user_to(&path, "alice").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.last_user.as_deref(), Some("alice"));
        assert_eq!(config.batch_size, 12);
    }

    #[test]
    fn test_save_last_user_leaves_malformed_file_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{\"batch_size\": ").unwrap();

        assert!(Config::save_last_user_to(&path, "alice").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"batch_size\": ");
    }

    #[test]
    fn test_overrides_ignore_empty_values() {
        let mut config = Config::default();
        config.apply_overrides(Some(String::new()), Some("secret".to_string()));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_feed_settings_clamp_zero_sizes() {
        let config = Config {
            batch_size: 0,
            fetch_concurrency: 0,
            ..Config::default()
        };
        let settings = config.feed_settings();
        assert_eq!(settings.batch_size, 1);
        assert_eq!(settings.fetch_concurrency, 1);
    }
}
