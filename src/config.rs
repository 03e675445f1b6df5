//! Configuration file handling.
//!
//! This module provides loading and saving of depwatch configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/depwatch/config.toml`
//! - macOS: `~/Library/Application Support/depwatch/config.toml`
//! - Windows: `%APPDATA%\depwatch\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! api_url = "https://api.osv.dev"
//! registry_url = "https://registry.npmjs.org"
//! request_timeout_secs = 10
//! cache_enabled = true
//! cache_max_age_secs = 3600
//! cache_stale_secs = 86400
//! default_format = "table"
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checker::DEFAULT_API_URL;
use crate::resolver::DEFAULT_REGISTRY_URL;

/// Application configuration.
///
/// Missing fields fall back to their defaults, so a partial file is fine.
///
/// # Example
///
/// ```no_run
/// use depwatch::Config;
///
/// let config = Config::load().unwrap();
/// println!("Upstream: {}", config.api_url);
/// println!("Timeout: {:?}", config.request_timeout());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the OSV-compatible vulnerability API.
    ///
    /// Default: `https://api.osv.dev`
    pub api_url: String,

    /// Base URL of the npm registry used to resolve version constraints.
    ///
    /// Default: `https://registry.npmjs.org`
    pub registry_url: String,

    /// Upper bound for a single upstream lookup, in seconds.
    ///
    /// A lookup that exceeds it is treated like any other failure.
    /// Default: 10
    pub request_timeout_secs: u64,

    /// Whether responses are cached on disk.
    ///
    /// Default: true
    pub cache_enabled: bool,

    /// How long a cached response is fresh, in seconds.
    ///
    /// Default: 3600
    pub cache_max_age_secs: u64,

    /// How long past freshness a cached response may still be served
    /// while it is refreshed in the background, in seconds.
    ///
    /// Default: 86400
    pub cache_stale_secs: u64,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json"
    /// Default: "table"
    pub default_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            request_timeout_secs: 10,
            cache_enabled: true,
            cache_max_age_secs: 3600,
            cache_stale_secs: 86400,
            default_format: "table".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depwatch")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }

    pub fn cache_stale_window(&self) -> Duration {
        Duration::from_secs(self.cache_stale_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.api_url, "https://api.osv.dev");
        assert_eq!(config.registry_url, "https://registry.npmjs.org");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.cache_enabled);
        assert_eq!(config.cache_max_age(), Duration::from_secs(3600));
        assert_eq!(config.cache_stale_window(), Duration::from_secs(86400));
        assert_eq!(config.default_format, "table");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "request_timeout_secs = 3\ncache_enabled = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 3);
        assert!(!config.cache_enabled);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "request_timeout_secs = \"soon\"").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            cache_max_age_secs: 60,
            default_format: "json".to_string(),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_generate_default_config_parses() {
        let generated = Config::generate_default_config();
        let parsed: Config = toml::from_str(&generated).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
