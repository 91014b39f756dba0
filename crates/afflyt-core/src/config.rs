//! Configuration management for Afflyt.
//!
//! Loads configuration from ${AFFLYT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod paths {
    //! Path resolution for Afflyt configuration and data files.
    //!
    //! AFFLYT_HOME resolution order:
    //! 1. AFFLYT_HOME environment variable (if set)
    //! 2. ~/.config/afflyt (default)

    use std::path::PathBuf;

    /// Returns the Afflyt home directory.
    ///
    /// Checks AFFLYT_HOME env var first, falls back to ~/.config/afflyt.
    /// Uses the current directory when no home directory can be determined.
    pub fn afflyt_home() -> PathBuf {
        if let Ok(home) = std::env::var("AFFLYT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("afflyt"))
            .unwrap_or_else(|| PathBuf::from(".afflyt"))
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        afflyt_home().join("config.toml")
    }

    /// Returns the path to the local key-value storage file.
    pub fn storage_path() -> PathBuf {
        afflyt_home().join("storage.json")
    }
}

/// Timings of the public preview flow, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PreviewConfig {
    /// Interval between two security-check progress ticks
    pub tick_ms: u64,
    /// Pause between reaching 100% and navigating
    pub completion_pause_ms: u64,
    /// Delay before a returning visitor is redirected
    pub auto_redirect_delay_ms: u64,
    /// Delay between mount and the tracking pixel request
    pub pixel_delay_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            tick_ms: 150,
            completion_pause_ms: 500,
            auto_redirect_delay_ms: 1500,
            pixel_delay_ms: 100,
        }
    }
}

impl PreviewConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn completion_pause(&self) -> Duration {
        Duration::from_millis(self.completion_pause_ms)
    }

    pub fn auto_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.auto_redirect_delay_ms)
    }

    pub fn pixel_delay(&self) -> Duration {
        Duration::from_millis(self.pixel_delay_ms)
    }
}

/// Where the redirect gate sends visitors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RedirectsConfig {
    /// Target for pages that require an authenticated session
    pub login_path: String,
    /// Target for guest-only pages when already authenticated
    pub home_path: String,
}

impl Default for RedirectsConfig {
    fn default() -> Self {
        Self {
            login_path: "/auth/signin".to_string(),
            home_path: "/dashboard".to_string(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Afflyt backend API
    pub api_base_url: String,

    /// HTTP request timeout in seconds (0 disables)
    pub request_timeout_secs: u64,

    /// Optional path of a log file (logs go to stderr when unset)
    pub log_file: Option<String>,

    /// Preview flow timings
    #[serde(default)]
    pub preview: PreviewConfig,

    /// Redirect gate targets
    #[serde(default)]
    pub redirects: RedirectsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: Self::DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            log_file: None,
            preview: PreviewConfig::default(),
            redirects: RedirectsConfig::default(),
        }
    }
}

impl Config {
    pub const DEFAULT_API_BASE_URL: &str = "https://api.afflyt.io";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Loads configuration from the default config path.
    ///
    /// `AFFLYT_API_URL` overrides `api_base_url` when set.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&paths::config_path())?;
        if let Ok(url) = std::env::var("AFFLYT_API_URL")
            && !url.trim().is_empty()
        {
            config.api_base_url = url.trim().to_string();
        }
        Ok(config)
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes a default config file, refusing to overwrite an existing one.
    ///
    /// # Errors
    /// Returns an error if the file exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            toml::to_string_pretty(&Config::default()).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Returns the configured request timeout, `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}
