use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::discovery::PageSize;
use crate::retry::RetryConfig;

/// Main configuration structure for starmirror
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Root directory that receives `<owner>/<name>.git` mirrors
    #[serde(default = "default_output_directory")]
    pub output_directory: String,

    /// Account handles whose starred lists are mirrored
    #[serde(default)]
    pub accounts: Vec<String>,

    /// Starred listing endpoint settings
    #[serde(default)]
    pub listing: ListingConfig,

    /// Mirror clone behavior
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// Retry policy for listing requests
    #[serde(default)]
    pub retry: RetrySettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listing endpoint configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ListingConfig {
    /// Base URL of the GitHub REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Repositories requested per page (clamped to 1..=100)
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// User-Agent header sent with every listing request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for a single listing request in seconds (0 disables)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Mirror clone configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MirrorConfig {
    /// Git executable used for `clone --mirror`
    #[serde(default = "default_git_binary")]
    pub git_binary: String,

    /// Prefix used to build wiki remotes (`<wiki_host><owner>/<name>.wiki.git`)
    #[serde(default = "default_wiki_host")]
    pub wiki_host: String,

    /// Maximum clones running at once within a page
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Timeout for a single clone in seconds (0 disables)
    #[serde(default)]
    pub timeout: u64,
}

/// Retry policy as it appears in the config file
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrySettings {
    /// Retries after the first failed listing request
    #[serde(default)]
    pub max_retries: usize,

    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_output_directory() -> String {
    "repos".to_string()
}
fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}
fn default_per_page() -> u32 {
    PageSize::MAX
}
fn default_user_agent() -> String {
    format!("starmirror/{}", env!("CARGO_PKG_VERSION"))
}
fn default_request_timeout() -> u64 {
    30
}
fn default_git_binary() -> String {
    "git".to_string()
}
fn default_wiki_host() -> String {
    "git@github.com:".to_string()
}
fn default_max_parallel() -> usize {
    1
}
fn default_min_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    60_000
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            per_page: default_per_page(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            git_binary: default_git_binary(),
            wiki_host: default_wiki_host(),
            max_parallel: default_max_parallel(),
            timeout: 0,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 0,
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            accounts: Vec::new(),
            listing: ListingConfig::default(),
            mirror: MirrorConfig::default(),
            retry: RetrySettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Render the configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration")
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("starmirror").join("config.yml"))
    }

    /// Expand environment variables and `~` in the output directory
    pub fn expand_paths(&mut self) -> Result<()> {
        self.output_directory = shellexpand::full(&self.output_directory)
            .context("Failed to expand output_directory path")?
            .into_owned();

        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_directory)
    }

    pub fn page_size(&self) -> PageSize {
        PageSize::new(i64::from(self.listing.per_page))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.listing.request_timeout > 0).then(|| Duration::from_secs(self.listing.request_timeout))
    }

    pub fn clone_timeout(&self) -> Option<Duration> {
        (self.mirror.timeout > 0).then(|| Duration::from_secs(self.mirror.timeout))
    }

    /// Build the listing retry policy
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            Duration::from_millis(self.retry.min_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
            self.retry.max_retries,
        )
        .with_jitter(self.retry.jitter)
    }
}

/// Split a comma-separated account list, trimming entries and dropping empty ones
pub fn parse_accounts(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|account| !account.is_empty())
        .map(str::to_string)
        .collect()
}
