//! Dashboard configuration, read from `.changes/dashboard.toml`.
//!
//! Layered file → environment → CLI. Every section and key is optional.
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:5000"
//! timeout_secs = 30
//!
//! [pusher]
//! poll_interval_secs = 10
//! per_page = 50
//!
//! [links]
//! phabricator_host = "https://phabricator.example.com"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3142
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! dir = ".changes/logs"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pusher::AggregatorConfig;
use crate::pusher::aggregator::MIN_POLL_INTERVAL;

pub const DEFAULT_CONFIG_PATH: &str = ".changes/dashboard.toml";
pub const API_URL_ENV: &str = "CHANGES_API_URL";
pub const PHABRICATOR_HOST_ENV: &str = "PHABRICATOR_LINK_HOST";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PusherSection {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Used when the page's query does not set `per_page`.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_per_page() -> u32 {
    crate::pusher::query::DEFAULT_PER_PAGE
}

impl Default for PusherSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            per_page: default_per_page(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksSection {
    #[serde(default = "default_phabricator_host")]
    pub phabricator_host: String,
}

fn default_phabricator_host() -> String {
    "https://phabricator.example.com".to_string()
}

impl Default for LinksSection {
    fn default() -> Self {
        Self {
            phabricator_host: default_phabricator_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3142
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Default filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for the rolling log file. Empty disables file logging.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".changes/logs")
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub pusher: PusherSection,
    #[serde(default)]
    pub links: LinksSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl DashConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse dashboard.toml")
    }

    /// Load `path`, or defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from `path` (or the default location) and apply environment
    /// overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let mut config = Self::load_or_default(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize dashboard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Environment variables win over file values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.is_empty()) {
            self.api.base_url = url;
        }
        if let Some(host) = lookup(PHABRICATOR_HOST_ENV).filter(|v| !v.is_empty()) {
            self.links.phabricator_host = host;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.pusher.poll_interval_secs)
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            poll_interval: self.poll_interval().max(MIN_POLL_INTERVAL),
            phabricator_host: self.links.phabricator_host.clone(),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(err) = url::Url::parse(&self.api.base_url) {
            warnings.push(format!(
                "Invalid api.base_url '{}': {}",
                self.api.base_url, err
            ));
        }
        if self.api.timeout_secs == 0 {
            warnings.push("api.timeout_secs is 0; every request will time out".to_string());
        }
        if self.pusher.poll_interval_secs == 0 {
            warnings.push("pusher.poll_interval_secs is 0; using 1 second".to_string());
        }
        if self.pusher.per_page == 0 {
            warnings.push("pusher.per_page is 0; feeds will be empty".to_string());
        }
        if self.links.phabricator_host.is_empty() {
            warnings.push("links.phabricator_host is empty; commit links will be relative".to_string());
        }

        warnings
    }
}
