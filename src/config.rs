use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::abuse::AbuseConfig;
use crate::models::DEFAULT_TIMESTAMP_FORMAT;
use crate::window::DEFAULT_WINDOW_SECS;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub detector: AbuseConfig,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or create default
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/accesswatch/config.toml"),
            dirs_next::config_dir()
                .map(|p| p.join("accesswatch/config.toml"))
                .unwrap_or_default(),
            PathBuf::from("accesswatch.toml"),
        ];

        for path in &paths {
            if path.is_file() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Input log and output report locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Access log to analyze
    #[serde(default = "default_input")]
    pub input: PathBuf,

    /// Busiest hosts report (`host,hits`)
    #[serde(default = "default_hosts")]
    pub hosts: PathBuf,

    /// Busiest rolling windows report (`anchor,count`)
    #[serde(default = "default_hours")]
    pub hours: PathBuf,

    /// Bandwidth-heaviest resources report (`resource`)
    #[serde(default = "default_resources")]
    pub resources: PathBuf,

    /// Verbatim lines of blocked requests
    #[serde(default = "default_blocked")]
    pub blocked: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            hosts: default_hosts(),
            hours: default_hours(),
            resources: default_resources(),
            blocked: default_blocked(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Rolling window length in seconds
    #[serde(default = "default_window_length")]
    pub length: u64,

    /// strftime layout of the log timestamps, also used to print window anchors
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            length: default_window_length(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Entries per report
    #[serde(default = "default_top")]
    pub top: usize,

    /// Count requests of blocked hosts toward hosts/resources/windows as well
    #[serde(default)]
    pub count_blocked_requests: bool,

    /// Skip lines that are not access log records instead of aborting
    #[serde(default)]
    pub skip_malformed: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top: default_top(),
            count_blocked_requests: false,
            skip_malformed: false,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_input() -> PathBuf {
    PathBuf::from("log_input/log.txt")
}

fn default_hosts() -> PathBuf {
    PathBuf::from("log_output/hosts.txt")
}

fn default_hours() -> PathBuf {
    PathBuf::from("log_output/hours.txt")
}

fn default_resources() -> PathBuf {
    PathBuf::from("log_output/resources.txt")
}

fn default_blocked() -> PathBuf {
    PathBuf::from("log_output/blocked.txt")
}

fn default_window_length() -> u64 {
    DEFAULT_WINDOW_SECS
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_string()
}

fn default_top() -> usize {
    10
}
