use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub loggers: Vec<LoggerConfig>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Parent directory for the per-run workspace (system temp dir if unset)
    #[serde(default)]
    pub temp_directory: Option<PathBuf>,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            temp_directory: None,
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
        }
    }
}

/// A log sink the run reports into
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggerConfig {
    /// `console` or `file`
    #[serde(default)]
    pub provider: String,

    /// Comma separated severities (`verbose`, `info`, `error`, `all`, `none`)
    #[serde(default)]
    pub priorities: Option<String>,

    /// Provider specific settings (the log directory for `file`)
    #[serde(default)]
    pub settings: Option<String>,
}

/// A place data is extracted from
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SourceConfig {
    #[serde(default)]
    pub provider: String,

    /// Unique among all sources; prefixes archive names
    #[serde(default)]
    pub name: String,

    /// Provider specific connection string or path
    #[serde(default)]
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
}

/// A place archives are delivered to
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TargetConfig {
    #[serde(default)]
    pub provider: String,

    /// Unique among all targets
    #[serde(default)]
    pub name: String,

    /// Provider specific connection string or path
    #[serde(default)]
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyConfig>,
}

/// Retention strategy applied to a target after each save
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct StrategyConfig {
    /// `days` or `generations`
    #[serde(default)]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisions: Option<Revisions>,
}

impl StrategyConfig {
    /// Number of revisions to keep; zero means keep forever
    pub fn revisions(&self) -> u32 {
        match &self.revisions {
            Some(revisions) => revisions.count(),
            None => 0,
        }
    }
}

/// Revisions may be written as a number or as a string; any other value
/// (a float, a boolean) still loads and means keep forever
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Revisions {
    Number(i64),
    Text(String),
    Other(toml::Value),
}

impl Revisions {
    /// Non-positive and unparsable values collapse to zero
    pub fn count(&self) -> u32 {
        let value = match self {
            Revisions::Number(n) => *n,
            Revisions::Text(s) => s.trim().parse::<i64>().unwrap_or(0),
            Revisions::Other(_) => 0,
        };

        u32::try_from(value.max(0)).unwrap_or(u32::MAX)
    }
}

// Default value functions

fn default_log_directory() -> PathBuf { PathBuf::from("~/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
