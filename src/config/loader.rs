use super::types::*;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Target '{0}' not found")]
    TargetNotFound(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration.
///
/// Only duplicate names are rejected here. Nameless entries, unknown
/// providers and missing connection keys are reported per entry when the run
/// builds its sources and targets, so one bad entry does not stop the others.
pub fn validate_config(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();
    for name in config.sources.iter().map(|s| s.name.trim()).filter(|n| !n.is_empty()) {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateName {
                kind: "source",
                name: name.to_string(),
            });
        }
    }

    let mut seen = HashSet::new();
    for name in config.targets.iter().map(|t| t.name.trim()).filter(|n| !n.is_empty()) {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateName {
                kind: "target",
                name: name.to_string(),
            });
        }
    }

    Ok(())
}

/// Look up a target by name
pub fn find_target<'a>(config: &'a Config, name: &str) -> Result<&'a TargetConfig> {
    config
        .targets
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| ConfigError::TargetNotFound(name.to_string()))
}
