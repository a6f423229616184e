//! Fluent API for building test configurations
//!
//! Provides a builder pattern for creating test configurations with sensible defaults.

use multibackup::config::{
    Config, GlobalConfig, LoggerConfig, Revisions, SourceConfig, StrategyConfig, TargetConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    global: GlobalConfig,
    loggers: Vec<LoggerConfig>,
    sources: Vec<SourceConfig>,
    targets: Vec<TargetConfig>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder whose workspace and logs live in a temp dir
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let workspace_base = temp_dir.path().join("work");
        fs::create_dir_all(&workspace_base).expect("Failed to create workspace base");

        let log_directory = temp_dir.path().join("logs");
        fs::create_dir_all(&log_directory).expect("Failed to create log_directory");

        let global = GlobalConfig {
            temp_directory: Some(workspace_base),
            log_directory,
            log_level: "debug".to_string(),
            log_max_files: 5,
        };

        Self {
            temp_dir,
            global,
            loggers: Vec::new(),
            sources: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// One file source and one local directory target with day retention
    pub fn minimal() -> Self {
        let builder = Self::new();

        let data = builder.temp_dir.path().join("data.txt");
        fs::write(&data, "payload").expect("Failed to write data file");
        let backups = builder.temp_dir.path().join("backups");
        fs::create_dir_all(&backups).expect("Failed to create backup dir");

        builder
            .add_file_source("data", &data)
            .add_directory_target("local", &backups, "days", 7)
    }

    /// Set the log directory
    pub fn with_log_dir(mut self, path: &Path) -> Self {
        self.global.log_directory = path.to_path_buf();
        self
    }

    /// Set the parent directory of run workspaces
    pub fn with_temp_directory(mut self, path: &Path) -> Self {
        self.global.temp_directory = Some(path.to_path_buf());
        self
    }

    /// Add a logger entry
    pub fn with_logger(mut self, provider: &str, priorities: &str, settings: Option<&Path>) -> Self {
        self.loggers.push(LoggerConfig {
            provider: provider.to_string(),
            priorities: Some(priorities.to_string()),
            settings: settings.map(|p| p.display().to_string()),
        });
        self
    }

    /// Add a source with full configuration
    pub fn add_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a source with just a provider kind and location
    pub fn add_simple_source(self, provider: &str, name: &str, source: &str) -> Self {
        self.add_source(SourceConfig {
            provider: provider.to_string(),
            name: name.to_string(),
            source: source.to_string(),
            ..SourceConfig::default()
        })
    }

    /// Add a file (or directory) source
    pub fn add_file_source(self, name: &str, path: &Path) -> Self {
        let kind = if path.is_dir() { "directory" } else { "file" };
        self.add_simple_source(kind, name, &path.display().to_string())
    }

    /// Add a target with full configuration
    pub fn add_target(mut self, target: TargetConfig) -> Self {
        self.targets.push(target);
        self
    }

    /// Add a local directory target with a retention strategy
    pub fn add_directory_target(self, name: &str, path: &Path, strategy: &str, revisions: i64) -> Self {
        self.add_target(TargetConfig {
            provider: "directory".to_string(),
            name: name.to_string(),
            target: path.display().to_string(),
            strategy: Some(StrategyConfig {
                provider: strategy.to_string(),
                revisions: Some(Revisions::Number(revisions)),
            }),
        })
    }

    /// Add a local directory target that has no strategy and is therefore skipped
    pub fn add_target_without_strategy(self, name: &str, path: &Path) -> Self {
        self.add_target(TargetConfig {
            provider: "directory".to_string(),
            name: name.to_string(),
            target: path.display().to_string(),
            strategy: None,
        })
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the workspace base directory
    pub fn workspace_base(&self) -> Option<&Path> {
        self.global.temp_directory.as_deref()
    }

    /// Get a directory target's root path
    pub fn target_path(&self, name: &str) -> Option<PathBuf> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .map(|t| PathBuf::from(&t.target))
    }

    /// Config as currently built, keeping the temp dir alive
    pub fn to_config(&self) -> Config {
        Config {
            global: self.global.clone(),
            loggers: self.loggers.clone(),
            sources: self.sources.clone(),
            targets: self.targets.clone(),
        }
    }

    /// Build the Config
    pub fn build(self) -> Config {
        self.to_config()
    }

    /// Serialize the configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string(&self.to_config()).expect("Failed to serialize config")
    }

    /// Write the configuration into the temp dir and return its path
    pub fn write_config(&self, file_name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(file_name);
        fs::write(&path, self.to_toml()).expect("Failed to write config file");
        path
    }

    /// Keep the temp directory (don't delete on drop)
    pub fn persist(self) -> (Config, TempDir) {
        let config = self.to_config();
        (config, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
