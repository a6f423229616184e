//! Tests for the 'validate' command
//!
//! The validate command loads the configuration and builds every provider.

use chrono::Utc;
use multibackup::config::load_config;
use multibackup::managers::backup::BackupManager;
use multibackup::sources::SourceProvider;
use multibackup::strategies::RetentionStrategy;
use test_utils::{full_config_toml, ConfigBuilder, Severity, TestContext};

#[test]
fn test_validate_valid_config() {
    let builder = ConfigBuilder::minimal();
    let config_path = builder.write_config("config.toml");

    let result = load_config(&config_path);
    assert!(result.is_ok(), "Valid config should pass validation");

    let loaded = result.unwrap();
    assert_eq!(loaded.sources.len(), 1);
    assert_eq!(loaded.targets.len(), 1);
}

#[test]
fn test_validate_builds_every_provider() {
    let ctx = TestContext::new();
    let config_path = ctx.create_file("config.toml", full_config_toml());
    let config = load_config(&config_path).unwrap();

    let manager = BackupManager::new(config, ctx.logger());
    let sources = manager.build_sources();
    let strategies = manager.build_strategies(Utc::now());

    let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["pg-main", "erp", "uploads"]);

    let targets: Vec<(&str, &str)> = strategies
        .iter()
        .map(|s| (s.target_name(), s.name()))
        .collect();
    assert_eq!(
        targets,
        vec![("nas", "generations"), ("cloud", "days"), ("offsite", "days")]
    );
}

#[test]
fn test_validate_reports_required_tools() {
    let ctx = TestContext::new();
    let config_path = ctx.create_file("config.toml", full_config_toml());
    let manager = BackupManager::new(load_config(&config_path).unwrap(), ctx.logger());

    let tools: Vec<String> = manager
        .build_sources()
        .iter()
        .flat_map(|s| s.required_tools())
        .collect();

    assert!(tools.iter().any(|t| t.contains("pg_dump")));
    assert!(tools.iter().any(|t| t.contains("sqlcmd")));
}

#[test]
fn test_validate_logs_unusable_entries() {
    let ctx = TestContext::new();
    let config = ConfigBuilder::new()
        .add_simple_source("couchdb", "docs", "host=couch")
        .add_simple_source("mssql", "erp", "host=sql01")
        .build();

    let manager = BackupManager::new(config, ctx.logger());
    assert!(manager.build_sources().is_empty());
    assert!(ctx.log().contains(Severity::Error, "Skipping source 'docs'"));
    assert!(ctx.log().contains(Severity::Error, "Skipping source 'erp'"));
}

#[test]
fn test_validate_invalid_toml() {
    let ctx = TestContext::new();
    let config_path = ctx.create_file("config.toml", "invalid { toml content");

    let result = load_config(&config_path);
    assert!(result.is_err(), "Invalid TOML should fail");
}

#[test]
fn test_validate_nonexistent_file() {
    let result = load_config(std::path::Path::new("/nonexistent/config.toml"));
    assert!(result.is_err(), "Nonexistent file should fail");
}
