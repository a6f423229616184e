//! Tests for the 'run' command
//!
//! A run takes the per-configuration lock and performs one backup pass
//! with the built-in providers.

use multibackup::config::load_config;
use multibackup::managers::backup::{BackupManager, RunOutcome};
use multibackup::managers::run_log::Logger;
use multibackup::utils::locker::RunLock;
use serial_test::serial;
use test_utils::{ConfigBuilder, TestContext};

#[tokio::test]
async fn test_run_with_default_providers() {
    let builder = ConfigBuilder::minimal();
    let config_path = builder.write_config("config.toml");
    let backups = builder.target_path("local").unwrap();
    let config = load_config(&config_path).unwrap();

    let report = BackupManager::new(config, Logger::silent()).run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.archives.len(), 1);

    let bucket = backups.join(report.timestamp.format("%Y-%m-%d").to_string());
    assert!(bucket.is_dir());
    assert_eq!(std::fs::read_dir(bucket).unwrap().count(), 1);
}

#[tokio::test]
async fn test_run_with_empty_config_stops_early() {
    let ctx = TestContext::new();
    let config_path = ctx.create_file("config.toml", "");
    let config = load_config(&config_path).unwrap();

    let report = BackupManager::new(config, ctx.logger()).run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::NoSources);
}

#[tokio::test]
async fn test_run_fails_when_workspace_cannot_be_created() {
    let ctx = TestContext::new();
    let blocker = ctx.create_file("not-a-dir", "x");
    let builder = ConfigBuilder::minimal().with_temp_directory(&blocker);

    let result = BackupManager::new(builder.to_config(), ctx.logger()).run().await;
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_overlapping_runs_are_refused() {
    let ctx = TestContext::new();
    let config_path = ctx.create_file("overlap-test.toml", "");

    let first = RunLock::acquire(&config_path).expect("Failed to acquire lock");
    assert!(RunLock::acquire(&config_path).is_err());
    drop(first);

    assert!(RunLock::acquire(&config_path).is_ok());
}
