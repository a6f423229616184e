//! Database sources driven through the registry and a full run,
//! with the mock executor standing in for the dump tools

use chrono::{TimeZone, Utc};
use multibackup::managers::backup::{BackupManager, RunOutcome};
use multibackup::sources::SourceRegistry;
use multibackup::strategies::StrategyRegistry;
use multibackup::targets::TargetRegistry;
use rstest::rstest;
use std::sync::Arc;
use test_utils::{ConfigBuilder, MockExecutor, MockResponse, Severity, SourceConfig, TestContext};

fn source(provider: &str, name: &str, source: &str) -> SourceConfig {
    SourceConfig {
        provider: provider.to_string(),
        name: name.to_string(),
        source: source.to_string(),
        ..SourceConfig::default()
    }
}

#[rstest]
#[case("postgresql")]
#[case("PostgreSQL")]
#[case(" mysql ")]
#[case("MSSQL")]
#[case("oracle")]
#[case("sqlite")]
#[case("file")]
#[case("Directory")]
fn test_registry_builds_builtin_kinds(#[case] kind: &str) {
    let registry = SourceRegistry::with_defaults(Arc::new(MockExecutor::new()));
    let ctx = TestContext::new();
    // Locations are only checked when the run discovers units
    let config = source(kind, "db", "host=db;user=backup;password=pw");

    let built = registry.create(&config, &ctx.logger());
    assert!(built.is_ok(), "{} should build: {:?}", kind, built.err());
}

#[test]
fn test_db2_requires_include_list() {
    let registry = SourceRegistry::with_defaults(Arc::new(MockExecutor::new()));
    let ctx = TestContext::new();

    assert!(registry
        .create(&source("db2", "warehouse", "host=db2"), &ctx.logger())
        .is_err());

    let mut with_include = source("db2", "warehouse", "host=db2");
    with_include.include = Some("SAMPLE".to_string());
    assert!(registry.create(&with_include, &ctx.logger()).is_ok());
}

#[tokio::test]
async fn test_postgres_run_end_to_end() {
    let ctx = TestContext::new();
    let nas = ctx.create_subdir("nas");
    let executor = MockExecutor::new()
        .expect("psql", MockResponse::stdout("postgres\nsales\nhr\n"))
        .expect("pg_dump", MockResponse::stdout("pg-dump-bytes"));

    let mut pg = source("postgresql", "pg-main", "host=db;user=backup;password=secret");
    pg.exclude = Some("postgres".to_string());
    let builder = ConfigBuilder::new()
        .add_source(pg)
        .add_directory_target("nas", &nas, "days", 7);

    let report = BackupManager::new(builder.to_config(), ctx.logger())
        .with_registries(
            SourceRegistry::with_defaults(Arc::new(executor.clone())),
            TargetRegistry::with_defaults(),
            StrategyRegistry::with_defaults(),
        )
        .with_timestamp(Utc.with_ymd_and_hms(2024, 1, 10, 1, 0, 0).unwrap())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.artifacts, 2);
    assert_eq!(executor.call_count("pg_dump"), 2);

    let delivered = ctx.list_dir(&nas.join("2024-01-10"));
    assert_eq!(delivered.len(), 2);
    assert!(delivered.iter().any(|n| n.starts_with("pg-main_sales.backup_")));
    assert!(delivered.iter().any(|n| n.starts_with("pg-main_hr.backup_")));
}

#[tokio::test]
async fn test_unreachable_server_contributes_nothing() {
    let ctx = TestContext::new();
    let nas = ctx.create_subdir("nas");
    let executor = MockExecutor::new()
        .expect("mysql", MockResponse::failure("Can't connect to MySQL server"));
    let data = ctx.create_file("notes.txt", "n");

    let builder = ConfigBuilder::new()
        .add_source(source("mysql", "shop", "host=mysql;user=root;password=pw"))
        .add_file_source("notes", &data)
        .add_directory_target("nas", &nas, "days", 7);

    let report = BackupManager::new(builder.to_config(), ctx.logger())
        .with_registries(
            SourceRegistry::with_defaults(Arc::new(executor.clone())),
            TargetRegistry::with_defaults(),
            StrategyRegistry::with_defaults(),
        )
        .run()
        .await
        .unwrap();

    assert_eq!(report.artifacts, 1);
    assert!(!executor.was_called("mysqldump"));
    assert!(ctx.log().contains(Severity::Error, "Could not discover sources"));
}
