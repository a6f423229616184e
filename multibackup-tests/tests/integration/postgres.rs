//! PostgreSQL integration tests
//!
//! A throwaway server in Docker is dumped with the real `psql` and `pg_dump`
//! and delivered into a local directory target.

use super::common::{is_docker_available, is_tool_available, ContainerGuard};
use anyhow::Result;
use multibackup::config::SourceConfig;
use multibackup::managers::backup::{BackupManager, RunOutcome};
use std::process::Command;
use std::thread;
use std::time::Duration;
use test_utils::{ConfigBuilder, Severity, TestContext};

const PORT: u16 = 55432;

fn start_postgres_container(name: &str) -> Result<()> {
    let published = format!("{}:5432", PORT);
    let output = Command::new("docker")
        .args([
            "run",
            "-d",
            "--name",
            name,
            "-p",
            &published,
            "-e",
            "POSTGRES_PASSWORD=testpass",
            "-e",
            "POSTGRES_DB=sales",
            "postgres:15-alpine",
        ])
        .output()?;
    if !output.status.success() {
        anyhow::bail!(
            "docker run failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    for _ in 0..30 {
        let ready = Command::new("docker")
            .args(["exec", name, "pg_isready", "-U", "postgres"])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);

        if ready {
            return Ok(());
        }
        thread::sleep(Duration::from_secs(1));
    }

    Err(anyhow::anyhow!("PostgreSQL failed to become ready"))
}

fn exec_sql(container: &str, database: &str, sql: &str) -> Result<()> {
    Command::new("docker")
        .args([
            "exec", container, "psql", "-U", "postgres", "-d", database, "-c", sql,
        ])
        .output()?;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_postgres_databases_are_dumped_and_delivered() {
    if !is_docker_available() || !is_tool_available("pg_dump") {
        eprintln!("Docker or pg_dump not available, skipping test");
        return;
    }

    let container = "multibackup-test-postgres";
    let _guard = ContainerGuard::new(container);
    start_postgres_container(container).expect("Failed to start PostgreSQL");

    exec_sql(container, "postgres", "CREATE DATABASE hr").unwrap();
    exec_sql(
        container,
        "sales",
        "CREATE TABLE orders (id SERIAL PRIMARY KEY, item TEXT); \
         INSERT INTO orders (item) VALUES ('widget'), ('gadget')",
    )
    .unwrap();

    let ctx = TestContext::new();
    let nas = ctx.create_subdir("nas");
    let builder = ConfigBuilder::new()
        .add_source(SourceConfig {
            provider: "postgresql".to_string(),
            name: "pg".to_string(),
            source: format!(
                "host=127.0.0.1;port={};user=postgres;password=testpass",
                PORT
            ),
            exclude: Some("postgres".to_string()),
            ..SourceConfig::default()
        })
        .add_directory_target("nas", &nas, "days", 7);

    let report = BackupManager::new(builder.to_config(), ctx.logger())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.artifacts, 2, "log: {:?}", ctx.log().entries());
    assert!(!ctx.log().contains(Severity::Error, "Extraction failed"));

    let bucket = nas.join(report.timestamp.format("%Y-%m-%d").to_string());
    let delivered = ctx.list_dir(&bucket);
    assert!(delivered.iter().any(|n| n.starts_with("pg_sales.backup_")));
    assert!(delivered.iter().any(|n| n.starts_with("pg_hr.backup_")));
}

#[tokio::test]
#[ignore]
async fn test_postgres_unreachable_server_is_skipped() {
    if !is_tool_available("psql") {
        eprintln!("psql not available, skipping test");
        return;
    }

    let ctx = TestContext::new();
    let nas = ctx.create_subdir("nas");
    let data = ctx.create_file("notes.txt", "n");
    let builder = ConfigBuilder::new()
        .add_simple_source("postgresql", "pg", "host=127.0.0.1;port=1;user=postgres")
        .add_file_source("notes", &data)
        .add_directory_target("nas", &nas, "days", 7);

    let report = BackupManager::new(builder.to_config(), ctx.logger())
        .run()
        .await
        .unwrap();

    assert_eq!(report.artifacts, 1);
    assert!(ctx.log().contains(Severity::Error, "Could not discover sources"));
}
