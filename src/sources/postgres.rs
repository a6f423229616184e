use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use super::database::{output_lines, DatabaseSource};
use super::{BackupArtifact, SourceBase, SourceProvider};
use crate::config::SourceConfig;
use crate::error::ProviderError;
use crate::managers::run_log::Logger;
use crate::utils::executor::CommandExecutor;

const LIST_DATABASES: &str =
    "SELECT datname FROM pg_database WHERE datistemplate = FALSE ORDER BY datname";

/// PostgreSQL: one `pg_dump` tar archive per database
pub struct PostgresSource {
    db: DatabaseSource,
}

impl PostgresSource {
    pub fn new(
        config: &SourceConfig,
        logger: &Logger,
        executor: Arc<dyn CommandExecutor>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            db: DatabaseSource::new(config, logger, executor)?,
        })
    }

    fn connection_args(&self) -> Vec<String> {
        let mut args = vec!["--host".to_string(), self.db.host().to_string()];
        if let Some(port) = self.db.port() {
            args.extend(["--port".to_string(), port.to_string()]);
        }
        if let Some(user) = self.db.user() {
            args.extend(["--username".to_string(), user.to_string()]);
        }
        args.push("--no-password".to_string());
        args
    }
}

impl SourceProvider for PostgresSource {
    fn base(&self) -> &SourceBase {
        &self.db.base
    }

    fn discover(&self) -> Result<Option<Vec<String>>> {
        let mut args = self.connection_args();
        args.extend([
            "--dbname".to_string(),
            "postgres".to_string(),
            "--tuples-only".to_string(),
            "--no-align".to_string(),
            "--command".to_string(),
            LIST_DATABASES.to_string(),
        ]);

        let output = self
            .db
            .executor()
            .run_command_stdout(
                &self.db.binary("psql")?,
                &args,
                &self.db.password_env("PGPASSWORD"),
                Some(self.db.timeout()),
            )
            .with_context(|| format!("Could not connect to {}", self.db.host()))?;

        Ok(Some(output_lines(&output)))
    }

    fn extract(&self, database: &str, workspace: &Path) -> Result<BackupArtifact> {
        let artifact = BackupArtifact::in_workspace(workspace, format!("{}.backup", database));

        let mut args = self.connection_args();
        args.extend([
            "--format=tar".to_string(),
            "--blobs".to_string(),
            database.to_string(),
        ]);

        self.db.executor().run_command_to_file(
            &self.db.binary("pg_dump")?,
            &args,
            &self.db.password_env("PGPASSWORD"),
            artifact.path(),
        )?;

        artifact.materialize_if_present()
    }

    fn required_tools(&self) -> Vec<String> {
        self.db.tool_paths(&["psql", "pg_dump"])
    }
}
