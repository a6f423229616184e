use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use super::database::{output_lines, DatabaseSource};
use super::{BackupArtifact, SourceBase, SourceProvider};
use crate::config::SourceConfig;
use crate::error::ProviderError;
use crate::managers::run_log::Logger;
use crate::utils::executor::CommandExecutor;

/// MySQL / MariaDB: `mysqldump --databases <db>` per database
pub struct MySqlSource {
    db: DatabaseSource,
}

impl MySqlSource {
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
        let mut args = vec![format!("--host={}", self.db.host())];
        if let Some(port) = self.db.port() {
            args.push(format!("--port={}", port));
        }
        if let Some(user) = self.db.user() {
            args.push(format!("--user={}", user));
        }
        args
    }
}

impl SourceProvider for MySqlSource {
    fn base(&self) -> &SourceBase {
        &self.db.base
    }

    fn discover(&self) -> Result<Option<Vec<String>>> {
        let mut args = self.connection_args();
        args.extend([
            "--batch".to_string(),
            "--skip-column-names".to_string(),
            "--execute=SHOW DATABASES".to_string(),
        ]);

        let output = self
            .db
            .executor()
            .run_command_stdout(
                &self.db.binary("mysql")?,
                &args,
                &self.db.password_env("MYSQL_PWD"),
                Some(self.db.timeout()),
            )
            .with_context(|| format!("Could not connect to {}", self.db.host()))?;

        Ok(Some(output_lines(&output)))
    }

    fn extract(&self, database: &str, workspace: &Path) -> Result<BackupArtifact> {
        let artifact = BackupArtifact::in_workspace(workspace, format!("{}.sql", database));

        let mut args = self.connection_args();
        args.extend(["--databases".to_string(), database.to_string()]);

        self.db.executor().run_command_to_file(
            &self.db.binary("mysqldump")?,
            &args,
            &self.db.password_env("MYSQL_PWD"),
            artifact.path(),
        )?;

        artifact.materialize_if_present()
    }

    fn required_tools(&self) -> Vec<String> {
        self.db.tool_paths(&["mysql", "mysqldump"])
    }
}
