use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use super::database::{output_lines, DatabaseSource};
use super::{BackupArtifact, SourceBase, SourceProvider};
use crate::config::SourceConfig;
use crate::error::ProviderError;
use crate::managers::run_log::Logger;
use crate::utils::executor::CommandExecutor;

const LIST_ONLINE: &str =
    "SET NOCOUNT ON; SELECT name FROM sys.databases WHERE state_desc = 'ONLINE' ORDER BY name";

/// Microsoft SQL Server: `BACKUP DATABASE ... TO DISK` issued through `sqlcmd`.
///
/// The server writes the `.bak` file itself, so the workspace must be
/// reachable and writable by the SQL Server service account.
pub struct MsSqlSource {
    db: DatabaseSource,
}

impl MsSqlSource {
    pub fn new(
        config: &SourceConfig,
        logger: &Logger,
        executor: Arc<dyn CommandExecutor>,
    ) -> Result<Self, ProviderError> {
        let db = DatabaseSource::new(config, logger, executor)?;
        if !db.connection.contains("integratedsecurity") && db.user().is_none() {
            return Err(ProviderError::MissingSetting {
                name: db.base.name.clone(),
                key: "user".to_string(),
            });
        }
        Ok(Self { db })
    }

    fn server(&self) -> String {
        match self.db.port() {
            Some(port) => format!("{},{}", self.db.host(), port),
            None => self.db.host().to_string(),
        }
    }

    fn run_query(&self, query: &str, timeout: Option<std::time::Duration>) -> Result<String> {
        let mut args = vec!["-S".to_string(), self.server()];
        if self.db.connection.contains("integratedsecurity") {
            args.push("-E".to_string());
        } else if let Some(user) = self.db.user() {
            args.extend(["-U".to_string(), user.to_string()]);
        }
        args.extend([
            "-b".to_string(),
            "-h".to_string(),
            "-1".to_string(),
            "-W".to_string(),
            "-Q".to_string(),
            query.to_string(),
        ]);

        self.db.executor().run_command_stdout(
            &self.db.binary("sqlcmd")?,
            &args,
            &self.db.password_env("SQLCMDPASSWORD"),
            timeout,
        )
    }
}

fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

impl SourceProvider for MsSqlSource {
    fn base(&self) -> &SourceBase {
        &self.db.base
    }

    fn discover(&self) -> Result<Option<Vec<String>>> {
        let output = self
            .run_query(LIST_ONLINE, Some(self.db.timeout()))
            .with_context(|| format!("Could not connect to {}", self.server()))?;

        Ok(Some(output_lines(&output)))
    }

    fn extract(&self, database: &str, workspace: &Path) -> Result<BackupArtifact> {
        let artifact = BackupArtifact::in_workspace(workspace, format!("{}.bak", database));

        let query = format!(
            "BACKUP DATABASE {} TO DISK = {} WITH FORMAT",
            quote_identifier(database),
            quote_literal(&artifact.path().to_string_lossy())
        );
        self.run_query(&query, None)?;

        artifact.materialize_if_present()
    }

    fn required_tools(&self) -> Vec<String> {
        self.db.tool_paths(&["sqlcmd"])
    }
}
