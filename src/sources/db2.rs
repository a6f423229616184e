use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use super::database::DatabaseSource;
use super::{BackupArtifact, SourceBase, SourceProvider};
use crate::config::SourceConfig;
use crate::error::ProviderError;
use crate::managers::run_log::Logger;
use crate::utils::executor::CommandExecutor;

/// IBM DB2: `BACKUP DATABASE <db> TO <dir> WITHOUT PROMPTING` per included database.
///
/// DB2 has no locale-independent way to list databases, so `include` is mandatory.
pub struct Db2Source {
    db: DatabaseSource,
    environment: OnceLock<Vec<(String, String)>>,
}

impl Db2Source {
    pub fn new(
        config: &SourceConfig,
        logger: &Logger,
        executor: Arc<dyn CommandExecutor>,
    ) -> Result<Self, ProviderError> {
        let db = DatabaseSource::new(config, logger, executor)?;
        if db.base.filter.include().is_none() {
            return Err(ProviderError::MissingSetting {
                name: db.base.name.clone(),
                key: "include".to_string(),
            });
        }

        Ok(Self {
            db,
            environment: OnceLock::new(),
        })
    }

    /// On Windows the CLP needs the `DB2CLP` variable that `db2cmd` hands out
    fn environment(&self) -> Result<Vec<(String, String)>> {
        if !cfg!(windows) {
            return Ok(Vec::new());
        }
        if let Some(env) = self.environment.get() {
            return Ok(env.clone());
        }

        let args = ["-c", "-w", "-i", "db2clpsetcp"].map(String::from);
        let output = self
            .db
            .executor()
            .run_command_stdout(&self.db.binary("db2cmd")?, &args, &[], Some(self.db.timeout()))
            .context("Could not initialize DB2 command environment")?;

        let env = parse_environment(&output)
            .context("db2cmd did not report a command line environment")?;
        let env = vec![env];
        let _ = self.environment.set(env.clone());
        Ok(env)
    }
}

/// First `KEY=VALUE` token in the output
fn parse_environment(output: &str) -> Option<(String, String)> {
    output.split_whitespace().find_map(|token| {
        let (key, value) = token.split_once('=')?;
        if key.is_empty() || value.is_empty() {
            return None;
        }
        Some((key.to_string(), value.to_string()))
    })
}

impl SourceProvider for Db2Source {
    fn base(&self) -> &SourceBase {
        &self.db.base
    }

    fn discover(&self) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    fn extract(&self, database: &str, workspace: &Path) -> Result<BackupArtifact> {
        let env = self.environment()?;
        let artifact = BackupArtifact::in_workspace(workspace, format!("{}.backup", database));
        fs::create_dir_all(artifact.path())?;

        let args = vec![format!(
            "BACKUP DATABASE {} TO {} WITHOUT PROMPTING",
            database,
            artifact.path().display()
        )];
        self.db
            .executor()
            .run_command(&self.db.binary("db2")?, &args, &env, None)?;

        let has_content = fs::read_dir(artifact.path())?.next().is_some();
        if !has_content {
            anyhow::bail!("DB2 reported success but wrote nothing");
        }

        artifact.materialize_if_present()
    }

    fn required_tools(&self) -> Vec<String> {
        if cfg!(windows) {
            self.db.tool_paths(&["db2", "db2cmd"])
        } else {
            self.db.tool_paths(&["db2"])
        }
    }
}
