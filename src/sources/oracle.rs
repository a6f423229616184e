use anyhow::Result;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::database::DatabaseSource;
use super::{BackupArtifact, SourceBase, SourceProvider};
use crate::config::SourceConfig;
use crate::error::ProviderError;
use crate::managers::run_log::Logger;
use crate::utils::executor::CommandExecutor;

/// Files a complete run leaves behind: data, archive logs, control file
const EXPECTED_PIECES: usize = 3;

/// Oracle: full online backup of the single instance through RMAN.
///
/// The artifact is a directory named after the host holding the backup pieces.
pub struct OracleSource {
    db: DatabaseSource,
}

impl OracleSource {
    pub fn new(
        config: &SourceConfig,
        logger: &Logger,
        executor: Arc<dyn CommandExecutor>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            db: DatabaseSource::new(config, logger, executor)?,
        })
    }

    fn command_file(directory: &Path, tag: &str) -> String {
        let piece = |suffix: &str| directory.join(format!("%d_%I.{}", suffix)).display().to_string();

        [
            "SQL 'ALTER SYSTEM ARCHIVE LOG CURRENT';".to_string(),
            "RUN".to_string(),
            "{".to_string(),
            format!("SET COMMAND ID TO '{}OnlineBackupFull';", tag),
            format!("BACKUP FULL DATABASE TAG '{}_FULL' FORMAT '{}';", tag, piece("full")),
            "SQL 'ALTER SYSTEM ARCHIVE LOG CURRENT';".to_string(),
            format!(
                "BACKUP TAG '{}_ARCHIVE' FORMAT '{}' ARCHIVELOG ALL DELETE ALL INPUT;",
                tag,
                piece("archive")
            ),
            format!(
                "BACKUP TAG '{}_CONTROL' CURRENT CONTROLFILE FORMAT '{}';",
                tag,
                piece("control")
            ),
            "}".to_string(),
        ]
        .join("\n")
    }
}

impl SourceProvider for OracleSource {
    fn base(&self) -> &SourceBase {
        &self.db.base
    }

    /// One instance per server, nothing to enumerate
    fn discover(&self) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    /// RMAN backs up the whole instance; several `include` entries still
    /// produce a single backup
    fn units(&self) -> Vec<String> {
        let base = self.base();
        let named = base
            .filter
            .include()
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| vec![base.name.clone()]);

        let mut units = base.filter.apply(named);
        if units.len() > 1 {
            base.error(format!(
                "Oracle backs up the whole instance, ignoring include entries {}",
                units[1..].join(", ")
            ));
            units.truncate(1);
        }
        units
    }

    fn extract(&self, _unit: &str, workspace: &Path) -> Result<BackupArtifact> {
        let host = self.db.host().to_string();
        let artifact = BackupArtifact::in_workspace(workspace, host.clone());
        fs::create_dir_all(artifact.path())?;

        let cmd_path = workspace.join(format!("{}_cmd", artifact.identifier()));
        fs::write(&cmd_path, Self::command_file(artifact.path(), &host))?;

        let password = self.db.password().unwrap_or("_");
        let args = vec![
            "target".to_string(),
            format!("{}/{}@{}", self.db.user().unwrap_or_default(), password, host),
            "cmdfile".to_string(),
            cmd_path.to_string_lossy().into_owned(),
        ];

        self.db
            .executor()
            .run_command(&self.db.binary("rman")?, &args, &[], None)?;

        let pieces = fs::read_dir(artifact.path())?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .count();
        if pieces != EXPECTED_PIECES {
            anyhow::bail!(
                "RMAN produced {} backup pieces, expected {}",
                pieces,
                EXPECTED_PIECES
            );
        }

        artifact.materialize_if_present()
    }

    fn required_tools(&self) -> Vec<String> {
        self.db.tool_paths(&["rman"])
    }
}
