use anyhow::Result;
use chrono::Utc;
use std::path::Path;

use super::{BackupArtifact, SourceBase, SourceProvider};
use crate::config::SourceConfig;
use crate::error::ProviderError;
use crate::managers::run_log::Logger;

/// A file or directory archived in place, without a workspace copy
pub struct FileSource {
    base: SourceBase,
}

impl FileSource {
    pub fn new(config: &SourceConfig, logger: &Logger) -> Result<Self, ProviderError> {
        Ok(Self {
            base: SourceBase::new(config, logger)?,
        })
    }
}

impl SourceProvider for FileSource {
    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn discover(&self) -> Result<Option<Vec<String>>> {
        let path = Path::new(&self.base.source);
        if !path.exists() {
            anyhow::bail!("{:?} not found", path);
        }
        Ok(Some(vec![self.base.source.clone()]))
    }

    fn extract(&self, unit: &str, _workspace: &Path) -> Result<BackupArtifact> {
        Ok(BackupArtifact::from_path(unit).materialized(Utc::now()))
    }
}
