use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// One extracted unit: a file or directory produced by (or pointed at by) a source.
///
/// `created_on` stays `None` until the content is known to exist on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    identifier: String,
    created_on: Option<DateTime<Utc>>,
    name: String,
    path: PathBuf,
}

impl BackupArtifact {
    /// Artifact to be written into the workspace under a fresh unique path
    pub fn in_workspace(workspace: &Path, name: impl Into<String>) -> Self {
        let identifier = uuid::Uuid::new_v4().to_string();
        let path = workspace.join(&identifier);
        Self {
            identifier,
            created_on: None,
            name: name.into(),
            path,
        }
    }

    /// Artifact wrapping an existing path; named after its final component
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let identifier = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());

        Self {
            identifier,
            created_on: None,
            name,
            path,
        }
    }

    /// Mark the content as present at `at`
    pub fn materialized(mut self, at: DateTime<Utc>) -> Self {
        self.created_on = Some(at);
        self
    }

    /// Stamp the artifact if its path exists, error otherwise
    pub fn materialize_if_present(self) -> Result<Self> {
        if !self.path.exists() {
            anyhow::bail!(
                "Expected output for '{}' not found at {:?}",
                self.name,
                self.path
            );
        }
        Ok(self.materialized(Utc::now()))
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn created_on(&self) -> Option<DateTime<Utc>> {
        self.created_on
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_directory(&self) -> bool {
        self.path.is_dir()
    }
}
