use anyhow::{Context, Result};
use rusqlite::{Connection, DatabaseName, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};

use super::{BackupArtifact, SourceBase, SourceProvider};
use crate::config::SourceConfig;
use crate::error::ProviderError;
use crate::managers::run_log::Logger;

/// SQLite: consistent copies through the online backup API.
///
/// `source` is a database file, a directory of databases, or a directory
/// followed by a file pattern (`/data/*.db`).
pub struct SqliteSource {
    base: SourceBase,
    directory: PathBuf,
    pattern: Option<String>,
}

impl SqliteSource {
    pub fn new(config: &SourceConfig, logger: &Logger) -> Result<Self, ProviderError> {
        let base = SourceBase::new(config, logger)?;
        let source = Path::new(&base.source);

        let pattern = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| n.contains('*') || n.contains('?'));

        let directory = if pattern.is_none() && source.is_dir() {
            source.to_path_buf()
        } else {
            source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        };

        Ok(Self {
            base,
            directory,
            pattern,
        })
    }

    fn backup(source: &Path, destination: &Path) -> Result<()> {
        let conn = Connection::open_with_flags(
            source,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Could not open SQLite database {:?}", source))?;

        conn.backup(DatabaseName::Main, destination, None)
            .with_context(|| format!("SQLite backup of {:?} failed", source))?;

        Ok(())
    }
}

/// `*` matches any run of characters, `?` exactly one
pub(crate) fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((star_p, star_n)) = star {
            p = star_p + 1;
            n = star_n + 1;
            star = Some((star_p, star_n + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

impl SourceProvider for SqliteSource {
    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn discover(&self) -> Result<Option<Vec<String>>> {
        let source = Path::new(&self.base.source);
        if source.is_file() {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok(Some(vec![name]));
        }

        let mut names: Vec<String> = fs::read_dir(&self.directory)
            .with_context(|| format!("Could not read directory {:?}", self.directory))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| {
                self.pattern
                    .as_deref()
                    .map_or(true, |pattern| wildcard_match(pattern, name))
            })
            .collect();
        names.sort();

        Ok(Some(names))
    }

    fn extract(&self, database: &str, workspace: &Path) -> Result<BackupArtifact> {
        let artifact = BackupArtifact::in_workspace(workspace, database);
        Self::backup(&self.directory.join(database), artifact.path())?;
        artifact.materialize_if_present()
    }
}
