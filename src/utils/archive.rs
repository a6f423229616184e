//! Zip packaging of extracted artifacts

use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::sources::BackupArtifact;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error while archiving: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Artifact content missing at {0:?}")]
    MissingContent(PathBuf),

    #[error("Archive {0:?} already exists")]
    AlreadyExists(PathBuf),
}

/// Packages one artifact into one archive file
#[cfg_attr(test, mockall::automock)]
pub trait Archiver: Send + Sync {
    fn archive(&self, artifact: &BackupArtifact, destination: &Path) -> Result<(), ArchiveError>;
}

/// Deflate at the highest level; a file becomes a single entry named after
/// the artifact, a directory's contents are placed at the archive root.
#[derive(Debug, Clone, Default)]
pub struct ZipArchiver;

impl ZipArchiver {
    pub fn new() -> Self {
        Self
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9))
            .large_file(true)
    }

    fn add_file(zip: &mut ZipWriter<File>, source: &Path, entry: &str) -> Result<(), ArchiveError> {
        zip.start_file(entry, Self::options())?;
        let mut input = File::open(source)?;
        io::copy(&mut input, zip)?;
        Ok(())
    }

    fn add_directory(zip: &mut ZipWriter<File>, root: &Path) -> Result<(), ArchiveError> {
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if entry.file_type().is_dir() {
                zip.add_directory(format!("{}/", name), Self::options())?;
            } else {
                Self::add_file(zip, entry.path(), &name)?;
            }
        }
        Ok(())
    }
}

impl Archiver for ZipArchiver {
    fn archive(&self, artifact: &BackupArtifact, destination: &Path) -> Result<(), ArchiveError> {
        let source = artifact.path();
        if !source.exists() {
            return Err(ArchiveError::MissingContent(source.to_path_buf()));
        }

        // Never truncate an archive produced earlier in the same run
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => ArchiveError::AlreadyExists(destination.to_path_buf()),
                _ => ArchiveError::Io(e),
            })?;
        let mut zip = ZipWriter::new(file);

        if source.is_dir() {
            Self::add_directory(&mut zip, source)?;
        } else {
            Self::add_file(&mut zip, source, artifact.name())?;
        }

        zip.finish()?;
        Ok(())
    }
}

/// Strip characters that are not allowed in file names on common platforms
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '"' | '<' | '>' | '|' | ':' | '*' | '?' | '\\' | '/'))
        .filter(|c| (*c as u32) > 0x1f)
        .collect()
}

/// `{source}_{artifact}_{yyyyMMddHHmmss}.zip`, stamped with the artifact's
/// creation time or `now` when it has none
pub fn archive_file_name(source_name: &str, artifact: &BackupArtifact, now: DateTime<Utc>) -> String {
    let stamp = artifact.created_on().unwrap_or(now);
    format!(
        "{}_{}_{}.zip",
        sanitize_file_name(source_name),
        artifact.name(),
        stamp.format("%Y%m%d%H%M%S")
    )
}
