//! File-based locking to prevent overlapping runs of one configuration

use anyhow::{Context, Result};
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exclusive lock held for the duration of a run.
///
/// The OS lock belongs to the open file and is released when the file is
/// closed, so the write guard is leaked and the file kept alongside.
pub struct RunLock {
    _lock: RwLock<File>,
    lock_path: PathBuf,
}

impl RunLock {
    /// Acquire the lock for a configuration file.
    /// Returns an error if another run of the same configuration is active.
    pub fn acquire(config_path: &Path) -> Result<Self> {
        Self::acquire_at(Self::lock_path(config_path))
    }

    /// Acquire a lock at an explicit path
    pub fn acquire_at(lock_path: PathBuf) -> Result<Self> {
        debug!("Attempting to acquire lock: {:?}", lock_path);

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create lock directory")?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        let mut lock = RwLock::new(file);
        let guard = lock.try_write().with_context(|| {
            format!("Another run holds the lock {:?}", lock_path)
        })?;
        std::mem::forget(guard);

        info!("Acquired run lock: {:?}", lock_path);

        Ok(Self {
            _lock: lock,
            lock_path,
        })
    }

    /// Lock file path derived from the configuration file name
    pub fn lock_path(config_path: &Path) -> PathBuf {
        let stem: String = config_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string())
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();

        std::env::temp_dir().join(format!("multibackup-{}.lock", stem))
    }

    /// Get the lock file path (for cleanup or inspection)
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        info!("Released run lock: {:?}", self.lock_path);

        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            debug!("Failed to remove lock file: {}", e);
        }
    }
}
