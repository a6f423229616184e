//! Per-run scratch directory

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::managers::run_log::Logger;

const TAG: &str = "workspace";

/// Temporary directory holding the run's extracted artifacts and archives.
/// The directory is removed when the guard is closed or dropped.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    logger: Logger,
    removed: bool,
}

impl Workspace {
    /// Create `base/<uuid>`. On Unix the directory is opened up to every user
    /// so database servers running under their own account can write dumps.
    pub fn create(base: &Path, logger: &Logger) -> Result<Self> {
        let path = base.join(uuid::Uuid::new_v4().to_string());
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create workspace {:?}", path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o777))
                .with_context(|| format!("Failed to set permissions on {:?}", path))?;
        }

        logger.verbose(TAG, format!("Created {:?}", path));

        Ok(Self {
            path,
            logger: logger.clone(),
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory now instead of at drop
    pub fn close(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        match fs::remove_dir_all(&self.path) {
            Ok(()) => self.logger.verbose(TAG, format!("Removed {:?}", self.path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => self
                .logger
                .error(TAG, format!("Could not remove {:?}: {}", self.path, e)),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}
