use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use super::{TargetBase, TargetProvider};
use crate::config::{expand_tilde, TargetConfig};
use crate::error::ProviderError;
use crate::managers::run_log::Logger;

/// Local or mounted directory; buckets are subdirectories
pub struct DirectoryTarget {
    base: TargetBase,
    root: PathBuf,
}

impl DirectoryTarget {
    pub fn new(config: &TargetConfig, logger: &Logger) -> Result<Self, ProviderError> {
        let base = TargetBase::new(config, logger)?;
        Ok(Self {
            base,
            root: expand_tilde(std::path::Path::new(config.target.trim())),
        })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl TargetProvider for DirectoryTarget {
    fn save(&mut self, bucket: &str, files: &[PathBuf]) -> Vec<PathBuf> {
        let bucket_dir = self.root.join(bucket);
        if let Err(e) = fs::create_dir_all(&bucket_dir) {
            self.base.error(format!(
                "Could not create backup directory {:?}: {}",
                bucket_dir, e
            ));
            return Vec::new();
        }

        self.base.save_each(bucket, files, |file, name| {
            fs::copy(file, bucket_dir.join(name))
                .with_context(|| format!("copy to {:?} failed", bucket_dir))?;
            Ok(())
        })
    }

    fn delete_bucket(&mut self, bucket: &str) -> Result<()> {
        let bucket_dir = self.root.join(bucket);
        if !bucket_dir.exists() {
            return Ok(());
        }

        fs::remove_dir_all(&bucket_dir)
            .with_context(|| format!("Failed to delete {:?}", bucket_dir))?;
        self.base.info(format!("Deleted {}", bucket));
        Ok(())
    }

    fn list_buckets(&mut self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut buckets: Vec<String> = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read {:?}", self.root))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        buckets.sort();

        Ok(buckets)
    }
}
