//! Target providers persist archives under dated buckets
//!
//! A target never decides what to keep; its owning retention strategy picks
//! the bucket to write and the buckets to delete.

mod directory;
mod dropbox;
mod ftp;

pub use directory::DirectoryTarget;
pub use dropbox::DropboxTarget;
pub use ftp::FtpTarget;

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::TargetConfig;
use crate::error::ProviderError;
use crate::managers::run_log::Logger;
use crate::sources::normalize_kind;

#[cfg_attr(test, mockall::automock)]
pub trait TargetProvider: Send {
    /// Store every file under `bucket`; returns the inputs that were stored.
    /// A file that fails is logged and left out, the rest are still attempted.
    fn save(&mut self, bucket: &str, files: &[PathBuf]) -> Vec<PathBuf>;

    /// Remove a bucket and its contents; a missing bucket is not an error
    fn delete_bucket(&mut self, bucket: &str) -> Result<()>;

    /// Buckets currently present, sorted
    fn list_buckets(&mut self) -> Result<Vec<String>>;

    /// Release connections; called once after delivery
    fn dispose(&mut self) {}
}

/// Name and logger shared by the target implementations
#[derive(Debug, Clone)]
pub struct TargetBase {
    pub name: String,
    pub logger: Logger,
}

impl TargetBase {
    pub fn new(config: &TargetConfig, logger: &Logger) -> Result<Self, ProviderError> {
        if config.target.trim().is_empty() {
            return Err(ProviderError::MissingLocation(config.name.clone()));
        }
        logger.verbose(&config.name, "Initializing");

        Ok(Self {
            name: config.name.clone(),
            logger: logger.clone(),
        })
    }

    pub fn verbose(&self, message: impl AsRef<str>) {
        self.logger.verbose(&self.name, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.logger.info(&self.name, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.logger.error(&self.name, message);
    }

    /// Run `store` for every file, collecting the ones that succeeded
    pub fn save_each<F>(&self, bucket: &str, files: &[PathBuf], mut store: F) -> Vec<PathBuf>
    where
        F: FnMut(&Path, &str) -> Result<()>,
    {
        self.info(format!("Saving {} to {}", plural(files.len()), bucket));

        let mut saved = Vec::with_capacity(files.len());
        for file in files {
            let Some(file_name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                self.error(format!("Skipping {:?}: no file name", file));
                continue;
            };

            self.verbose(format!("Storing {}", file_name));
            match store(file, &file_name) {
                Ok(()) => saved.push(file.clone()),
                Err(e) => self.error(format!("Could not store {}: {:#}", file_name, e)),
            }
        }

        self.info(format!("Saved {}", plural(saved.len())));
        saved
    }
}

fn plural(count: usize) -> String {
    format!("{} backup{}", count, if count == 1 { "" } else { "s" })
}

/// Builds a target provider from its configuration entry
pub type TargetFactory =
    Box<dyn Fn(&TargetConfig, &Logger) -> Result<Box<dyn TargetProvider>, ProviderError> + Send + Sync>;

/// Kind string → target factory
pub struct TargetRegistry {
    factories: BTreeMap<String, TargetFactory>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("directory", |config, logger| {
            Ok(Box::new(DirectoryTarget::new(config, logger)?))
        });
        registry.register("dropbox", |config, logger| {
            Ok(Box::new(DropboxTarget::new(config, logger)?))
        });
        registry.register("ftp", |config, logger| {
            Ok(Box::new(FtpTarget::new(config, logger)?))
        });
        registry
    }

    /// Add or replace the factory for `kind`
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&TargetConfig, &Logger) -> Result<Box<dyn TargetProvider>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(normalize_kind(kind), Box::new(factory));
    }

    pub fn create(
        &self,
        config: &TargetConfig,
        logger: &Logger,
    ) -> Result<Box<dyn TargetProvider>, ProviderError> {
        let kind = normalize_kind(&config.provider);
        if kind.is_empty() {
            return Err(ProviderError::MissingProvider(config.name.clone()));
        }

        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| ProviderError::UnknownProvider {
                kind: kind.clone(),
                name: config.name.clone(),
            })?;

        factory(config, logger)
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
