//! Source providers extract backup artifacts from configured data sources
//!
//! Every provider implements [`SourceProvider`]. Providers are synchronous;
//! the orchestrator runs each one's [`SourceProvider::load`] on its own
//! blocking task. Construction goes through [`SourceRegistry`], keyed by the
//! case-insensitive `provider` string of a [`SourceConfig`].

mod artifact;
mod database;
mod db2;
mod file;
mod filter;
mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;

pub use artifact::BackupArtifact;
pub use database::DatabaseSource;
pub use db2::Db2Source;
pub use file::FileSource;
pub use filter::{parse_list, SourceFilter};
pub use mssql::MsSqlSource;
pub use mysql::MySqlSource;
pub use oracle::OracleSource;
pub use postgres::PostgresSource;
pub use sqlite::SqliteSource;

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::SourceConfig;
use crate::error::ProviderError;
use crate::managers::run_log::Logger;
use crate::utils::executor::CommandExecutor;

/// State shared by every source provider
#[derive(Debug, Clone)]
pub struct SourceBase {
    pub name: String,
    pub source: String,
    pub filter: SourceFilter,
    pub logger: Logger,
}

impl SourceBase {
    /// Fails when the entry has no `source`
    pub fn new(config: &SourceConfig, logger: &Logger) -> Result<Self, ProviderError> {
        let source = config.source.trim();
        if source.is_empty() {
            return Err(ProviderError::MissingLocation(config.name.clone()));
        }

        Ok(Self {
            name: config.name.clone(),
            source: source.to_string(),
            filter: SourceFilter::new(config.include.as_deref(), config.exclude.as_deref()),
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
}

pub trait SourceProvider: Send {
    fn base(&self) -> &SourceBase;

    fn name(&self) -> &str {
        &self.base().name
    }

    /// Raw identifiers of the units this source holds.
    ///
    /// `None` when the engine cannot be enumerated; the configured `include`
    /// list (or the source name) then names the units.
    fn discover(&self) -> Result<Option<Vec<String>>>;

    /// Extract one unit into `workspace`. The returned artifact must be
    /// materialized.
    fn extract(&self, unit: &str, workspace: &Path) -> Result<BackupArtifact>;

    /// External tools this source shells out to, for pre-flight checks
    fn required_tools(&self) -> Vec<String> {
        Vec::new()
    }

    /// Units left after filtering, empty when discovery failed
    fn units(&self) -> Vec<String> {
        let base = self.base();
        match self.discover() {
            Ok(Some(raw)) => {
                base.verbose(format!("Discovered {}", raw.join(", ")));
                base.filter.apply(raw)
            }
            Ok(None) => {
                let named = base
                    .filter
                    .include()
                    .map(<[String]>::to_vec)
                    .unwrap_or_else(|| vec![base.name.clone()]);
                base.filter.apply(named)
            }
            Err(e) => {
                base.error(format!("Could not discover sources: {:#}", e));
                Vec::new()
            }
        }
    }

    /// Extract every unit that survives filtering. A failing unit is logged
    /// and skipped; its siblings are still attempted.
    fn load(&self, workspace: &Path) -> Result<Vec<BackupArtifact>> {
        let base = self.base();
        let units = self.units();

        if units.is_empty() {
            base.info("Nothing to back up");
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::with_capacity(units.len());
        for unit in &units {
            match self.extract(unit, workspace) {
                Ok(artifact) => {
                    base.verbose(format!("Extracted '{}' to {:?}", unit, artifact.path()));
                    artifacts.push(artifact);
                }
                Err(e) => base.error(format!("Could not back up '{}': {:#}", unit, e)),
            }
        }

        base.info(format!(
            "Created {} backup{}",
            artifacts.len(),
            if artifacts.len() == 1 { "" } else { "s" }
        ));

        Ok(artifacts)
    }
}

/// Builds a source provider from its configuration entry
pub type SourceFactory =
    Box<dyn Fn(&SourceConfig, &Logger) -> Result<Box<dyn SourceProvider>, ProviderError> + Send + Sync>;

pub(crate) fn normalize_kind(kind: &str) -> String {
    kind.trim().to_lowercase()
}

/// Kind string → source factory
pub struct SourceRegistry {
    factories: BTreeMap<String, SourceFactory>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with every built-in source; database sources run their tools through `executor`
    pub fn with_defaults(executor: Arc<dyn CommandExecutor>) -> Self {
        let mut registry = Self::new();

        let exec = executor.clone();
        registry.register("postgresql", move |config, logger| {
            Ok(Box::new(PostgresSource::new(config, logger, exec.clone())?))
        });
        let exec = executor.clone();
        registry.register("mysql", move |config, logger| {
            Ok(Box::new(MySqlSource::new(config, logger, exec.clone())?))
        });
        let exec = executor.clone();
        registry.register("mssql", move |config, logger| {
            Ok(Box::new(MsSqlSource::new(config, logger, exec.clone())?))
        });
        let exec = executor.clone();
        registry.register("oracle", move |config, logger| {
            Ok(Box::new(OracleSource::new(config, logger, exec.clone())?))
        });
        let exec = executor;
        registry.register("db2", move |config, logger| {
            Ok(Box::new(Db2Source::new(config, logger, exec.clone())?))
        });
        registry.register("sqlite", |config, logger| {
            Ok(Box::new(SqliteSource::new(config, logger)?))
        });
        registry.register("file", |config, logger| {
            Ok(Box::new(FileSource::new(config, logger)?))
        });
        registry.register("directory", |config, logger| {
            Ok(Box::new(FileSource::new(config, logger)?))
        });

        registry
    }

    /// Add or replace the factory for `kind`
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&SourceConfig, &Logger) -> Result<Box<dyn SourceProvider>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(normalize_kind(kind), Box::new(factory));
    }

    pub fn create(
        &self,
        config: &SourceConfig,
        logger: &Logger,
    ) -> Result<Box<dyn SourceProvider>, ProviderError> {
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

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
