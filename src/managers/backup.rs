//! Backup manager - runs one backup pass over every configured source and target

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::{expand_tilde, Config};
use crate::error::ProviderError;
use crate::managers::run_log::Logger;
use crate::managers::workspace::Workspace;
use crate::sources::{BackupArtifact, SourceProvider, SourceRegistry};
use crate::strategies::{DeliveryReport, RetentionStrategy, StrategyRegistry};
use crate::targets::TargetRegistry;
use crate::utils::archive::{archive_file_name, Archiver, ZipArchiver};
use crate::utils::executor::RealExecutor;

const TAG: &str = "backup";

/// Stages of a run, entered strictly in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Initializing,
    Extracting,
    Archiving,
    Delivering,
    CleaningUp,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Initializing => "Initializing",
            RunPhase::Extracting => "Extracting",
            RunPhase::Archiving => "Archiving",
            RunPhase::Delivering => "Delivering",
            RunPhase::CleaningUp => "CleaningUp",
            RunPhase::Done => "Done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// No source could be constructed; nothing was extracted
    NoSources,
    /// No target with a usable strategy; nothing was extracted
    NoTargets,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub timestamp: DateTime<Utc>,
    /// Artifacts produced by all sources together
    pub artifacts: usize,
    pub archives: Vec<PathBuf>,
    pub deliveries: Vec<DeliveryReport>,
}

impl RunReport {
    fn stopped(outcome: RunOutcome, timestamp: DateTime<Utc>) -> Self {
        Self {
            outcome,
            timestamp,
            artifacts: 0,
            archives: Vec::new(),
            deliveries: Vec::new(),
        }
    }
}

pub struct BackupManager {
    config: Config,
    sources: SourceRegistry,
    targets: TargetRegistry,
    strategies: StrategyRegistry,
    archiver: Arc<dyn Archiver>,
    logger: Logger,
    timestamp: Option<DateTime<Utc>>,
}

impl BackupManager {
    /// Manager with the built-in providers, running external tools for real
    pub fn new(config: Config, logger: Logger) -> Self {
        Self {
            config,
            sources: SourceRegistry::with_defaults(Arc::new(RealExecutor::new())),
            targets: TargetRegistry::with_defaults(),
            strategies: StrategyRegistry::with_defaults(),
            archiver: Arc::new(ZipArchiver::new()),
            logger,
            timestamp: None,
        }
    }

    pub fn with_registries(
        mut self,
        sources: SourceRegistry,
        targets: TargetRegistry,
        strategies: StrategyRegistry,
    ) -> Self {
        self.sources = sources;
        self.targets = targets;
        self.strategies = strategies;
        self
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Pin the run timestamp instead of reading the clock when the run starts
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory under which the run's workspace is created
    pub fn workspace_base(&self) -> PathBuf {
        self.config
            .global
            .temp_directory
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Construct every source; failures are logged and the entry skipped
    pub fn build_sources(&self) -> Vec<Box<dyn SourceProvider>> {
        self.config
            .sources
            .iter()
            .filter_map(|config| {
                if config.name.trim().is_empty() {
                    let e = unnamed(&config.provider);
                    self.logger.error(TAG, format!("Skipping source: {}", e));
                    return None;
                }

                match self.sources.create(config, &self.logger) {
                    Ok(source) => Some(source),
                    Err(e) => {
                        self.logger
                            .error(TAG, format!("Skipping source '{}': {}", config.name, e));
                        None
                    }
                }
            })
            .collect()
    }

    /// Construct every target wrapped in its retention strategy.
    /// Targets without a strategy or that fail to build are logged and skipped.
    pub fn build_strategies(&self, timestamp: DateTime<Utc>) -> Vec<Box<dyn RetentionStrategy>> {
        let mut built = Vec::new();

        for config in &self.config.targets {
            if config.name.trim().is_empty() {
                let e = unnamed(&config.provider);
                self.logger.error(TAG, format!("Skipping target: {}", e));
                continue;
            }

            let Some(strategy) = &config.strategy else {
                self.logger.error(
                    TAG,
                    format!("Skipping target '{}': no strategy configured", config.name),
                );
                continue;
            };

            let target = match self.targets.create(config, &self.logger) {
                Ok(target) => target,
                Err(e) => {
                    self.logger
                        .error(TAG, format!("Skipping target '{}': {}", config.name, e));
                    continue;
                }
            };

            match self
                .strategies
                .create(strategy, &config.name, target, &self.logger, timestamp)
            {
                Ok(strategy) => built.push(strategy),
                Err(e) => self
                    .logger
                    .error(TAG, format!("Skipping target '{}': {}", config.name, e)),
            }
        }

        built
    }

    fn enter(&self, phase: RunPhase) {
        self.logger.info(TAG, format!("Entering {}", phase));
    }

    /// Run one backup pass.
    ///
    /// Only a workspace that cannot be created is an error; individual
    /// sources, archives and targets that fail are logged and skipped.
    pub async fn run(&self) -> Result<RunReport> {
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);

        self.enter(RunPhase::Initializing);
        let sources = self.build_sources();
        if sources.is_empty() {
            self.logger.info(TAG, "No sources to back up, stopping");
            return Ok(RunReport::stopped(RunOutcome::NoSources, timestamp));
        }

        let strategies = self.build_strategies(timestamp);
        if strategies.is_empty() {
            self.logger.info(TAG, "No targets to deliver to, stopping");
            return Ok(RunReport::stopped(RunOutcome::NoTargets, timestamp));
        }

        let workspace = Workspace::create(&self.workspace_base(), &self.logger)?;

        self.enter(RunPhase::Extracting);
        let extracted = self.extract(sources, workspace.path()).await;
        let artifacts = extracted.iter().map(|(_, a)| a.len()).sum();

        self.enter(RunPhase::Archiving);
        let archives = self.archive(extracted, workspace.path(), timestamp).await;

        self.enter(RunPhase::Delivering);
        let (strategies, deliveries) = self.deliver(strategies, archives.clone()).await;

        self.enter(RunPhase::CleaningUp);
        self.dispose(strategies).await;
        workspace.close();

        self.enter(RunPhase::Done);
        self.logger.info(
            TAG,
            format!(
                "Finished: {} artifact(s), {} archive(s), {} target(s)",
                artifacts,
                archives.len(),
                deliveries.len()
            ),
        );

        Ok(RunReport {
            outcome: RunOutcome::Completed,
            timestamp,
            artifacts,
            archives,
            deliveries,
        })
    }

    async fn extract(
        &self,
        sources: Vec<Box<dyn SourceProvider>>,
        workspace: &Path,
    ) -> Vec<(String, Vec<BackupArtifact>)> {
        let handles: Vec<(String, JoinHandle<Result<Vec<BackupArtifact>>>)> = sources
            .into_iter()
            .map(|source| {
                let name = source.name().to_string();
                let workspace = workspace.to_path_buf();
                let handle = tokio::task::spawn_blocking(move || source.load(&workspace));
                (name, handle)
            })
            .collect();

        let mut extracted = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(artifacts)) => extracted.push((name, artifacts)),
                Ok(Err(e)) => self
                    .logger
                    .error(&name, format!("Extraction failed: {:#}", e)),
                Err(e) => self
                    .logger
                    .error(&name, format!("Extraction task failed: {}", e)),
            }
        }
        extracted
    }

    async fn archive(
        &self,
        extracted: Vec<(String, Vec<BackupArtifact>)>,
        workspace: &Path,
        now: DateTime<Utc>,
    ) -> Vec<PathBuf> {
        let archiver = self.archiver.clone();
        let logger = self.logger.clone();
        let workspace = workspace.to_path_buf();

        let task = tokio::task::spawn_blocking(move || {
            let mut archives = Vec::new();
            for (source, artifacts) in &extracted {
                for artifact in artifacts {
                    let destination = workspace.join(archive_file_name(source, artifact, now));
                    if archives.contains(&destination) {
                        logger.error(
                            source,
                            format!(
                                "Could not archive '{}': {:?} is already taken by another artifact",
                                artifact.name(),
                                destination
                            ),
                        );
                        continue;
                    }
                    match archiver.archive(artifact, &destination) {
                        Ok(()) => {
                            logger.verbose(source, format!("Archived {:?}", destination));
                            archives.push(destination);
                        }
                        Err(e) => logger.error(
                            source,
                            format!("Could not archive '{}': {}", artifact.name(), e),
                        ),
                    }
                }
            }
            archives
        });

        match task.await {
            Ok(archives) => archives,
            Err(e) => {
                self.logger.error(TAG, format!("Archiving task failed: {}", e));
                Vec::new()
            }
        }
    }

    async fn deliver(
        &self,
        strategies: Vec<Box<dyn RetentionStrategy>>,
        archives: Vec<PathBuf>,
    ) -> (Vec<Box<dyn RetentionStrategy>>, Vec<DeliveryReport>) {
        let archives = Arc::new(archives);

        let handles: Vec<(String, JoinHandle<(Box<dyn RetentionStrategy>, DeliveryReport)>)> =
            strategies
                .into_iter()
                .map(|mut strategy| {
                    let name = strategy.target_name().to_string();
                    let archives = archives.clone();
                    let handle = tokio::task::spawn_blocking(move || {
                        let report = strategy.save(&archives);
                        (strategy, report)
                    });
                    (name, handle)
                })
                .collect();

        let mut surviving = Vec::with_capacity(handles.len());
        let mut reports = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok((strategy, report)) => {
                    surviving.push(strategy);
                    reports.push(report);
                }
                Err(e) => self
                    .logger
                    .error(&name, format!("Delivery task failed: {}", e)),
            }
        }

        (surviving, reports)
    }

    /// Targets may hold blocking clients, so they are released off the runtime
    async fn dispose(&self, strategies: Vec<Box<dyn RetentionStrategy>>) {
        let task = tokio::task::spawn_blocking(move || {
            for mut strategy in strategies {
                strategy.dispose();
            }
        });

        if let Err(e) = task.await {
            self.logger.error(TAG, format!("Disposing targets failed: {}", e));
        }
    }
}

/// Entries are identified by name; the provider kind stands in when it is blank
fn unnamed(provider: &str) -> ProviderError {
    ProviderError::MissingSetting {
        name: format!("{} entry", provider.trim()),
        key: "name".to_string(),
    }
}
