//! Retention strategies
//!
//! A strategy owns one target for the duration of a run. It saves the run's
//! archives into the bucket for its fixed timestamp, then asks the target to
//! delete the bucket that has fallen out of retention.

mod days;
mod generations;

pub use days::{days_expired, DaysStrategy};
pub use generations::{generations_expired, GenerationsStrategy};

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::StrategyConfig;
use crate::error::ProviderError;
use crate::managers::run_log::Logger;
use crate::sources::normalize_kind;
use crate::targets::TargetProvider;

/// `yyyy-MM-dd`
pub fn bucket_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Outcome of one strategy's delivery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub target: String,
    pub strategy: String,
    pub bucket: String,
    pub saved: Vec<PathBuf>,
    /// Buckets whose deletion succeeded
    pub pruned: Vec<String>,
    /// Buckets whose deletion was requested but failed
    pub prune_failures: Vec<String>,
}

/// Target, timestamp and logger every strategy carries
pub struct StrategyBase {
    kind: String,
    target_name: String,
    timestamp: DateTime<Utc>,
    target: Box<dyn TargetProvider>,
    logger: Logger,
    disposed: bool,
}

impl StrategyBase {
    pub fn new(
        kind: &str,
        target_name: &str,
        target: Box<dyn TargetProvider>,
        logger: &Logger,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: kind.to_string(),
            target_name: target_name.to_string(),
            timestamp,
            target,
            logger: logger.clone(),
            disposed: false,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Save into today's bucket, then prune `expired`. Pruning errors are
    /// logged and recorded, never returned.
    pub fn deliver(&mut self, files: &[PathBuf], expired: Option<NaiveDate>) -> DeliveryReport {
        let bucket = bucket_key(self.date());
        let saved = self.target.save(&bucket, files);

        let mut report = DeliveryReport {
            target: self.target_name.clone(),
            strategy: self.kind.clone(),
            bucket,
            saved,
            ..DeliveryReport::default()
        };

        if let Some(date) = expired {
            let old = bucket_key(date);
            self.logger
                .verbose(&self.target_name, format!("Removing expired bucket {}", old));

            match self.target.delete_bucket(&old) {
                Ok(()) => report.pruned.push(old),
                Err(e) => {
                    self.logger.error(
                        &self.target_name,
                        format!("Could not remove bucket {}: {:#}", old, e),
                    );
                    report.prune_failures.push(old);
                }
            }
        }

        report
    }

    /// Dispose the target; later calls do nothing
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.target.dispose();
        }
    }
}

pub trait RetentionStrategy: Send {
    fn base(&self) -> &StrategyBase;

    fn base_mut(&mut self) -> &mut StrategyBase;

    /// The single bucket that falls out of retention on this run's date
    fn expired(&self) -> Option<NaiveDate>;

    fn name(&self) -> &str {
        self.base().kind()
    }

    fn target_name(&self) -> &str {
        self.base().target_name()
    }

    fn bucket_key(&self) -> String {
        bucket_key(self.base().date())
    }

    fn save(&mut self, files: &[PathBuf]) -> DeliveryReport {
        let expired = self.expired();
        self.base_mut().deliver(files, expired)
    }

    fn dispose(&mut self) {
        self.base_mut().dispose();
    }
}

/// Builds a strategy around an already constructed target
pub type StrategyFactory =
    Box<dyn Fn(&StrategyConfig, StrategyBase) -> Result<Box<dyn RetentionStrategy>, ProviderError> + Send + Sync>;

/// Kind string → strategy factory
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("days", |config, base| {
            Ok(Box::new(DaysStrategy::new(config, base)))
        });
        registry.register("generations", |_config, base| {
            Ok(Box::new(GenerationsStrategy::new(base)))
        });
        registry
    }

    /// Add or replace the factory for `kind`
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&StrategyConfig, StrategyBase) -> Result<Box<dyn RetentionStrategy>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(normalize_kind(kind), Box::new(factory));
    }

    pub fn create(
        &self,
        config: &StrategyConfig,
        target_name: &str,
        target: Box<dyn TargetProvider>,
        logger: &Logger,
        timestamp: DateTime<Utc>,
    ) -> Result<Box<dyn RetentionStrategy>, ProviderError> {
        let kind = normalize_kind(&config.provider);
        if kind.is_empty() {
            return Err(ProviderError::MissingProvider(target_name.to_string()));
        }

        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| ProviderError::UnknownProvider {
                kind: kind.clone(),
                name: target_name.to_string(),
            })?;

        factory(
            config,
            StrategyBase::new(&kind, target_name, target, logger, timestamp),
        )
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
