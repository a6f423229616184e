//! Multibackup Library
//!
//! Extracts data from configured sources, packages it into zip archives and
//! delivers the archives to targets under dated buckets, pruning old buckets
//! according to each target's retention strategy.

pub mod config;
pub mod error;
pub mod managers;
pub mod sources;
pub mod strategies;
pub mod targets;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config};
pub use error::ProviderError;
pub use managers::backup::{BackupManager, RunOutcome, RunPhase, RunReport};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::run_log::{Logger, Severity};
pub use sources::{BackupArtifact, SourceProvider, SourceRegistry};
pub use strategies::{DeliveryReport, RetentionStrategy, StrategyRegistry};
pub use targets::{TargetProvider, TargetRegistry};
