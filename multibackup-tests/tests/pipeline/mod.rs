// Orchestrator runs against fixture providers
//
// Sources and targets come from test_utils::fixtures, so these tests exercise
// every phase of a run without external tools or network access.

mod failures;
mod round_trip;
mod stall;

use chrono::{DateTime, TimeZone, Utc};
use multibackup::managers::backup::BackupManager;
use multibackup::strategies::StrategyRegistry;
use test_utils::{
    fixture_sources, fixture_targets, ConfigBuilder, Gate, Logger, Revisions, StrategyConfig,
    TargetConfig, TargetJournal,
};

/// 2024-01-10 was a Wednesday
pub fn wednesday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, 1, 0, 0).unwrap()
}

pub fn recording_target(name: &str, location: &str, strategy: &str, revisions: i64) -> TargetConfig {
    TargetConfig {
        provider: "recording".to_string(),
        name: name.to_string(),
        target: location.to_string(),
        strategy: Some(StrategyConfig {
            provider: strategy.to_string(),
            revisions: Some(Revisions::Number(revisions)),
        }),
    }
}

/// Manager wired to the fixture registries
pub fn manager(
    builder: &ConfigBuilder,
    logger: Logger,
    gate: Gate,
    journal: &TargetJournal,
    timestamp: DateTime<Utc>,
) -> BackupManager {
    BackupManager::new(builder.to_config(), logger)
        .with_registries(
            fixture_sources(gate),
            fixture_targets(journal),
            StrategyRegistry::with_defaults(),
        )
        .with_timestamp(timestamp)
}
