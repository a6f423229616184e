//! In-memory providers and sample data
//!
//! The fixture sources and targets register under their own kinds so tests
//! can mix them with the built-in providers in one configuration:
//!
//! | kind        | behaviour                                                   |
//! |-------------|-------------------------------------------------------------|
//! | `static`    | one unit per comma separated entry of `source`              |
//! | `stamped`   | like `static`, every artifact created at [`stamp()`]        |
//! | `failing`   | every extraction fails                                      |
//! | `panicking` | extraction panics                                           |
//! | `blocking`  | extraction waits until the shared [`Gate`] is released      |
//! | `recording` | target that remembers every call in a [`TargetJournal`]     |

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use multibackup::config::{SourceConfig, TargetConfig};
use multibackup::error::ProviderError;
use multibackup::managers::run_log::Logger;
use multibackup::sources::{BackupArtifact, SourceBase, SourceProvider, SourceRegistry};
use multibackup::targets::{TargetBase, TargetProvider, TargetRegistry};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Writes `unit` as the content of `<unit>.txt`
pub struct StaticSource {
    base: SourceBase,
}

impl StaticSource {
    pub fn new(config: &SourceConfig, logger: &Logger) -> Result<Self, ProviderError> {
        Ok(Self {
            base: SourceBase::new(config, logger)?,
        })
    }
}

fn write_unit(unit: &str, workspace: &Path) -> Result<BackupArtifact> {
    let artifact = BackupArtifact::in_workspace(workspace, format!("{}.txt", unit));
    fs::write(artifact.path(), unit)?;
    artifact.materialize_if_present()
}

fn split_units(source: &str) -> Vec<String> {
    source
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl SourceProvider for StaticSource {
    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn discover(&self) -> Result<Option<Vec<String>>> {
        Ok(Some(split_units(&self.base.source)))
    }

    fn extract(&self, unit: &str, workspace: &Path) -> Result<BackupArtifact> {
        write_unit(unit, workspace)
    }
}

/// Creation time of every `stamped` artifact
pub fn stamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, 0, 30, 0).unwrap()
}

/// Static units with a fixed creation time, so archive names are predictable
pub struct StampedSource {
    base: SourceBase,
}

impl SourceProvider for StampedSource {
    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn discover(&self) -> Result<Option<Vec<String>>> {
        Ok(Some(split_units(&self.base.source)))
    }

    fn extract(&self, unit: &str, workspace: &Path) -> Result<BackupArtifact> {
        let artifact = BackupArtifact::in_workspace(workspace, format!("{}.txt", unit));
        fs::write(artifact.path(), format!("{} from {}", unit, self.base.name))?;
        Ok(artifact.materialized(stamp()))
    }
}

/// Discovers its units but cannot extract any of them
pub struct FailingSource {
    base: SourceBase,
}

impl SourceProvider for FailingSource {
    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn discover(&self) -> Result<Option<Vec<String>>> {
        Ok(Some(split_units(&self.base.source)))
    }

    fn extract(&self, unit: &str, _workspace: &Path) -> Result<BackupArtifact> {
        anyhow::bail!("connection refused while dumping {}", unit)
    }
}

pub struct PanickingSource {
    base: SourceBase,
}

impl SourceProvider for PanickingSource {
    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn discover(&self) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    fn extract(&self, unit: &str, _workspace: &Path) -> Result<BackupArtifact> {
        panic!("fixture source panicked on {}", unit)
    }
}

/// One-shot latch shared between a test and [`BlockingSource`]
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self) {
        let (open, signal) = &*self.inner;
        *open.lock() = true;
        signal.notify_all();
    }

    pub fn wait(&self) {
        let (open, signal) = &*self.inner;
        let mut open = open.lock();
        while !*open {
            signal.wait(&mut open);
        }
    }
}

/// Extracts like [`StaticSource`] once its gate opens
pub struct BlockingSource {
    base: SourceBase,
    gate: Gate,
}

impl SourceProvider for BlockingSource {
    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn discover(&self) -> Result<Option<Vec<String>>> {
        Ok(Some(split_units(&self.base.source)))
    }

    fn extract(&self, unit: &str, workspace: &Path) -> Result<BackupArtifact> {
        self.gate.wait();
        write_unit(unit, workspace)
    }
}

/// Built-in sources plus the fixture kinds; `blocking` sources share `gate`
pub fn fixture_sources(gate: Gate) -> SourceRegistry {
    let mut registry = SourceRegistry::with_defaults(Arc::new(
        multibackup::utils::executor::mock::MockExecutor::new(),
    ));

    registry.register("static", |config, logger| {
        Ok(Box::new(StaticSource::new(config, logger)?))
    });
    registry.register("stamped", |config, logger| {
        Ok(Box::new(StampedSource {
            base: SourceBase::new(config, logger)?,
        }))
    });
    registry.register("failing", |config, logger| {
        Ok(Box::new(FailingSource {
            base: SourceBase::new(config, logger)?,
        }))
    });
    registry.register("panicking", |config, logger| {
        Ok(Box::new(PanickingSource {
            base: SourceBase::new(config, logger)?,
        }))
    });
    registry.register("blocking", move |config, logger| {
        Ok(Box::new(BlockingSource {
            base: SourceBase::new(config, logger)?,
            gate: gate.clone(),
        }))
    });

    registry
}

/// Everything a [`RecordingTarget`] was asked to do
#[derive(Debug, Clone, Default)]
pub struct TargetRecord {
    /// bucket → file names stored there
    pub buckets: BTreeMap<String, BTreeSet<String>>,
    pub deleted: Vec<String>,
    pub disposed: usize,
}

/// Records of all recording targets, by target name
pub type TargetJournal = Arc<Mutex<BTreeMap<String, TargetRecord>>>;

/// Keeps bucket contents in memory. A target whose location is `fail-delete`
/// refuses every deletion.
pub struct RecordingTarget {
    base: TargetBase,
    fail_delete: bool,
    journal: TargetJournal,
}

impl RecordingTarget {
    pub fn new(config: &TargetConfig, logger: &Logger, journal: TargetJournal) -> Result<Self, ProviderError> {
        let base = TargetBase::new(config, logger)?;
        journal.lock().entry(base.name.clone()).or_default();
        Ok(Self {
            base,
            fail_delete: config.target.trim() == "fail-delete",
            journal,
        })
    }
}

impl TargetProvider for RecordingTarget {
    fn save(&mut self, bucket: &str, files: &[PathBuf]) -> Vec<PathBuf> {
        let journal = self.journal.clone();
        let name = self.base.name.clone();
        self.base.save_each(bucket, files, |file, file_name| {
            anyhow::ensure!(file.exists(), "{:?} does not exist", file);
            journal
                .lock()
                .entry(name.clone())
                .or_default()
                .buckets
                .entry(bucket.to_string())
                .or_default()
                .insert(file_name.to_string());
            Ok(())
        })
    }

    fn delete_bucket(&mut self, bucket: &str) -> Result<()> {
        if self.fail_delete {
            anyhow::bail!("deletion of {} refused", bucket);
        }
        let mut journal = self.journal.lock();
        let record = journal.entry(self.base.name.clone()).or_default();
        record.buckets.remove(bucket);
        record.deleted.push(bucket.to_string());
        Ok(())
    }

    fn list_buckets(&mut self) -> Result<Vec<String>> {
        let journal = self.journal.lock();
        Ok(journal
            .get(&self.base.name)
            .map(|r| r.buckets.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn dispose(&mut self) {
        self.journal
            .lock()
            .entry(self.base.name.clone())
            .or_default()
            .disposed += 1;
    }
}

/// Built-in targets plus `recording` targets that write into `journal`
pub fn fixture_targets(journal: &TargetJournal) -> TargetRegistry {
    let mut registry = TargetRegistry::with_defaults();
    let journal = journal.clone();
    registry.register("recording", move |config, logger| {
        Ok(Box::new(RecordingTarget::new(config, logger, journal.clone())?))
    });
    registry
}

/// Minimal valid config TOML template
pub fn minimal_config_toml() -> &'static str {
    r#"
[global]
temp_directory = "{work_dir}"
log_directory = "{log_dir}"

[[sources]]
provider = "file"
name = "data"
source = "{data_file}"

[[targets]]
provider = "directory"
name = "local"
target = "{backup_path}"

[targets.strategy]
provider = "days"
revisions = 7
"#
}

/// Config that mixes database and file sources with every target kind
pub fn full_config_toml() -> &'static str {
    r#"
[global]
log_directory = "/var/log/multibackup"
log_level = "verbose"

[[loggers]]
provider = "console"
priorities = "info,error"

[[loggers]]
provider = "file"
priorities = "all"
settings = "/var/log/multibackup/runs"

[[sources]]
provider = "postgresql"
name = "pg-main"
source = "host=db;port=5432;user=backup;password=secret"
exclude = "postgres,template0,template1"

[[sources]]
provider = "mssql"
name = "erp"
source = "host=sql01;integratedsecurity=true"
include = "erp,erp_archive"

[[sources]]
provider = "directory"
name = "uploads"
source = "/srv/uploads"

[[targets]]
provider = "directory"
name = "nas"
target = "/mnt/nas/backups"

[targets.strategy]
provider = "generations"

[[targets]]
provider = "dropbox"
name = "cloud"
target = "token=abc;path=/backups"

[targets.strategy]
provider = "days"
revisions = "14"

[[targets]]
provider = "ftp"
name = "offsite"
target = "host=ftp://backup.example.com:2121/nightly;user=ops;password=pw"

[targets.strategy]
provider = "days"
revisions = 3
"#
}

/// Substitute `{placeholder}` values in a config template
pub fn render_config(template: &str, values: &[(&str, &Path)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, path)| {
        acc.replace(&format!("{{{}}}", key), &path.display().to_string())
    })
}
