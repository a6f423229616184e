//! Injected run logger
//!
//! Every provider receives a cloned [`Logger`] at construction. A logger fans
//! each `(tag, severity, message)` entry out to its sinks, skipping sinks whose
//! priorities exclude the severity.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::{expand_tilde, LoggerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Verbose,
    Info,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Verbose => write!(f, "Verbose"),
            Severity::Info => write!(f, "Info"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// Set of severities a sink accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priorities {
    verbose: bool,
    info: bool,
    error: bool,
}

impl Priorities {
    pub const ALL: Priorities = Priorities { verbose: true, info: true, error: true };
    pub const NONE: Priorities = Priorities { verbose: false, info: false, error: false };

    /// Parse `verbose,info,error`, `all` or `none`. Unknown tokens are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut priorities = Self::NONE;
        for token in raw.split(',').map(|t| t.trim().to_lowercase()) {
            match token.as_str() {
                "all" => priorities = Self::ALL,
                "none" => {}
                "verbose" | "debug" => priorities.verbose = true,
                "info" => priorities.info = true,
                "error" => priorities.error = true,
                _ => {}
            }
        }
        priorities
    }

    pub fn accepts(&self, severity: Severity) -> bool {
        match severity {
            Severity::Verbose => self.verbose,
            Severity::Info => self.info,
            Severity::Error => self.error,
        }
    }
}

impl Default for Priorities {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub tag: String,
    pub severity: Severity,
    pub message: String,
}

pub trait LogSink: Send + Sync {
    fn write(&self, entry: &LogEntry);
}

/// Cloneable handle passed into every provider
#[derive(Clone)]
pub struct Logger {
    sinks: Arc<Vec<(Priorities, Arc<dyn LogSink>)>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("sinks", &self.sinks.len()).finish()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl Logger {
    pub fn new(sinks: Vec<(Priorities, Arc<dyn LogSink>)>) -> Self {
        Self { sinks: Arc::new(sinks) }
    }

    /// Single tracing sink accepting every severity
    pub fn tracing() -> Self {
        Self::new(vec![(Priorities::ALL, Arc::new(TracingSink) as Arc<dyn LogSink>)])
    }

    /// Logger that drops everything
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    /// Build sinks from `[[loggers]]` entries.
    ///
    /// A logger entry that cannot be built is reported through tracing and
    /// skipped. With no usable entries the tracing sink is used.
    pub fn from_config(configs: &[LoggerConfig]) -> Self {
        let mut sinks: Vec<(Priorities, Arc<dyn LogSink>)> = Vec::new();

        for config in configs {
            let priorities = config
                .priorities
                .as_deref()
                .map(Priorities::parse)
                .unwrap_or_default();

            match config.provider.trim().to_lowercase().as_str() {
                "console" => sinks.push((priorities, Arc::new(TracingSink))),
                "file" => {
                    let dir = config
                        .settings
                        .as_deref()
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| expand_tilde(Path::new(s)))
                        .unwrap_or_else(|| PathBuf::from("logs"));

                    match CsvFileSink::new(&dir) {
                        Ok(sink) => sinks.push((priorities, Arc::new(sink))),
                        Err(e) => tracing::error!(
                            "Cannot create file logger in {:?}: {}",
                            dir,
                            e
                        ),
                    }
                }
                "" => tracing::error!("Ignoring logger without provider"),
                other => tracing::error!("Unknown logger provider '{}'", other),
            }
        }

        if sinks.is_empty() {
            return Self::tracing();
        }

        Self::new(sinks)
    }

    pub fn log(&self, tag: &str, severity: Severity, message: impl AsRef<str>) {
        if !self.sinks.iter().any(|(p, _)| p.accepts(severity)) {
            return;
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            tag: tag.to_string(),
            severity,
            message: message.as_ref().to_string(),
        };

        for (priorities, sink) in self.sinks.iter() {
            if priorities.accepts(severity) {
                sink.write(&entry);
            }
        }
    }

    pub fn verbose(&self, tag: &str, message: impl AsRef<str>) {
        self.log(tag, Severity::Verbose, message);
    }

    pub fn info(&self, tag: &str, message: impl AsRef<str>) {
        self.log(tag, Severity::Info, message);
    }

    pub fn error(&self, tag: &str, message: impl AsRef<str>) {
        self.log(tag, Severity::Error, message);
    }
}

/// Re-emits entries as tracing events
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, entry: &LogEntry) {
        match entry.severity {
            Severity::Verbose => tracing::debug!(tag = %entry.tag, "{}", entry.message),
            Severity::Info => tracing::info!(tag = %entry.tag, "{}", entry.message),
            Severity::Error => tracing::error!(tag = %entry.tag, "{}", entry.message),
        }
    }
}

/// One `yyyyMMdd.csv` file per UTC day
pub struct CsvFileSink {
    directory: PathBuf,
    lock: Mutex<()>,
}

impl CsvFileSink {
    pub fn new(directory: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(directory)?;
        Ok(Self {
            directory: directory.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    pub fn file_for(&self, day: NaiveDate) -> PathBuf {
        self.directory.join(format!("{}.csv", day.format("%Y%m%d")))
    }

    fn append(&self, entry: &LogEntry) -> std::io::Result<()> {
        let path = self.file_for(entry.timestamp.date_naive());
        let is_new = !path.exists();

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if is_new {
            writeln!(file, "Timestamp;Text")?;
        }

        writeln!(file, "{}", format_csv_line(entry))
    }
}

impl LogSink for CsvFileSink {
    fn write(&self, entry: &LogEntry) {
        // A poisoned lock only means another writer panicked mid-line
        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Err(e) = self.append(entry) {
            tracing::error!("Failed to write log file in {:?}: {}", self.directory, e);
        }
    }
}

fn format_csv_line(entry: &LogEntry) -> String {
    let text = format!("[{}] ({}) {}", entry.tag, entry.severity, entry.message)
        .replace(';', "_")
        .replace(['\r', '\n'], " ");

    format!("{};{}", entry.timestamp.format("%Y-%m-%d %H:%M:%S"), text)
}

/// Collects entries in memory; used to assert on what a run reported
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Whether any entry of `severity` contains `needle`
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|e| e.severity == severity && e.message.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: &LogEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry.clone()),
            Err(poisoned) => poisoned.into_inner().push(entry.clone()),
        }
    }
}
