//! Unit tests for the run logger

use chrono::Utc;
use multibackup::managers::run_log::{CsvFileSink, Logger, Priorities, Severity};
use test_utils::{LoggerConfig, TestContext};

fn file_logger(dir: &std::path::Path, priorities: &str) -> LoggerConfig {
    LoggerConfig {
        provider: "file".to_string(),
        priorities: Some(priorities.to_string()),
        settings: Some(dir.display().to_string()),
    }
}

#[test]
fn test_file_logger_writes_daily_csv() {
    let ctx = TestContext::new();
    let dir = ctx.create_subdir("runs");
    let logger = Logger::from_config(&[file_logger(&dir, "all")]);

    logger.info("pg-main", "Created 2 backups");
    logger.error("nas", "disk full; giving up");

    let path = CsvFileSink::new(&dir).unwrap().file_for(Utc::now().date_naive());
    let contents = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();

    assert_eq!(lines[0], "Timestamp;Text");
    assert!(lines[1].ends_with(";[pg-main] (Info) Created 2 backups"));
    assert!(lines[2].ends_with(";[nas] (Error) disk full_ giving up"));
}

#[test]
fn test_file_logger_respects_priorities() {
    let ctx = TestContext::new();
    let dir = ctx.create_subdir("runs");
    let logger = Logger::from_config(&[file_logger(&dir, "error")]);

    logger.verbose("x", "noise");
    logger.info("x", "progress");
    logger.error("x", "failure");

    let path = CsvFileSink::new(&dir).unwrap().file_for(Utc::now().date_naive());
    let contents = std::fs::read_to_string(path).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.contains("(Error) failure"));
}

#[test]
fn test_priorities_parse() {
    let parsed = Priorities::parse("info, error");
    assert!(parsed.accepts(Severity::Info));
    assert!(parsed.accepts(Severity::Error));
    assert!(!parsed.accepts(Severity::Verbose));

    assert!(!Priorities::parse("none").accepts(Severity::Error));
}

#[test]
fn test_logger_without_provider_is_skipped() {
    let ctx = TestContext::new();
    let dir = ctx.create_subdir("runs");
    let blank = LoggerConfig {
        provider: "  ".to_string(),
        priorities: Some("all".to_string()),
        settings: None,
    };
    let logger = Logger::from_config(&[blank, file_logger(&dir, "all")]);

    logger.info("x", "still logged");

    let path = CsvFileSink::new(&dir).unwrap().file_for(Utc::now().date_naive());
    let contents = std::fs::read_to_string(path).unwrap();
    assert!(contents.contains("(Info) still logged"));
}
