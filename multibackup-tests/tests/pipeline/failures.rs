// Per-unit failures are logged and skipped; the rest of the run continues

use super::{manager, recording_target, wednesday};
use multibackup::managers::backup::RunOutcome;
use test_utils::{ConfigBuilder, Gate, Severity, TargetJournal, TestContext};

#[tokio::test]
async fn test_one_of_three_sources_fails() {
    let ctx = TestContext::new();
    let builder = ConfigBuilder::new()
        .add_simple_source("static", "alpha", "a")
        .add_simple_source("failing", "broken", "b")
        .add_simple_source("static", "gamma", "c")
        .add_target(recording_target("memory", "mem", "days", 3));
    let journal = TargetJournal::default();

    let report = manager(&builder, ctx.logger(), Gate::new(), &journal, wednesday())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.artifacts, 2);
    assert_eq!(report.archives.len(), 2);
    assert_eq!(report.deliveries[0].saved.len(), 2);

    let journal = journal.lock();
    let stored = &journal["memory"].buckets["2024-01-10"];
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().any(|n| n.starts_with("alpha_a.txt_")));
    assert!(stored.iter().any(|n| n.starts_with("gamma_c.txt_")));

    assert!(ctx.log().contains(Severity::Error, "connection refused while dumping b"));
}

#[tokio::test]
async fn test_panicking_source_does_not_stop_run() {
    let ctx = TestContext::new();
    let builder = ConfigBuilder::new()
        .add_simple_source("panicking", "explodes", "anything")
        .add_simple_source("static", "steady", "s")
        .add_target(recording_target("memory", "mem", "generations", 0));
    let journal = TargetJournal::default();

    let report = manager(&builder, ctx.logger(), Gate::new(), &journal, wednesday())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.artifacts, 1);
    assert!(ctx.log().contains(Severity::Error, "Extraction task failed"));
    assert_eq!(journal.lock()["memory"].disposed, 1);
}

#[tokio::test]
async fn test_unknown_and_invalid_entries_are_skipped() {
    let ctx = TestContext::new();
    let builder = ConfigBuilder::new()
        .add_simple_source("mongodb", "docs", "host=mongo")
        .add_simple_source("static", "empty-location", "")
        .add_simple_source("static", "ok", "x")
        .add_target(recording_target("memory", "mem", "days", 1))
        .add_target(recording_target("weird", "mem", "hourly", 1));
    let journal = TargetJournal::default();

    let report = manager(&builder, ctx.logger(), Gate::new(), &journal, wednesday())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.artifacts, 1);
    assert_eq!(report.deliveries.len(), 1);
    assert!(ctx.log().contains(Severity::Error, "Skipping source 'docs'"));
    assert!(ctx.log().contains(Severity::Error, "Skipping source 'empty-location'"));
    assert!(ctx.log().contains(Severity::Error, "Skipping target 'weird'"));
}

#[tokio::test]
async fn test_prune_failure_keeps_delivery() {
    let ctx = TestContext::new();
    let builder = ConfigBuilder::new()
        .add_simple_source("static", "alpha", "a")
        .add_target(recording_target("stubborn", "fail-delete", "days", 2))
        .add_target(recording_target("memory", "mem", "days", 2));
    let journal = TargetJournal::default();

    let report = manager(&builder, ctx.logger(), Gate::new(), &journal, wednesday())
        .run()
        .await
        .unwrap();

    let stubborn = report.deliveries.iter().find(|d| d.target == "stubborn").unwrap();
    assert_eq!(stubborn.saved.len(), 1);
    assert_eq!(stubborn.prune_failures, vec!["2024-01-08"]);

    let memory = report.deliveries.iter().find(|d| d.target == "memory").unwrap();
    assert_eq!(memory.pruned, vec!["2024-01-08"]);

    let journal = journal.lock();
    assert_eq!(journal["stubborn"].disposed, 1);
    assert_eq!(journal["memory"].disposed, 1);
}

#[tokio::test]
async fn test_no_usable_targets_stops_before_extracting() {
    let ctx = TestContext::new();
    let builder = ConfigBuilder::new().add_simple_source("static", "alpha", "a");
    let nas = ctx.create_subdir("nas");
    let workspace_base = builder.workspace_base().unwrap().to_path_buf();
    let builder = builder.add_target_without_strategy("nas", &nas);
    let journal = TargetJournal::default();

    let report = manager(&builder, ctx.logger(), Gate::new(), &journal, wednesday())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::NoTargets);
    assert!(ctx.list_dir(&workspace_base).is_empty());
    assert!(!ctx.log().contains(Severity::Info, "Entering Extracting"));
}

#[tokio::test]
async fn test_colliding_archive_names_keep_first_artifact() {
    let ctx = TestContext::new();
    // Both names sanitize to "db1" and both sources produce x.txt at the same stamp
    let builder = ConfigBuilder::new()
        .add_simple_source("stamped", "db:1", "x")
        .add_simple_source("stamped", "db1", "x")
        .add_target(recording_target("memory", "mem", "days", 0));
    let journal = TargetJournal::default();

    let report = manager(&builder, ctx.logger(), Gate::new(), &journal, wednesday())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.artifacts, 2);
    assert_eq!(report.archives.len(), 1);
    assert_eq!(report.deliveries[0].saved.len(), 1);
    assert!(report.archives[0].ends_with("db1_x.txt_20240110003000.zip"));
    assert!(ctx.log().contains(Severity::Error, "already taken by another artifact"));

    let journal = journal.lock();
    assert_eq!(journal["memory"].buckets["2024-01-10"].len(), 1);
}

#[tokio::test]
async fn test_nameless_entries_are_skipped() {
    let ctx = TestContext::new();
    let builder = ConfigBuilder::new()
        .add_simple_source("static", "", "lost")
        .add_simple_source("static", "docs", "kept")
        .add_target(recording_target("", "mem", "days", 1))
        .add_target(recording_target("memory", "mem", "days", 1));
    let journal = TargetJournal::default();

    let report = manager(&builder, ctx.logger(), Gate::new(), &journal, wednesday())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.artifacts, 1);
    assert_eq!(report.deliveries.len(), 1);
    assert_eq!(report.deliveries[0].target, "memory");
    assert!(ctx
        .log()
        .contains(Severity::Error, "Skipping source: 'static entry' is missing the 'name' setting"));
    assert!(ctx
        .log()
        .contains(Severity::Error, "Skipping target: 'recording entry' is missing the 'name' setting"));

    let journal = journal.lock();
    let stored = &journal["memory"].buckets["2024-01-10"];
    assert_eq!(stored.len(), 1);
    assert!(stored.iter().any(|n| n.starts_with("docs_kept.txt_")));
    assert!(!journal.contains_key(""));
}
