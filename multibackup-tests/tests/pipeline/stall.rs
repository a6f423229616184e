// A stuck source holds up its phase; the run has no timeout of its own

use super::{manager, recording_target, wednesday};
use multibackup::managers::backup::RunOutcome;
use std::time::Duration;
use test_utils::{ConfigBuilder, Gate, Severity, TargetJournal, TestContext};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocked_source_stalls_run_until_released() {
    let ctx = TestContext::new();
    let builder = ConfigBuilder::new()
        .add_simple_source("blocking", "slow", "s")
        .add_simple_source("static", "fast", "f")
        .add_target(recording_target("memory", "mem", "days", 1));
    let journal = TargetJournal::default();
    let gate = Gate::new();

    let backup = manager(&builder, ctx.logger(), gate.clone(), &journal, wednesday());
    let mut run = tokio::spawn(async move { backup.run().await });

    let stalled = tokio::time::timeout(Duration::from_millis(200), &mut run).await;
    assert!(stalled.is_err(), "run finished while a source was blocked");
    assert!(!ctx.log().contains(Severity::Info, "Entering Archiving"));
    assert!(journal.lock()["memory"].buckets.is_empty());

    gate.release();
    let report = run.await.unwrap().unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.artifacts, 2);
    assert_eq!(journal.lock()["memory"].buckets["2024-01-10"].len(), 2);
}
