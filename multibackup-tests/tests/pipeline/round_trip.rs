// Full runs delivering real zip archives into a directory target

use super::{manager, wednesday};
use chrono::{Duration, TimeZone, Utc};
use multibackup::managers::backup::RunOutcome;
use multibackup::managers::run_log::Logger;
use multibackup::targets::{TargetProvider, TargetRegistry};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use test_utils::{ConfigBuilder, Gate, TargetJournal, TestContext};
use zip::ZipArchive;

fn buckets(builder: &ConfigBuilder, target: &str) -> Vec<String> {
    let config = builder.to_config();
    let target_config = multibackup::config::find_target(&config, target).unwrap();
    let mut target = TargetRegistry::with_defaults()
        .create(target_config, &Logger::silent())
        .unwrap();
    target.list_buckets().unwrap()
}

fn zip_entries(path: &Path) -> Vec<(String, String)> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut contents = String::new();
            if entry.is_file() {
                entry.read_to_string(&mut contents).unwrap();
            }
            (entry.name().to_string(), contents)
        })
        .collect()
}

#[tokio::test]
async fn test_days_retention_round_trip() {
    let ctx = TestContext::new();
    let nas = ctx.create_subdir("nas");
    ctx.create_file("nas/2024-01-07/old.zip", "old");
    ctx.create_subdir("nas/2024-01-08");

    let builder = ConfigBuilder::new()
        .add_simple_source("static", "alpha", "a")
        .add_directory_target("nas", &nas, "days", 3);
    let journal = TargetJournal::default();

    let report = manager(&builder, ctx.logger(), Gate::new(), &journal, wednesday())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.deliveries[0].pruned, vec!["2024-01-07"]);
    assert_eq!(buckets(&builder, "nas"), vec!["2024-01-08", "2024-01-10"]);

    let delivered = ctx.list_dir(&nas.join("2024-01-10"));
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].starts_with("alpha_a.txt_"));
    assert!(delivered[0].ends_with(".zip"));
    assert_eq!(
        zip_entries(&nas.join("2024-01-10").join(&delivered[0])),
        vec![("a.txt".to_string(), "a".to_string())]
    );

    // Next day drops the bucket that is now three days old
    let thursday = wednesday() + Duration::days(1);
    manager(&builder, ctx.logger(), Gate::new(), &journal, thursday)
        .run()
        .await
        .unwrap();
    assert_eq!(buckets(&builder, "nas"), vec!["2024-01-10", "2024-01-11"]);
}

#[tokio::test]
async fn test_generations_keep_first_monday() {
    let ctx = TestContext::new();
    let nas = ctx.create_subdir("nas");
    // Mondays four weeks before the run dates below
    ctx.create_subdir("nas/2024-01-01");
    ctx.create_subdir("nas/2024-01-08");

    let builder = ConfigBuilder::new()
        .add_simple_source("static", "alpha", "a")
        .add_directory_target("nas", &nas, "generations", 0);
    let journal = TargetJournal::default();

    let first_run = Utc.with_ymd_and_hms(2024, 1, 29, 1, 0, 0).unwrap();
    let report = manager(&builder, ctx.logger(), Gate::new(), &journal, first_run)
        .run()
        .await
        .unwrap();
    assert!(report.deliveries[0].pruned.is_empty());

    let second_run = Utc.with_ymd_and_hms(2024, 2, 5, 1, 0, 0).unwrap();
    let report = manager(&builder, ctx.logger(), Gate::new(), &journal, second_run)
        .run()
        .await
        .unwrap();
    assert_eq!(report.deliveries[0].pruned, vec!["2024-01-08"]);

    assert_eq!(
        buckets(&builder, "nas"),
        vec!["2024-01-01", "2024-01-29", "2024-02-05"]
    );
}

#[tokio::test]
async fn test_file_and_directory_sources_are_archived() {
    let ctx = TestContext::new();
    let file = ctx.create_file("data/report.csv", "a;b");
    let tree = ctx.create_subdir("uploads");
    ctx.create_file("uploads/img/logo.png", "png");
    ctx.create_file("uploads/readme.txt", "hi");
    let nas = ctx.create_subdir("nas");

    let builder = ConfigBuilder::new()
        .add_file_source("reports", &file)
        .add_file_source("uploads", &tree)
        .add_directory_target("nas", &nas, "days", 7);
    let journal = TargetJournal::default();

    let report = manager(&builder, ctx.logger(), Gate::new(), &journal, wednesday())
        .run()
        .await
        .unwrap();

    assert_eq!(report.artifacts, 2);
    let bucket = nas.join("2024-01-10");
    let delivered = ctx.list_dir(&bucket);
    assert_eq!(delivered.len(), 2);

    let reports = delivered.iter().find(|n| n.starts_with("reports_report.csv_")).unwrap();
    assert_eq!(
        zip_entries(&bucket.join(reports)),
        vec![("report.csv".to_string(), "a;b".to_string())]
    );

    let uploads = delivered.iter().find(|n| n.starts_with("uploads_uploads_")).unwrap();
    let names: Vec<String> = zip_entries(&bucket.join(uploads))
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["img/", "img/logo.png", "readme.txt"]);

    // Sources are read in place and must survive the run
    assert!(file.exists());
    assert!(tree.join("readme.txt").exists());

    let workspace_base = builder.workspace_base().unwrap();
    assert!(ctx.list_dir(workspace_base).is_empty());
}
