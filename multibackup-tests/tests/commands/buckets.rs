//! Tests for the 'buckets' command

use multibackup::config::find_target;
use multibackup::managers::run_log::Logger;
use multibackup::targets::{TargetProvider, TargetRegistry};
use test_utils::{ConfigBuilder, TestContext};

#[test]
fn test_buckets_lists_directory_target() {
    let ctx = TestContext::new();
    let nas = ctx.create_subdir("nas");
    ctx.create_subdir("nas/2024-01-09");
    ctx.create_subdir("nas/2024-01-10");
    ctx.create_file("nas/notes.txt", "not a bucket");

    let config = ConfigBuilder::new()
        .add_directory_target("nas", &nas, "days", 7)
        .build();

    let target_config = find_target(&config, "nas").unwrap();
    let mut target = TargetRegistry::with_defaults()
        .create(target_config, &Logger::silent())
        .unwrap();

    assert_eq!(target.list_buckets().unwrap(), vec!["2024-01-09", "2024-01-10"]);
}

#[test]
fn test_buckets_unknown_target() {
    let config = ConfigBuilder::minimal().build();
    assert!(find_target(&config, "missing").is_err());
}
