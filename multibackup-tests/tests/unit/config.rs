//! Unit tests for configuration loading and validation

use multibackup::config::{find_target, load_config, parse_config, ConfigError, Revisions};
use test_utils::{full_config_toml, minimal_config_toml, render_config, ConfigBuilder, TestContext};

#[test]
fn test_config_loading_valid() {
    let builder = ConfigBuilder::minimal();
    let config_path = builder.write_config("config.toml");

    let loaded = load_config(&config_path);
    assert!(loaded.is_ok(), "Config should load successfully: {:?}", loaded.err());

    let loaded = loaded.unwrap();
    assert_eq!(loaded.sources[0].name, "data");
    assert_eq!(loaded.targets[0].name, "local");
}

#[test]
fn test_template_renders_and_loads() {
    let ctx = TestContext::new();
    let data = ctx.create_file("data.txt", "x");
    let content = render_config(
        minimal_config_toml(),
        &[
            ("work_dir", ctx.temp_dir()),
            ("log_dir", ctx.temp_dir()),
            ("data_file", &data),
            ("backup_path", ctx.temp_dir()),
        ],
    );

    let config = parse_config(&content).unwrap();
    assert_eq!(config.sources[0].source, data.display().to_string());
    assert_eq!(config.targets[0].strategy.as_ref().unwrap().revisions(), 7);
}

#[test]
fn test_full_config() {
    let config = parse_config(full_config_toml()).unwrap();

    assert_eq!(config.global.log_level, "verbose");
    assert_eq!(config.loggers.len(), 2);
    assert_eq!(config.sources[0].exclude.as_deref(), Some("postgres,template0,template1"));

    let cloud = find_target(&config, "cloud").unwrap();
    let strategy = cloud.strategy.as_ref().unwrap();
    assert_eq!(strategy.revisions, Some(Revisions::Text("14".to_string())));
    assert_eq!(strategy.revisions(), 14);

    // Generations ignores revisions; a missing value counts as zero
    let nas = find_target(&config, "nas").unwrap();
    assert_eq!(nas.strategy.as_ref().unwrap().revisions(), 0);
}

#[test]
fn test_duplicate_source_names_rejected() {
    let content = r#"
[[sources]]
provider = "file"
name = "data"
source = "/a"

[[sources]]
provider = "directory"
name = "data"
source = "/b"
"#;

    let result = parse_config(content);
    assert!(matches!(
        result,
        Err(ConfigError::DuplicateName { kind: "source", .. })
    ));
}

#[test]
fn test_duplicate_target_names_rejected() {
    let content = r#"
[[targets]]
provider = "directory"
name = "nas"
target = "/a"

[[targets]]
provider = "ftp"
name = "nas"
target = "host=ftp"
"#;

    assert!(matches!(
        parse_config(content),
        Err(ConfigError::DuplicateName { kind: "target", .. })
    ));
}

#[test]
fn test_missing_provider_still_loads() {
    // Entries without a provider are skipped when the run builds them
    let content = r#"
[[sources]]
name = "orphan"
source = "/data"
"#;

    let config = parse_config(content).unwrap();
    assert!(config.sources[0].provider.is_empty());
}

#[test]
fn test_invalid_toml() {
    let ctx = TestContext::new();
    let config_path = ctx.create_file("config.toml", "invalid { toml content");

    assert!(matches!(load_config(&config_path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_empty_config_is_valid() {
    let config = parse_config("").unwrap();
    assert!(config.sources.is_empty());
    assert!(config.targets.is_empty());
}

#[test]
fn test_nonexistent_file() {
    let result = load_config(std::path::Path::new("/nonexistent/config.toml"));
    assert!(matches!(result, Err(ConfigError::ReadError(_))));
}

#[test]
fn test_unknown_target_lookup() {
    let config = ConfigBuilder::minimal().build();
    assert!(matches!(
        find_target(&config, "elsewhere"),
        Err(ConfigError::TargetNotFound(_))
    ));
}
