//! Test utilities for multibackup
//!
//! This crate provides shared test utilities, in-memory providers,
//! and helper functions for testing the multibackup application.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, TestContext};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let ctx = TestContext::new();
//!     let data = ctx.create_file("data.txt", "payload");
//!     let config = ConfigBuilder::new()
//!         .add_file_source("docs", &data)
//!         .add_directory_target("nas", &ctx.create_subdir("nas"), "days", 7)
//!         .build();
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{OptionAssertions, ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use multibackup::config::{
    Config, GlobalConfig, LoggerConfig, Revisions, SourceConfig, StrategyConfig, TargetConfig,
};
pub use multibackup::managers::run_log::{LogSink, Logger, MemorySink, Priorities, Severity};

// Re-export mock implementations from the main crate
pub use multibackup::utils::executor::mock::{MockExecutor, MockResponse};
pub use multibackup::utils::executor::CommandExecutor;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
