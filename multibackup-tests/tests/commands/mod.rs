//! Command tests for multibackup
//!
//! These tests cover what the CLI commands do, calling the library the
//! same way `main` does.

mod buckets;
mod run;
mod validate;
