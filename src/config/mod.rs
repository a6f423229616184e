//! Configuration module for multibackup
//!
//! A configuration file lists loggers, sources and targets. Every target may
//! carry a retention strategy; targets without one are skipped during a run.
//!
//! ## Example Usage
//!
//! ```no_run
//! use multibackup::config;
//!
//! let config = config::load_config("multibackup.toml")?;
//!
//! for source in &config.sources {
//!     println!("Source: {} ({})", source.name, source.provider);
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod connection;
mod loader;
mod types;

pub use connection::ConnectionString;
pub use loader::{find_target, load_config, parse_config, validate_config, ConfigError, Result};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
