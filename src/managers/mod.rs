pub mod backup;
pub mod logging;
pub mod run_log;
pub mod workspace;
