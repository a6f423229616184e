use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::SourceBase;
use crate::config::{ConnectionString, SourceConfig};
use crate::error::ProviderError;
use crate::managers::run_log::Logger;
use crate::utils::executor::CommandExecutor;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection handling shared by the database engines
#[derive(Clone)]
pub struct DatabaseSource {
    pub base: SourceBase,
    pub connection: ConnectionString,
    executor: Arc<dyn CommandExecutor>,
}

impl DatabaseSource {
    pub fn new(
        config: &SourceConfig,
        logger: &Logger,
        executor: Arc<dyn CommandExecutor>,
    ) -> Result<Self, ProviderError> {
        let base = SourceBase::new(config, logger)?;
        let connection = ConnectionString::parse(&base.source);

        Ok(Self {
            base,
            connection,
            executor,
        })
    }

    pub fn executor(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    pub fn host(&self) -> &str {
        self.connection.get("host").unwrap_or("localhost")
    }

    pub fn port(&self) -> Option<&str> {
        self.connection.get("port")
    }

    pub fn user(&self) -> Option<&str> {
        self.connection.get("user")
    }

    pub fn password(&self) -> Option<&str> {
        self.connection.get("password")
    }

    /// Timeout for enumeration queries
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.connection.get_u64("timeout", DEFAULT_TIMEOUT_SECS))
    }

    /// Mandatory connection key
    pub fn require(&self, key: &str) -> Result<&str, ProviderError> {
        self.connection
            .get(key)
            .ok_or_else(|| ProviderError::MissingSetting {
                name: self.base.name.clone(),
                key: key.to_string(),
            })
    }

    /// Program to run for `tool`: `bin/<tool>` when `bin` is set, otherwise
    /// the bare name resolved through `PATH`
    pub fn binary(&self, tool: &str) -> Result<String> {
        let file_name = format!("{}{}", tool, std::env::consts::EXE_SUFFIX);

        match self.connection.get("bin") {
            Some(bin) => {
                let path = Path::new(bin).join(&file_name);
                if !path.exists() {
                    anyhow::bail!("{} not found in {}", file_name, bin);
                }
                Ok(path.to_string_lossy().into_owned())
            }
            None => Ok(file_name),
        }
    }

    /// Binaries as they would be invoked, for pre-flight checks
    pub fn tool_paths(&self, tools: &[&str]) -> Vec<String> {
        let bin = self.connection.get("bin");
        tools
            .iter()
            .map(|tool| {
                let file_name = format!("{}{}", tool, std::env::consts::EXE_SUFFIX);
                match bin {
                    Some(bin) => Path::new(bin).join(file_name).to_string_lossy().into_owned(),
                    None => file_name,
                }
            })
            .collect()
    }

    /// Environment entry carrying the password, if one is configured
    pub fn password_env(&self, var: &str) -> Vec<(String, String)> {
        self.password()
            .map(|p| vec![(var.to_string(), p.to_string())])
            .unwrap_or_default()
    }
}

/// Non-empty trimmed lines of tool output
pub(crate) fn output_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
