//! Command execution abstraction for testability
//!
//! Database sources shell out to the engine's own dump tools. They receive an
//! `Arc<dyn CommandExecutor>` so tests can swap in [`mock::MockExecutor`].

use anyhow::Result;
use std::path::Path;
use std::process::Output;
use std::time::Duration;

/// Abstraction for command execution, enabling mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Run a command with optional timeout
    fn run_command(
        &self,
        program: &str,
        args: &[String],
        env: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<Output>;

    /// Run a command and return stdout as string
    fn run_command_stdout(
        &self,
        program: &str,
        args: &[String],
        env: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<String> {
        let output = self.run_command(program, args, env, timeout)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a command with stdout written to `output`
    fn run_command_to_file(
        &self,
        program: &str,
        args: &[String],
        env: &[(String, String)],
        output: &Path,
    ) -> Result<()>;
}

/// Default implementation using real subprocess calls
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealExecutor {
    fn run_command(
        &self,
        program: &str,
        args: &[String],
        env: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<Output> {
        super::command::run_command(program, args, env, timeout)
    }

    fn run_command_stdout(
        &self,
        program: &str,
        args: &[String],
        env: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<String> {
        super::command::run_command_stdout(program, args, env, timeout)
    }

    fn run_command_to_file(
        &self,
        program: &str,
        args: &[String],
        env: &[(String, String)],
        output: &Path,
    ) -> Result<()> {
        super::command::run_command_to_file(program, args, env, output, None)
    }
}

/// A mock executor for testing that records calls and returns configured responses
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, MutexGuard};

    /// Recorded command invocation
    #[derive(Clone, Debug)]
    pub struct CommandCall {
        /// Program as passed, possibly a full path
        pub program: String,
        pub args: Vec<String>,
        pub env: Vec<(String, String)>,
        pub output: Option<std::path::PathBuf>,
    }

    impl CommandCall {
        /// File name of the program without extension (`/opt/pg/bin/psql` → `psql`)
        pub fn tool(&self) -> String {
            tool_name(&self.program)
        }

        pub fn env_var(&self, key: &str) -> Option<&str> {
            self.env
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        }

        pub fn has_arg_containing(&self, needle: &str) -> bool {
            self.args.iter().any(|a| a.contains(needle))
        }
    }

    /// Response configuration for mock
    #[derive(Clone, Debug)]
    pub enum MockResponse {
        Success { stdout: String, stderr: String },
        Failure { stderr: String, exit_code: i32 },
        Timeout,
    }

    impl MockResponse {
        pub fn stdout(stdout: &str) -> Self {
            MockResponse::Success {
                stdout: stdout.to_string(),
                stderr: String::new(),
            }
        }

        pub fn failure(stderr: &str) -> Self {
            MockResponse::Failure {
                stderr: stderr.to_string(),
                exit_code: 1,
            }
        }
    }

    impl Default for MockResponse {
        fn default() -> Self {
            MockResponse::Success {
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    /// Runs after a call is recorded, before the response is returned.
    /// Lets a test create the files a real dump tool would have written.
    pub type SideEffect = Arc<dyn Fn(&CommandCall) + Send + Sync>;

    struct Rule {
        tool: String,
        arg_contains: Option<String>,
        response: MockResponse,
    }

    /// Mock executor for testing
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Recorded command invocations
        pub calls: Arc<Mutex<Vec<CommandCall>>>,
        /// Pre-configured responses; later rules win
        rules: Arc<Mutex<Vec<Rule>>>,
        side_effects: Arc<Mutex<HashMap<String, SideEffect>>>,
        /// Default response when no specific response is configured
        default_response: Arc<Mutex<MockResponse>>,
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn tool_name(program: &str) -> String {
        Path::new(program)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.to_string())
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure a response for a program, matched by file stem
        pub fn expect(self, program: &str, response: MockResponse) -> Self {
            lock(&self.rules).push(Rule {
                tool: tool_name(program),
                arg_contains: None,
                response,
            });
            self
        }

        /// Configure a response for calls to `program` with an argument containing `needle`
        pub fn expect_with_arg(self, program: &str, needle: &str, response: MockResponse) -> Self {
            lock(&self.rules).push(Rule {
                tool: tool_name(program),
                arg_contains: Some(needle.to_string()),
                response,
            });
            self
        }

        pub fn with_side_effect(self, program: &str, effect: SideEffect) -> Self {
            lock(&self.side_effects).insert(tool_name(program), effect);
            self
        }

        /// Set the default response for unconfigured programs
        pub fn with_default_response(self, response: MockResponse) -> Self {
            *lock(&self.default_response) = response;
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<CommandCall> {
            lock(&self.calls).clone()
        }

        /// Check if a program was called
        pub fn was_called(&self, program: &str) -> bool {
            let tool = tool_name(program);
            lock(&self.calls).iter().any(|c| c.tool() == tool)
        }

        /// Get number of calls to a specific program
        pub fn call_count(&self, program: &str) -> usize {
            let tool = tool_name(program);
            lock(&self.calls).iter().filter(|c| c.tool() == tool).count()
        }

        fn record_call(&self, call: CommandCall) {
            let effect = lock(&self.side_effects).get(&call.tool()).cloned();
            if let Some(effect) = effect {
                effect(&call);
            }
            lock(&self.calls).push(call);
        }

        fn get_response(&self, call: &CommandCall) -> MockResponse {
            let tool = call.tool();
            lock(&self.rules)
                .iter()
                .rev()
                .find(|rule| {
                    rule.tool == tool
                        && rule
                            .arg_contains
                            .as_deref()
                            .map_or(true, |needle| call.has_arg_containing(needle))
                })
                .map(|rule| rule.response.clone())
                .unwrap_or_else(|| lock(&self.default_response).clone())
        }

        fn execute_response(&self, response: MockResponse) -> Result<Output> {
            match response {
                MockResponse::Success { stdout, stderr } => Ok(Output {
                    status: std::process::ExitStatus::default(),
                    stdout: stdout.into_bytes(),
                    stderr: stderr.into_bytes(),
                }),
                MockResponse::Failure { stderr, exit_code } => {
                    anyhow::bail!("Command failed with exit code {:?}: {}", exit_code, stderr)
                }
                MockResponse::Timeout => {
                    anyhow::bail!("Command timed out")
                }
            }
        }
    }

    impl CommandExecutor for MockExecutor {
        fn run_command(
            &self,
            program: &str,
            args: &[String],
            env: &[(String, String)],
            _timeout: Option<Duration>,
        ) -> Result<Output> {
            let call = CommandCall {
                program: program.to_string(),
                args: args.to_vec(),
                env: env.to_vec(),
                output: None,
            };
            let response = self.get_response(&call);
            self.record_call(call);
            self.execute_response(response)
        }

        fn run_command_to_file(
            &self,
            program: &str,
            args: &[String],
            env: &[(String, String)],
            output: &Path,
        ) -> Result<()> {
            let call = CommandCall {
                program: program.to_string(),
                args: args.to_vec(),
                env: env.to_vec(),
                output: Some(output.to_path_buf()),
            };
            let response = self.get_response(&call);
            self.record_call(call);

            let result = self.execute_response(response)?;
            std::fs::write(output, &result.stdout)?;
            Ok(())
        }
    }
}
