//! Utilities for running dump tools with proper error handling and timeouts

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tracing::debug;

/// Run a command with optional timeout, capturing stdout and stderr
pub fn run_command(
    program: &str,
    args: &[String],
    env: &[(String, String)],
    timeout: Option<Duration>,
) -> Result<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!("Running command: {} {}", program, args.join(" "));

    let output = execute(cmd, program, timeout)?;
    check_status(program, &output)?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        debug!("Command output: {}", stdout.trim_end());
    }

    Ok(output)
}

/// Run a command and return stdout as string
pub fn run_command_stdout(
    program: &str,
    args: &[String],
    env: &[(String, String)],
    timeout: Option<Duration>,
) -> Result<String> {
    let output = run_command(program, args, env, timeout)?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Run a command with stdout streamed into `output_path`
pub fn run_command_to_file(
    program: &str,
    args: &[String],
    env: &[(String, String)],
    output_path: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create output file {:?}", output_path))?;

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    cmd.stdout(Stdio::from(file));
    cmd.stderr(Stdio::piped());

    debug!(
        "Running command: {} {} > {:?}",
        program,
        args.join(" "),
        output_path
    );

    let output = execute(cmd, program, timeout)?;
    check_status(program, &output)
}

fn execute(cmd: Command, program: &str, timeout: Option<Duration>) -> Result<Output> {
    let Some(timeout_duration) = timeout else {
        let mut cmd = cmd;
        return cmd
            .output()
            .with_context(|| format!("Failed to execute {}", program));
    };

    let wait = async {
        let mut child = tokio::process::Command::from(cmd);
        child.kill_on_drop(true);
        match tokio::time::timeout(timeout_duration, child.output()).await {
            Ok(output) => output.with_context(|| format!("Failed to execute {}", program)),
            Err(_) => Err(anyhow::anyhow!(
                "{} timed out after {:?}",
                program,
                timeout_duration
            )),
        }
    };

    // Providers run on blocking threads inside the runtime; the CLI's
    // `validate` path may call in without one.
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle.block_on(wait),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start runtime for command timeout")?
            .block_on(wait),
    }
}

fn check_status(program: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    anyhow::bail!(
        "{} failed with exit code {:?}: {}",
        program,
        output.status.code(),
        if stderr.is_empty() { "unknown" } else { stderr }
    )
}
