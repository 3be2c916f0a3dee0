//! Subprocess execution with timeout and cancellation.
//!
//! Every external tool invocation (scanner, signer, SBOM generator) goes
//! through [`run_tool`]. Each invocation is a fresh, independent subprocess
//! bound to a caller-supplied timeout and a [`CancellationToken`]; on
//! timeout or cancellation the child process is terminated, not merely
//! abandoned (`kill_on_drop` ensures the kill happens on every exit path).
//!
//! No locks are held across an external-process call, and no state outlives
//! the invocation.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ExecError;

/// Maximum stderr bytes carried in an error, enough to diagnose without
/// re-running the tool.
const MAX_STDERR_LEN: usize = 4096;

/// Captured output of a completed tool invocation.
#[derive(Debug)]
pub struct ExecOutput {
    /// Raw stdout bytes (tool output is often JSON or opaque SBOM content).
    pub stdout: Vec<u8>,
    /// Lossy-decoded stderr (diagnostics, progress messages).
    pub stderr: String,
}

impl ExecOutput {
    /// Returns stdout lossy-decoded as a string.
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs an external tool to completion.
///
/// # Arguments
///
/// - `tool`: logical tool name used in errors and logs (e.g. "grype")
/// - `command`: executable name or path
/// - `args` / `envs`: invocation arguments and extra child environment
/// - `timeout`: per-invocation deadline
/// - `cancel`: caller cancellation; terminates the child mid-flight
///
/// # Errors
///
/// - [`ExecError::NotFound`]: executable missing from the search path
/// - [`ExecError::NonZeroExit`]: tool ran but failed (stderr attached)
/// - [`ExecError::Timeout`] / [`ExecError::Cancelled`]: child killed
pub async fn run_tool(
    tool: &str,
    command: &str,
    args: &[String],
    envs: &[(String, String)],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ExecOutput, ExecError> {
    debug!(tool, command, ?args, "running external tool");

    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExecError::NotFound {
                tool: tool.to_owned(),
                command: command.to_owned(),
            }
        } else {
            ExecError::Spawn {
                tool: tool.to_owned(),
                source: e,
            }
        }
    })?;

    // Dropping the in-flight future (timeout/cancel branches) drops the
    // child handle, and kill_on_drop terminates the process.
    let output = tokio::select! {
        waited = tokio::time::timeout(timeout, child.wait_with_output()) => {
            match waited {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return Err(ExecError::Spawn {
                        tool: tool.to_owned(),
                        source: e,
                    });
                }
                Err(_) => {
                    return Err(ExecError::Timeout {
                        tool: tool.to_owned(),
                        timeout_secs: timeout.as_secs(),
                    });
                }
            }
        }
        _ = cancel.cancelled() => {
            return Err(ExecError::Cancelled {
                tool: tool.to_owned(),
            });
        }
    };

    let stderr = truncate(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(ExecError::NonZeroExit {
            tool: tool.to_owned(),
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(ExecOutput {
        stdout: output.stdout,
        stderr,
    })
}

fn truncate(s: &str) -> String {
    if s.len() <= MAX_STDERR_LEN {
        return s.to_owned();
    }
    let mut end = MAX_STDERR_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &s[..end])
}
