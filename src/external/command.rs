//! Base command execution abstraction
//!
//! Provides the foundational trait for executing external commands, enabling
//! dependency injection for testing.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }

    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum CommandError {
    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },
    #[error("IO error: {message}")]
    Io { message: String },
}

/// Trait for executing external commands
///
/// This abstraction allows the provisioning steps to drive `az`, `kubectl`
/// and `helm` without directly depending on process spawning, enabling
/// testing with scripted implementations.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError>;

    /// Execute a command with `input` written to its stdin.
    async fn execute_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
    ) -> Result<CommandOutput, CommandError>;
}

/// Real implementation spawning child processes through tokio
pub struct ProcessCommandExecutor;

fn spawn_error(program: &str, e: std::io::Error) -> CommandError {
    if e.kind() == std::io::ErrorKind::NotFound {
        CommandError::CommandNotFound {
            command: program.to_string(),
        }
    } else {
        CommandError::Io {
            message: e.to_string(),
        }
    }
}

fn into_output(output: std::process::Output) -> CommandOutput {
    CommandOutput {
        status_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        tracing::debug!(program, args = %args.join(" "), "executing command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(program, e))?;

        Ok(into_output(output))
    }

    async fn execute_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
    ) -> Result<CommandOutput, CommandError> {
        tracing::debug!(program, args = %args.join(" "), bytes = input.len(), "executing command with stdin");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| CommandError::Io {
                    message: e.to_string(),
                })?;
            // stdin is dropped here so the child sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CommandError::ExecutionFailed {
                message: e.to_string(),
            })?;

        Ok(into_output(output))
    }
}
