//! Failure classification shared by the `az`, `kubectl` and `helm` clients
//!
//! The CLIs only report failures through exit codes and stderr text. Steps
//! need to tell "the resource is already in the desired state" apart from a
//! genuine error, so every non-zero exit is classified here.

use super::command::{CommandError, CommandOutput};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static ALREADY_EXISTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(already exists|already enabled|alreadyexists|already been enabled|cannot re-use a name that is still in use|already installed)",
    )
    .expect("valid already-exists pattern")
});

static NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(resourcenotfound|resourcegroupnotfound|could not be found|was not found|not found)")
        .expect("valid not-found pattern")
});

#[derive(Debug, Error, Clone)]
pub enum CliError {
    #[error("{tool}: resource already exists: {message}")]
    AlreadyExists { tool: String, message: String },
    #[error("{tool}: resource not found: {message}")]
    NotFound { tool: String, message: String },
    #[error("{tool} {args} exited with status {status_code}: {message}")]
    Failed {
        tool: String,
        args: String,
        status_code: i32,
        message: String,
    },
    #[error("Command execution error: {source}")]
    Command {
        #[from]
        source: CommandError,
    },
}

impl CliError {
    /// Classify a failed invocation by its stderr.
    pub fn classify(tool: &str, args: &[&str], output: &CommandOutput) -> Self {
        let message = output.stderr.trim().to_string();

        if ALREADY_EXISTS.is_match(&message) {
            CliError::AlreadyExists {
                tool: tool.to_string(),
                message,
            }
        } else if NOT_FOUND.is_match(&message) {
            CliError::NotFound {
                tool: tool.to_string(),
                message,
            }
        } else {
            CliError::Failed {
                tool: tool.to_string(),
                args: args.join(" "),
                status_code: output.status_code,
                message,
            }
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, CliError::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CliError::NotFound { .. })
    }
}
