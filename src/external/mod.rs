//! External tool abstractions
//!
//! This module provides trait-based abstractions for the external CLI tools
//! the provisioner drives (`az`, `kubectl`, `helm`), enabling testable code
//! through dependency injection and scripted implementations.
//!
//! Decision making lives in the provisioner; everything here only builds
//! argument lists, runs them and classifies failures.

pub mod azure;
pub mod command;
pub mod error;
pub mod helm;
pub mod kubectl;

pub use azure::{AzureCli, ClusterSpec};
pub use command::{CommandError, CommandExecutor, CommandOutput, ProcessCommandExecutor};
pub use error::CliError;
pub use helm::{HelmCli, ReleaseSpec};
pub use kubectl::KubectlCli;
