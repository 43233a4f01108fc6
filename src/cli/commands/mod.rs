use crate::config::ProvisionConfig;
use crate::external::ProcessCommandExecutor;
use crate::provisioner::{ProvisionError, Provisioner};
use crate::report::{ConsoleReporter, OutputFormat};
use crate::shutdown::ShutdownSignal;
use std::sync::Arc;

pub mod preflight;
pub mod show_config;
pub mod status;
pub mod up;

pub use preflight::PreflightCommand;
pub use show_config::ShowConfigCommand;
pub use status::StatusCommand;
pub use up::UpCommand;

/// Wire the provisioner to the real CLIs and the terminal.
pub fn build_provisioner(
    config: ProvisionConfig,
    format: OutputFormat,
    shutdown: ShutdownSignal,
) -> Provisioner {
    Provisioner::new(
        config,
        Arc::new(ProcessCommandExecutor),
        Arc::new(ConsoleReporter::new(format)),
        shutdown,
    )
}

/// Process exit status for a command error: 130 when interrupted, 1 otherwise.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<ProvisionError>()
        .map(ProvisionError::exit_code)
        .unwrap_or(1)
}

/// Errors whose details the reporter has already printed
pub fn already_reported(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ProvisionError>().is_some()
}
