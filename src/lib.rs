// AKS Provisioner Library - idempotent cluster bring-up over az, kubectl and helm
// This exposes the core components for testing and integration

pub mod cli;
pub mod config;
pub mod external;
pub mod provisioner;
pub mod report;
pub mod shutdown;
pub mod telemetry;

// Re-export key types for easy access
pub use config::ProvisionConfig;
pub use external::{CliError, CommandExecutor, ProcessCommandExecutor};
pub use provisioner::{IpStatus, ProvisionContext, ProvisionError, ProvisionSummary, Provisioner};
pub use report::{ConsoleReporter, OutputFormat, Reporter};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
pub use telemetry::{generate_run_id, init_telemetry};
