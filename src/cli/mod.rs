use crate::report::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "aks-provision")]
#[command(version)]
#[command(about = "Provision an AKS cluster with monitoring, secrets and an ingress controller")]
#[command(long_about = "Brings an Azure Kubernetes Service environment to its desired state by driving \
                       the az, kubectl and helm CLIs. Every step checks what already exists, so the \
                       command can be re-run safely. Running without a subcommand is the same as 'up'.")]
pub struct Cli {
    /// Configuration file (defaults to ./aks-provision.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full provisioning sequence (default)
    Up {
        /// Output format for the final summary
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Check that az, kubectl and helm are installed and the Azure login is usable
    Preflight,
    /// Report the state of an existing environment without changing it
    Status {
        /// Output format for the final summary
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the effective configuration after files and environment are merged
    ShowConfig {
        /// Print credentials instead of masking them
        #[arg(long, help = "Show secret values in plain text")]
        reveal_secrets: bool,
    },
}
