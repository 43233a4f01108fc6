use aks_provisioner::cli::commands::{
    already_reported, exit_code_for, PreflightCommand, ShowConfigCommand, StatusCommand, UpCommand,
};
use aks_provisioner::cli::{Cli, Commands};
use aks_provisioner::config::ProvisionConfig;
use aks_provisioner::report::OutputFormat;
use aks_provisioner::telemetry::init_telemetry;
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_file_loaded = match ProvisionConfig::load_env_file() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{} failed to load .env: {e:#}", "[ERROR]".red().bold());
            return ExitCode::FAILURE;
        }
    };

    let config = match ProvisionConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e:#}", "[ERROR]".red().bold());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_telemetry(&config.log_level, &config.log_format) {
        eprintln!("{} {e:#}", "[ERROR]".red().bold());
        return ExitCode::FAILURE;
    }
    if env_file_loaded {
        tracing::info!("Loaded environment variables from .env file");
    }

    let result = match cli.command.unwrap_or(Commands::Up {
        format: OutputFormat::Text,
    }) {
        Commands::Up { format } => UpCommand::new(config, format).execute().await,
        Commands::Preflight => PreflightCommand::new(config).execute().await,
        Commands::Status { format } => StatusCommand::new(config, format).execute().await,
        Commands::ShowConfig { reveal_secrets } => {
            ShowConfigCommand::new(config, reveal_secrets).execute()
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !already_reported(&e) {
                eprintln!("{} {e:#}", "[ERROR]".red().bold());
            }
            tracing::debug!(error = ?e, "command failed");
            ExitCode::from(exit_code_for(&e))
        }
    }
}
