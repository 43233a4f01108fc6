use super::build_provisioner;
use crate::config::ProvisionConfig;
use crate::provisioner::ProvisionContext;
use crate::report::OutputFormat;
use crate::shutdown::ShutdownSignal;
use crate::telemetry::generate_run_id;
use anyhow::Result;

/// Tool and login checks only; touches no cloud resources
pub struct PreflightCommand {
    config: ProvisionConfig,
}

impl PreflightCommand {
    pub fn new(config: ProvisionConfig) -> Self {
        Self { config }
    }

    pub async fn execute(self) -> Result<()> {
        let provisioner = build_provisioner(self.config, OutputFormat::Text, ShutdownSignal::never());
        let mut ctx = ProvisionContext::new(generate_run_id());
        provisioner.check_prerequisites(&mut ctx).await?;

        let config = provisioner.config();
        println!();
        println!(
            "Ready to provision cluster {} in resource group {} ({})",
            config.cluster_name, config.resource_group, config.location
        );
        Ok(())
    }
}
