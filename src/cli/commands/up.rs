use super::build_provisioner;
use crate::config::ProvisionConfig;
use crate::provisioner::ProvisionContext;
use crate::report::OutputFormat;
use crate::shutdown::ShutdownCoordinator;
use crate::telemetry::generate_run_id;
use anyhow::Result;
use tracing::info;

/// Full provisioning pass
pub struct UpCommand {
    config: ProvisionConfig,
    format: OutputFormat,
}

impl UpCommand {
    pub fn new(config: ProvisionConfig, format: OutputFormat) -> Self {
        Self { config, format }
    }

    pub async fn execute(self) -> Result<()> {
        let coordinator = ShutdownCoordinator::new();
        coordinator.install_signal_handlers();

        let provisioner = build_provisioner(self.config, self.format, coordinator.signal());
        let mut ctx = ProvisionContext::new(generate_run_id());
        info!(run_id = %ctx.run_id, "starting provisioning run");

        let summary = provisioner.run(&mut ctx).await?;
        info!(
            run_id = %summary.run_id,
            external_ip = summary.external_ip.ip().unwrap_or("pending"),
            "provisioning run complete"
        );
        Ok(())
    }
}
