use super::build_provisioner;
use crate::config::ProvisionConfig;
use crate::provisioner::ProvisionContext;
use crate::report::OutputFormat;
use crate::shutdown::ShutdownSignal;
use crate::telemetry::generate_run_id;
use anyhow::Result;

/// Read-only report on an existing environment
pub struct StatusCommand {
    config: ProvisionConfig,
    format: OutputFormat,
}

impl StatusCommand {
    pub fn new(config: ProvisionConfig, format: OutputFormat) -> Self {
        Self { config, format }
    }

    pub async fn execute(self) -> Result<()> {
        // A single IP query, nothing to interrupt
        let provisioner = build_provisioner(self.config, self.format, ShutdownSignal::never());
        let mut ctx = ProvisionContext::new(generate_run_id());
        provisioner.status(&mut ctx).await?;
        Ok(())
    }
}
