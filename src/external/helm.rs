//! Helm abstractions

use super::command::CommandExecutor;
use super::error::CliError;
use std::sync::Arc;

const HELM: &str = "helm";

/// A chart installation with resource overrides passed as `--set`
#[derive(Debug, Clone)]
pub struct ReleaseSpec {
    pub release: String,
    pub chart: String,
    pub namespace: String,
    pub values: Vec<(String, String)>,
}

pub struct HelmCli {
    executor: Arc<dyn CommandExecutor>,
}

impl HelmCli {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn execute_helm_command(&self, args: &[&str]) -> Result<String, CliError> {
        let output = self.executor.execute(HELM, args).await?;

        if !output.success() {
            return Err(CliError::classify(HELM, args, &output));
        }

        Ok(output.stdout.trim().to_string())
    }

    /// Register a chart repository, updating its URL if it already exists
    pub async fn add_repo(&self, name: &str, url: &str) -> Result<(), CliError> {
        self.execute_helm_command(&["repo", "add", name, url, "--force-update"])
            .await
            .map(|_| ())
    }

    pub async fn update_repos(&self) -> Result<(), CliError> {
        self.execute_helm_command(&["repo", "update"]).await.map(|_| ())
    }

    /// Release names installed in `namespace`
    pub async fn list_releases(&self, namespace: &str) -> Result<Vec<String>, CliError> {
        let output = self
            .execute_helm_command(&["list", "--namespace", namespace, "--short"])
            .await?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn install(&self, spec: &ReleaseSpec) -> Result<(), CliError> {
        let overrides: Vec<String> = spec
            .values
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();

        let mut args = vec![
            "install",
            spec.release.as_str(),
            spec.chart.as_str(),
            "--namespace",
            spec.namespace.as_str(),
            "--create-namespace",
        ];
        for value in &overrides {
            args.push("--set");
            args.push(value.as_str());
        }

        self.execute_helm_command(&args).await.map(|_| ())
    }
}
