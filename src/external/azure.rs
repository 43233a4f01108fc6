//! Azure CLI abstractions
//!
//! Wraps the handful of `az` invocations the provisioner needs: resource
//! groups, Log Analytics workspaces and AKS managed clusters.

use super::command::CommandExecutor;
use super::error::CliError;
use std::sync::Arc;

const AZ: &str = "az";

/// The addon profile key is stored as `omsagent` or `omsAgent` depending on
/// how the addon was enabled; JMESPath keys are case-sensitive.
const MONITORING_WORKSPACE_QUERY: &str = "addonProfiles.omsagent.config.logAnalyticsWorkspaceResourceID \
     || addonProfiles.omsAgent.config.logAnalyticsWorkspaceResourceID";

/// Parameters for a fresh `az aks create`
#[derive(Debug, Clone)]
pub struct ClusterSpec<'a> {
    pub resource_group: &'a str,
    pub name: &'a str,
    pub location: &'a str,
    pub node_count: u32,
    pub node_vm_size: &'a str,
    pub workspace_id: &'a str,
}

pub struct AzureCli {
    executor: Arc<dyn CommandExecutor>,
}

impl AzureCli {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn execute_az_command(&self, args: &[&str]) -> Result<String, CliError> {
        let output = self.executor.execute(AZ, args).await?;

        if !output.success() {
            return Err(CliError::classify(AZ, args, &output));
        }

        Ok(output.stdout.trim().to_string())
    }

    /// Name of the active subscription, if logged in
    pub async fn account_name(&self) -> Result<String, CliError> {
        self.execute_az_command(&["account", "show", "--query", "name", "-o", "tsv"])
            .await
    }

    pub async fn create_resource_group(&self, name: &str, location: &str) -> Result<(), CliError> {
        self.execute_az_command(&[
            "group", "create", "--name", name, "--location", location, "--output", "none",
        ])
        .await
        .map(|_| ())
    }

    /// Resource id of the workspace, `None` when it does not exist
    pub async fn workspace_id(
        &self,
        resource_group: &str,
        workspace: &str,
    ) -> Result<Option<String>, CliError> {
        let result = self
            .execute_az_command(&[
                "monitor",
                "log-analytics",
                "workspace",
                "show",
                "--resource-group",
                resource_group,
                "--workspace-name",
                workspace,
                "--query",
                "id",
                "-o",
                "tsv",
            ])
            .await;

        match result {
            Ok(id) if id.is_empty() => Ok(None),
            Ok(id) => Ok(Some(id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_workspace(
        &self,
        resource_group: &str,
        workspace: &str,
        location: &str,
        retention_days: u32,
    ) -> Result<String, CliError> {
        let retention = retention_days.to_string();
        self.execute_az_command(&[
            "monitor",
            "log-analytics",
            "workspace",
            "create",
            "--resource-group",
            resource_group,
            "--workspace-name",
            workspace,
            "--location",
            location,
            "--retention-time",
            &retention,
            "--query",
            "id",
            "-o",
            "tsv",
        ])
        .await
    }

    pub async fn cluster_exists(&self, resource_group: &str, name: &str) -> Result<bool, CliError> {
        let result = self
            .execute_az_command(&[
                "aks",
                "show",
                "--resource-group",
                resource_group,
                "--name",
                name,
                "--query",
                "name",
                "-o",
                "tsv",
            ])
            .await;

        match result {
            Ok(found) => Ok(!found.is_empty()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn create_cluster(&self, spec: &ClusterSpec<'_>) -> Result<(), CliError> {
        let node_count = spec.node_count.to_string();
        self.execute_az_command(&[
            "aks",
            "create",
            "--resource-group",
            spec.resource_group,
            "--name",
            spec.name,
            "--location",
            spec.location,
            "--node-count",
            &node_count,
            "--node-vm-size",
            spec.node_vm_size,
            "--enable-managed-identity",
            "--generate-ssh-keys",
            "--enable-addons",
            "monitoring",
            "--workspace-resource-id",
            spec.workspace_id,
            "--output",
            "none",
        ])
        .await
        .map(|_| ())
    }

    pub async fn enable_monitoring_addon(
        &self,
        resource_group: &str,
        name: &str,
        workspace_id: &str,
    ) -> Result<(), CliError> {
        self.execute_az_command(&[
            "aks",
            "enable-addons",
            "--resource-group",
            resource_group,
            "--name",
            name,
            "--addons",
            "monitoring",
            "--workspace-resource-id",
            workspace_id,
            "--output",
            "none",
        ])
        .await
        .map(|_| ())
    }

    /// Merge cluster credentials into the local kubeconfig, replacing stale entries
    pub async fn get_credentials(&self, resource_group: &str, name: &str) -> Result<(), CliError> {
        self.execute_az_command(&[
            "aks",
            "get-credentials",
            "--resource-group",
            resource_group,
            "--name",
            name,
            "--overwrite-existing",
        ])
        .await
        .map(|_| ())
    }

    /// Workspace the monitoring addon currently reports to
    pub async fn monitoring_workspace(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<String>, CliError> {
        let id = self
            .execute_az_command(&[
                "aks",
                "show",
                "--resource-group",
                resource_group,
                "--name",
                name,
                "--query",
                MONITORING_WORKSPACE_QUERY,
                "-o",
                "tsv",
            ])
            .await?;

        Ok(if id.is_empty() { None } else { Some(id) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::CommandOutput;
    use crate::provisioner::mocks::FakeCloud;

    #[test]
    fn test_missing_workspace_maps_to_none() {
        tokio_test::block_on(async {
            let azure = AzureCli::new(Arc::new(FakeCloud::fresh()));
            let id = azure.workspace_id("rg", "logs").await.unwrap();
            assert_eq!(id, None);
        });
    }

    #[test]
    fn test_cluster_lookup_propagates_unexpected_errors() {
        tokio_test::block_on(async {
            let cloud = FakeCloud::fresh().with(|s| {
                s.overrides.push((
                    "az aks show".to_string(),
                    CommandOutput::failed(1, "ERROR: Please run 'az login' to setup account."),
                ))
            });
            let azure = AzureCli::new(Arc::new(cloud));

            let err = azure.cluster_exists("rg", "aks").await.unwrap_err();
            assert!(!err.is_not_found());
        });
    }

    #[test]
    fn test_monitoring_workspace_queries_both_addon_key_spellings() {
        tokio_test::block_on(async {
            let cloud = Arc::new(FakeCloud::provisioned("rg", "aks", "logs", "ingress-nginx"));
            let azure = AzureCli::new(cloud.clone());

            let linked = azure.monitoring_workspace("rg", "aks").await.unwrap();
            assert!(linked.is_some());

            let calls = cloud.calls();
            let query = calls.iter().find(|c| c.contains("logAnalyticsWorkspaceResourceID")).unwrap();
            assert!(query.contains("addonProfiles.omsagent.config.logAnalyticsWorkspaceResourceID"));
            assert!(query.contains("addonProfiles.omsAgent.config.logAnalyticsWorkspaceResourceID"));
        });
    }

    #[test]
    fn test_create_cluster_links_workspace() {
        tokio_test::block_on(async {
            let cloud = Arc::new(FakeCloud::fresh().with(|s| {
                s.resource_groups.insert("rg".to_string());
            }));
            let azure = AzureCli::new(cloud.clone());
            let spec = ClusterSpec {
                resource_group: "rg",
                name: "aks",
                location: "eastus",
                node_count: 2,
                node_vm_size: "Standard_B2s",
                workspace_id: "/ws/id",
            };

            azure.create_cluster(&spec).await.unwrap();

            let calls = cloud.calls();
            let create = calls.iter().find(|c| c.starts_with("az aks create")).unwrap();
            assert!(create.contains("--node-count 2"));
            assert!(create.contains("--enable-addons monitoring --workspace-resource-id /ws/id"));
            assert_eq!(
                azure.monitoring_workspace("rg", "aks").await.unwrap().as_deref(),
                Some("/ws/id")
            );
        });
    }
}
