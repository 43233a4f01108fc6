//! kubectl abstractions

use super::command::CommandExecutor;
use super::error::CliError;
use std::sync::Arc;

const KUBECTL: &str = "kubectl";

pub struct KubectlCli {
    executor: Arc<dyn CommandExecutor>,
}

impl KubectlCli {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn execute_kubectl_command(&self, args: &[&str]) -> Result<String, CliError> {
        let output = self.executor.execute(KUBECTL, args).await?;

        if !output.success() {
            return Err(CliError::classify(KUBECTL, args, &output));
        }

        Ok(output.stdout.trim().to_string())
    }

    pub async fn cluster_info(&self) -> Result<String, CliError> {
        self.execute_kubectl_command(&["cluster-info"]).await
    }

    /// `kubectl apply -f -` with the manifest on stdin
    pub async fn apply_manifest(&self, manifest: &str) -> Result<String, CliError> {
        let args = ["apply", "-f", "-"];
        let output = self
            .executor
            .execute_with_input(KUBECTL, &args, manifest)
            .await?;

        if !output.success() {
            return Err(CliError::classify(KUBECTL, &args, &output));
        }

        Ok(output.stdout.trim().to_string())
    }

    /// Render a generic secret client-side without touching the cluster.
    pub async fn render_generic_secret(
        &self,
        name: &str,
        namespace: &str,
        pairs: &[(String, String)],
    ) -> Result<String, CliError> {
        let literals: Vec<String> = pairs
            .iter()
            .map(|(key, value)| format!("--from-literal={key}={value}"))
            .collect();

        let mut args = vec!["create", "secret", "generic", name, "--namespace", namespace];
        args.extend(literals.iter().map(String::as_str));
        args.extend(["--dry-run=client", "-o", "yaml"]);

        let output = self.executor.execute(KUBECTL, &args).await?;
        if !output.success() {
            // Never echo the literals back in the error
            return Err(CliError::classify(
                KUBECTL,
                &["create", "secret", "generic", name, "--dry-run=client"],
                &output,
            ));
        }

        Ok(output.stdout)
    }

    /// Extract a field from a service with a go-template
    pub async fn service_field(
        &self,
        namespace: &str,
        service: &str,
        template: &str,
    ) -> Result<String, CliError> {
        let template_arg = format!("go-template={template}");
        self.execute_kubectl_command(&["get", "service", service, "-n", namespace, "-o", &template_arg])
            .await
    }

    pub async fn daemonset_names(&self, namespace: &str) -> Result<Vec<String>, CliError> {
        let output = self
            .execute_kubectl_command(&["get", "daemonset", "-n", namespace, "-o", "name"])
            .await?;

        Ok(output
            .lines()
            .map(|line| line.trim().trim_start_matches("daemonset.apps/").to_string())
            .filter(|name| !name.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::CommandOutput;
    use crate::provisioner::mocks::FakeCloud;

    #[test]
    fn test_secret_render_failure_hides_literals() {
        tokio_test::block_on(async {
            let cloud = FakeCloud::fresh().with(|s| {
                s.overrides.push((
                    "kubectl create secret".to_string(),
                    CommandOutput::failed(1, "error: failed to create secret"),
                ))
            });
            let kubectl = KubectlCli::new(Arc::new(cloud));
            let pairs = vec![("redis-password".to_string(), "hunter2".to_string())];

            let err = kubectl
                .render_generic_secret("app-secrets", "app", &pairs)
                .await
                .unwrap_err();
            assert!(!format!("{err:?}").contains("hunter2"));
        });
    }

    #[test]
    fn test_daemonset_names_strip_kind_prefix() {
        tokio_test::block_on(async {
            let cloud = FakeCloud::fresh().with(|s| s.daemonsets = vec!["ama-logs".to_string(), "kube-proxy".to_string()]);
            let kubectl = KubectlCli::new(Arc::new(cloud));

            let names = kubectl.daemonset_names("kube-system").await.unwrap();
            assert_eq!(names, vec!["ama-logs", "kube-proxy"]);
        });
    }
}
