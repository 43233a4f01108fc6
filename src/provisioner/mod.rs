//! Provisioning sequence
//!
//! A one-shot, linear pass that brings an AKS environment to its desired
//! state. Every step checks current state before mutating so the whole
//! sequence can be re-run against a partially provisioned environment.
//! There is no rollback: a hard failure leaves whatever state was reached.

pub mod manifests;
pub mod poll;
pub mod types;

#[cfg(test)]
pub mod mocks;


pub use poll::{poll_until, PollOutcome, PollPolicy};
pub use types::{
    IpStatus, ProvisionContext, ProvisionError, ProvisionSummary, Step, StepOutcome, StepRecord,
};

use crate::config::ProvisionConfig;
use crate::external::{
    AzureCli, CliError, ClusterSpec, CommandError, CommandExecutor, HelmCli, KubectlCli,
};
use crate::report::Reporter;
use crate::shutdown::ShutdownSignal;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

/// Tools that must be on PATH, with the argument list used to probe them
pub const REQUIRED_TOOLS: [(&str, &[&str]); 3] = [
    ("az", &["version", "--output", "none"]),
    ("kubectl", &["version", "--client"]),
    ("helm", &["version", "--short"]),
];

pub struct Provisioner {
    config: ProvisionConfig,
    executor: Arc<dyn CommandExecutor>,
    azure: AzureCli,
    kubectl: KubectlCli,
    helm: HelmCli,
    reporter: Arc<dyn Reporter>,
    shutdown: ShutdownSignal,
}

impl Provisioner {
    pub fn new(
        config: ProvisionConfig,
        executor: Arc<dyn CommandExecutor>,
        reporter: Arc<dyn Reporter>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            azure: AzureCli::new(executor.clone()),
            kubectl: KubectlCli::new(executor.clone()),
            helm: HelmCli::new(executor.clone()),
            executor,
            config,
            reporter,
            shutdown,
        }
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Run the full provisioning sequence and report the summary.
    pub async fn run(&self, ctx: &mut ProvisionContext) -> Result<ProvisionSummary, ProvisionError> {
        let span = info_span!(
            "provision",
            run_id = %ctx.run_id,
            resource_group = %self.config.resource_group,
            cluster = %self.config.cluster_name,
        );

        let result = async {
            self.check_prerequisites(ctx).await?;
            self.checkpoint(ctx)?;
            let workspace_id = self.ensure_workspace(ctx).await?;
            self.checkpoint(ctx)?;
            self.ensure_cluster(ctx, &workspace_id).await?;
            self.checkpoint(ctx)?;
            self.fetch_credentials(ctx).await?;
            self.verify_connectivity(ctx).await?;
            self.verify_monitoring(ctx, Some(workspace_id.as_str())).await;
            self.checkpoint(ctx)?;
            self.apply_namespace(ctx).await?;
            self.checkpoint(ctx)?;
            self.apply_secrets(ctx).await?;
            self.checkpoint(ctx)?;
            self.ensure_ingress_controller(ctx).await?;
            self.poll_external_ip(ctx).await;
            self.finish(ctx)
        }
        .instrument(span)
        .await;

        match result {
            // Ctrl-C also reaches the child in flight, so its failure is the interrupt
            Err(e) if self.shutdown.is_cancelled() && !matches!(e, ProvisionError::Interrupted) => {
                warn!(error = %e, "step failed after interrupt");
                ctx.ip_status = IpStatus::Interrupted { attempts: 0 };
                self.finish(ctx)?;
                Err(ProvisionError::Interrupted)
            }
            other => other,
        }
    }

    /// Read-only pass over an already provisioned environment.
    pub async fn status(&self, ctx: &mut ProvisionContext) -> Result<ProvisionSummary, ProvisionError> {
        let span = info_span!("status", run_id = %ctx.run_id, cluster = %self.config.cluster_name);

        async {
            self.check_prerequisites(ctx).await?;
            self.verify_connectivity(ctx).await?;
            self.verify_monitoring(ctx, None).await;
            self.check_ingress_release(ctx).await;

            self.reporter.step("External IP");
            let ip = self.query_external_ip().await;
            ctx.ip_status = match ip {
                Some(ip) => {
                    self.reporter.success(&format!("External IP: {ip}"));
                    ctx.record(Step::ExternalIp, StepOutcome::Verified);
                    IpStatus::Assigned { ip, attempts: 1 }
                }
                None => {
                    self.reporter.warning("External IP not assigned yet");
                    ctx.record(
                        Step::ExternalIp,
                        StepOutcome::Degraded("no load balancer address".to_string()),
                    );
                    IpStatus::Pending { attempts: 1 }
                }
            };

            self.finish(ctx)
        }
        .instrument(span)
        .await
    }

    /// Stop before the next mutating step once an interrupt was requested.
    ///
    /// The partial summary is still reported; nothing is rolled back.
    fn checkpoint(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        if !self.shutdown.is_cancelled() {
            return Ok(());
        }

        warn!(run_id = %ctx.run_id, "interrupt observed between steps");
        self.reporter
            .warning("Interrupted, stopping before the next step; completed steps are kept");
        ctx.ip_status = IpStatus::Interrupted { attempts: 0 };
        self.finish(ctx)?;
        Err(ProvisionError::Interrupted)
    }

    /// Probe the required tools; abort before any cloud call if any are absent.
    pub async fn check_prerequisites(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        self.reporter.step("Checking prerequisites");

        let mut missing = Vec::new();
        for (tool, probe_args) in REQUIRED_TOOLS {
            match self.executor.execute(tool, probe_args).await {
                Err(CommandError::CommandNotFound { .. }) => {
                    self.reporter.error(&format!("{tool} is not installed"));
                    missing.push(tool.to_string());
                }
                // A failing version probe still proves the binary exists
                _ => self.reporter.info(&format!("{tool} found")),
            }
        }

        if !missing.is_empty() {
            let err = ProvisionError::MissingPrerequisites { tools: missing };
            self.reporter.error(&err.to_string());
            return Err(err);
        }

        match self.azure.account_name().await {
            Ok(account) if !account.is_empty() => {
                self.reporter.info(&format!("Azure subscription: {account}"));
            }
            _ => self
                .reporter
                .warning("Not logged in to Azure CLI; run 'az login' if the next steps fail"),
        }

        let defaults = self.config.default_credentials_in_use();
        if !defaults.is_empty() {
            self.reporter.warning(&format!(
                "Using built-in default credentials for {}",
                defaults.join(", ")
            ));
        }

        self.reporter.success("All prerequisites satisfied");
        ctx.record(Step::Prerequisites, StepOutcome::Verified);
        Ok(())
    }

    /// Create the resource group, treating "already exists" as success.
    async fn ensure_resource_group(&self) {
        let group = &self.config.resource_group;
        match self
            .azure
            .create_resource_group(group, &self.config.location)
            .await
        {
            Ok(()) => self.reporter.info(&format!("Resource group {group} ready")),
            Err(e) if e.is_already_exists() => {
                self.reporter.warning(&format!("Resource group {group} already exists"));
            }
            Err(e) => {
                // Downstream create calls surface a real problem with the group
                warn!(resource_group = %group, error = %e, "resource group create failed");
                self.reporter
                    .warning(&format!("Resource group {group} could not be created: {e}"));
            }
        }
    }

    /// Return the workspace resource id, creating the workspace when absent.
    pub async fn ensure_workspace(&self, ctx: &mut ProvisionContext) -> Result<String, ProvisionError> {
        let workspace = self.config.workspace_name();
        let group = &self.config.resource_group;
        self.reporter.step("Log Analytics workspace");

        let existing = self
            .azure
            .workspace_id(group, &workspace)
            .await
            .map_err(ProvisionError::step(Step::Workspace))
            .inspect_err(|e| self.reporter.error(&e.to_string()))?;

        let (id, outcome) = match existing {
            Some(id) => {
                self.reporter
                    .info(&format!("Workspace {workspace} already exists"));
                (id, StepOutcome::AlreadyPresent)
            }
            None => {
                self.ensure_resource_group().await;
                self.reporter.info(&format!(
                    "Creating workspace {workspace} ({} day retention)",
                    self.config.workspace_retention_days
                ));
                let id = self
                    .azure
                    .create_workspace(
                        group,
                        &workspace,
                        &self.config.location,
                        self.config.workspace_retention_days,
                    )
                    .await
                    .map_err(ProvisionError::step(Step::Workspace))
                    .inspect_err(|e| self.reporter.error(&e.to_string()))?;
                self.reporter.success(&format!("Workspace {workspace} created"));
                (id, StepOutcome::Created)
            }
        };

        info!(workspace = %workspace, workspace_id = %id, "workspace ready");
        ctx.workspace_id = Some(id.clone());
        ctx.record(Step::Workspace, outcome);
        Ok(id)
    }

    /// Create the cluster, or enable the monitoring addon on an existing one.
    pub async fn ensure_cluster(
        &self,
        ctx: &mut ProvisionContext,
        workspace_id: &str,
    ) -> Result<StepOutcome, ProvisionError> {
        let group = &self.config.resource_group;
        let cluster = &self.config.cluster_name;
        self.reporter.step("AKS cluster");

        let exists = self
            .azure
            .cluster_exists(group, cluster)
            .await
            .map_err(ProvisionError::step(Step::Cluster))
            .inspect_err(|e| self.reporter.error(&e.to_string()))?;

        let outcome = if exists {
            self.reporter.info(&format!(
                "Cluster {cluster} exists, enabling monitoring addon"
            ));
            match self
                .azure
                .enable_monitoring_addon(group, cluster, workspace_id)
                .await
            {
                Ok(()) => {
                    self.reporter.success("Monitoring addon enabled");
                    StepOutcome::Updated
                }
                Err(e) if e.is_already_exists() => {
                    self.reporter.warning("Monitoring addon already enabled");
                    StepOutcome::AlreadyPresent
                }
                Err(e) => {
                    warn!(cluster = %cluster, error = %e, "enable-addons failed");
                    self.reporter
                        .warning(&format!("Could not enable monitoring addon: {e}"));
                    StepOutcome::Degraded(addon_failure_reason(&e))
                }
            }
        } else {
            self.ensure_resource_group().await;
            self.reporter.info(&format!(
                "Creating cluster {cluster} ({} x {}), this can take several minutes",
                self.config.node_count, self.config.node_vm_size
            ));
            let spec = ClusterSpec {
                resource_group: group,
                name: cluster,
                location: &self.config.location,
                node_count: self.config.node_count,
                node_vm_size: &self.config.node_vm_size,
                workspace_id,
            };
            self.azure
                .create_cluster(&spec)
                .await
                .map_err(ProvisionError::step(Step::Cluster))
                .inspect_err(|e| self.reporter.error(&e.to_string()))?;
            self.reporter.success(&format!("Cluster {cluster} created"));
            StepOutcome::Created
        };

        ctx.record(Step::Cluster, outcome.clone());
        Ok(outcome)
    }

    pub async fn fetch_credentials(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        self.reporter.step("Cluster credentials");
        self.azure
            .get_credentials(&self.config.resource_group, &self.config.cluster_name)
            .await
            .map_err(ProvisionError::step(Step::Credentials))
            .inspect_err(|e| self.reporter.error(&e.to_string()))?;

        self.reporter.success("Credentials merged into kubeconfig");
        ctx.record(Step::Credentials, StepOutcome::Applied);
        Ok(())
    }

    pub async fn verify_connectivity(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        self.reporter.step("Cluster connectivity");
        match self.kubectl.cluster_info().await {
            Ok(_) => {
                self.reporter.success("Connected to cluster API server");
                ctx.record(Step::Connectivity, StepOutcome::Verified);
                Ok(())
            }
            Err(e) => {
                let err = ProvisionError::Connectivity {
                    message: e.to_string(),
                };
                self.reporter.error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Report workspace linkage and agent presence. Never fails the run.
    pub async fn verify_monitoring(&self, ctx: &mut ProvisionContext, expected_workspace: Option<&str>) {
        self.reporter.step("Monitoring verification");
        let mut problems = Vec::new();

        match self
            .azure
            .monitoring_workspace(&self.config.resource_group, &self.config.cluster_name)
            .await
        {
            Ok(Some(linked)) => {
                if expected_workspace.is_some_and(|expected| !expected.eq_ignore_ascii_case(&linked)) {
                    self.reporter
                        .warning(&format!("Monitoring addon reports to a different workspace: {linked}"));
                    problems.push("workspace mismatch");
                } else {
                    self.reporter.info(&format!("Monitoring linked to {linked}"));
                }
            }
            Ok(None) => {
                self.reporter.warning("Monitoring addon has no workspace configured");
                problems.push("addon not configured");
            }
            Err(e) => {
                self.reporter
                    .warning(&format!("Could not read monitoring addon configuration: {e}"));
                problems.push("addon config unreadable");
            }
        }

        match self.kubectl.daemonset_names("kube-system").await {
            Ok(names) => {
                match manifests::MONITORING_DAEMONSETS
                    .iter()
                    .find(|agent| names.iter().any(|name| name.as_str() == **agent))
                {
                    Some(agent) => self.reporter.info(&format!("Monitoring agent {agent} is deployed")),
                    None => {
                        self.reporter
                            .warning("Monitoring agent daemonset not found in kube-system");
                        problems.push("agent missing");
                    }
                }
            }
            Err(e) => {
                self.reporter.warning(&format!("Could not list daemonsets: {e}"));
                problems.push("daemonsets unreadable");
            }
        }

        let outcome = if problems.is_empty() {
            self.reporter.success("Monitoring verified");
            StepOutcome::Verified
        } else {
            StepOutcome::Degraded(problems.join(", "))
        };
        ctx.record(Step::Monitoring, outcome);
    }

    pub async fn apply_namespace(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let namespace = &self.config.app_namespace;
        self.reporter.step("Application namespace");
        self.kubectl
            .apply_manifest(&manifests::namespace_manifest(namespace))
            .await
            .map_err(ProvisionError::step(Step::Namespace))
            .inspect_err(|e| self.reporter.error(&e.to_string()))?;

        self.reporter.success(&format!("Namespace {namespace} applied"));
        ctx.record(Step::Namespace, StepOutcome::Applied);
        Ok(())
    }

    /// Upsert the application secret: render client-side, then apply.
    pub async fn apply_secrets(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let name = &self.config.secret_name;
        let namespace = &self.config.app_namespace;
        let pairs = self.config.secret_pairs();
        self.reporter.step("Application secrets");

        let manifest = self
            .kubectl
            .render_generic_secret(name, namespace, &pairs)
            .await
            .map_err(ProvisionError::step(Step::Secrets))
            .inspect_err(|e| self.reporter.error(&e.to_string()))?;

        self.kubectl
            .apply_manifest(&manifest)
            .await
            .map_err(ProvisionError::step(Step::Secrets))
            .inspect_err(|e| self.reporter.error(&e.to_string()))?;

        info!(secret = %name, namespace = %namespace, keys = pairs.len(), "secret applied");
        self.reporter
            .success(&format!("Secret {name} applied with {} keys", pairs.len()));
        ctx.record(Step::Secrets, StepOutcome::Applied);
        Ok(())
    }

    pub async fn ensure_ingress_controller(&self, ctx: &mut ProvisionContext) -> Result<StepOutcome, ProvisionError> {
        let namespace = &self.config.ingress_namespace;
        self.reporter.step("Ingress controller");

        match self
            .helm
            .add_repo(manifests::INGRESS_REPO_NAME, manifests::INGRESS_REPO_URL)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {
                self.reporter.warning("Chart repository already registered");
            }
            Err(e) => {
                let err = ProvisionError::StepFailed { step: Step::IngressController, source: e };
                self.reporter.error(&err.to_string());
                return Err(err);
            }
        }
        self.helm
            .update_repos()
            .await
            .map_err(ProvisionError::step(Step::IngressController))
            .inspect_err(|e| self.reporter.error(&e.to_string()))?;

        let releases = self
            .helm
            .list_releases(namespace)
            .await
            .map_err(ProvisionError::step(Step::IngressController))
            .inspect_err(|e| self.reporter.error(&e.to_string()))?;

        let outcome = if releases.iter().any(|r| r == manifests::INGRESS_RELEASE) {
            self.reporter.warning(&format!(
                "Release {} already installed, skipping",
                manifests::INGRESS_RELEASE
            ));
            StepOutcome::AlreadyPresent
        } else {
            self.reporter.info(&format!(
                "Installing {} into {namespace}",
                manifests::INGRESS_CHART
            ));
            match self.helm.install(&manifests::ingress_release(namespace)).await {
                Ok(()) => {
                    self.reporter.success("Ingress controller installed");
                    StepOutcome::Created
                }
                Err(e) if e.is_already_exists() => {
                    self.reporter.warning("Ingress controller release already in use");
                    StepOutcome::AlreadyPresent
                }
                Err(e) => {
                    let err = ProvisionError::StepFailed {
                        step: Step::IngressController,
                        source: e,
                    };
                    self.reporter.error(&err.to_string());
                    return Err(err);
                }
            }
        };

        ctx.record(Step::IngressController, outcome.clone());
        Ok(outcome)
    }

    /// Status-only variant of the release check: never installs.
    async fn check_ingress_release(&self, ctx: &mut ProvisionContext) {
        self.reporter.step("Ingress controller");
        let outcome = match self.helm.list_releases(&self.config.ingress_namespace).await {
            Ok(releases) if releases.iter().any(|r| r == manifests::INGRESS_RELEASE) => {
                self.reporter.success(&format!("Release {} installed", manifests::INGRESS_RELEASE));
                StepOutcome::Verified
            }
            Ok(_) => {
                self.reporter.warning("Ingress controller release not installed");
                StepOutcome::Degraded("release not installed".to_string())
            }
            Err(e) => {
                self.reporter.warning(&format!("Could not list helm releases: {e}"));
                StepOutcome::Degraded("releases unreadable".to_string())
            }
        };
        ctx.record(Step::IngressController, outcome);
    }

    async fn query_external_ip(&self) -> Option<String> {
        match self
            .kubectl
            .service_field(
                &self.config.ingress_namespace,
                manifests::INGRESS_SERVICE,
                manifests::LOAD_BALANCER_IP_TEMPLATE,
            )
            .await
        {
            Ok(ip) if !ip.is_empty() => Some(ip),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "external ip query failed");
                None
            }
        }
    }

    /// Wait for the load balancer address; degrades to pending, never fails.
    pub async fn poll_external_ip(&self, ctx: &mut ProvisionContext) -> IpStatus {
        self.reporter.step("External IP");
        let policy = PollPolicy::new(self.config.ip_poll_attempts, self.config.ip_poll_interval());
        self.reporter.info(&format!(
            "Waiting for load balancer address (up to {} attempts, {}s apart)",
            policy.max_attempts,
            policy.interval.as_secs()
        ));

        let max_attempts = policy.max_attempts;
        let outcome = poll_until(&policy, &self.shutdown, "external_ip", |attempt| async move {
            let ip = self.query_external_ip().await;
            if ip.is_none() {
                self.reporter.info(&format!(
                    "Attempt {attempt}/{max_attempts}: address not assigned yet"
                ));
            }
            ip
        })
        .await;

        let status = match outcome {
            PollOutcome::Ready { value, attempts } => {
                self.reporter.success(&format!("External IP: {value}"));
                ctx.record(Step::ExternalIp, StepOutcome::Verified);
                IpStatus::Assigned { ip: value, attempts }
            }
            PollOutcome::Exhausted { attempts } => {
                self.reporter.warning(&format!(
                    "External IP still pending after {attempts} attempts"
                ));
                ctx.record(
                    Step::ExternalIp,
                    StepOutcome::Degraded("address pending".to_string()),
                );
                IpStatus::Pending { attempts }
            }
            PollOutcome::Cancelled { attempts } => {
                self.reporter.warning("Interrupted while waiting for external IP");
                ctx.record(Step::ExternalIp, StepOutcome::Degraded("interrupted".to_string()));
                IpStatus::Interrupted { attempts }
            }
        };

        ctx.ip_status = status.clone();
        status
    }

    fn next_steps(&self, ip: &IpStatus) -> Vec<String> {
        let ns = &self.config.app_namespace;
        let ingress_ns = &self.config.ingress_namespace;
        let mut steps = vec![format!(
            "Deploy the services: kubectl apply -f {}/",
            self.config.manifests_dir.trim_end_matches('/')
        )];

        match ip.ip() {
            Some(ip) => steps.push(format!("Open http://{ip}/ once the services are running")),
            None => steps.push(format!(
                "Watch for the address: kubectl get service {} -n {ingress_ns} --watch",
                manifests::INGRESS_SERVICE
            )),
        }

        steps.push(format!("Check workloads: kubectl get pods -n {ns}"));
        steps.push(format!("Inspect a pod: kubectl describe pod <pod> -n {ns}"));
        steps.push(format!("Follow logs: kubectl logs -f deployment/<name> -n {ns}"));
        steps
    }

    /// Build and emit the final report. Has no side effects on the environment.
    fn finish(&self, ctx: &ProvisionContext) -> Result<ProvisionSummary, ProvisionError> {
        let summary = ProvisionSummary {
            run_id: ctx.run_id.clone(),
            started_at: ctx.started_at,
            finished_at: Utc::now(),
            resource_group: self.config.resource_group.clone(),
            location: self.config.location.clone(),
            cluster_name: self.config.cluster_name.clone(),
            workspace_name: self.config.workspace_name(),
            workspace_id: ctx.workspace_id.clone(),
            app_namespace: self.config.app_namespace.clone(),
            secret_name: self.config.secret_name.clone(),
            ingress_namespace: self.config.ingress_namespace.clone(),
            ingress_release: manifests::INGRESS_RELEASE.to_string(),
            external_ip: ctx.ip_status.clone(),
            steps: ctx.records.clone(),
            next_steps: self.next_steps(&ctx.ip_status),
        };

        if let Err(e) = self.reporter.summary(&summary) {
            warn!(error = %e, "failed to write summary");
        }

        if summary.interrupted() {
            return Err(ProvisionError::Interrupted);
        }
        Ok(summary)
    }
}

fn addon_failure_reason(err: &CliError) -> String {
    match err {
        CliError::Failed { status_code, .. } => format!("enable-addons exited with {status_code}"),
        CliError::NotFound { .. } => "workspace or cluster not found".to_string(),
        CliError::Command { .. } => "az could not be executed".to_string(),
        CliError::AlreadyExists { .. } => "already enabled".to_string(),
    }
}
