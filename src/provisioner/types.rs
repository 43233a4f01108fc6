use crate::external::CliError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Ordered provisioning steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Prerequisites,
    Workspace,
    Cluster,
    Credentials,
    Connectivity,
    Monitoring,
    Namespace,
    Secrets,
    IngressController,
    ExternalIp,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Prerequisites => "prerequisites",
            Step::Workspace => "log analytics workspace",
            Step::Cluster => "managed cluster",
            Step::Credentials => "cluster credentials",
            Step::Connectivity => "cluster connectivity",
            Step::Monitoring => "monitoring addon",
            Step::Namespace => "namespace",
            Step::Secrets => "application secrets",
            Step::IngressController => "ingress controller",
            Step::ExternalIp => "external ip",
        };
        f.write_str(name)
    }
}

/// What a step did to reach its desired state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Created,
    /// An existing resource was patched (e.g. addon enabled)
    Updated,
    AlreadyPresent,
    /// Declarative apply, no existence check involved
    Applied,
    Verified,
    Skipped(String),
    /// Soft failure; the sequence continued
    Degraded(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: Step,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpStatus {
    Assigned { ip: String, attempts: u32 },
    Pending { attempts: u32 },
    Interrupted { attempts: u32 },
    /// Status pass without a poll, or sequence aborted before it
    NotChecked,
}

impl IpStatus {
    pub fn ip(&self) -> Option<&str> {
        match self {
            IpStatus::Assigned { ip, .. } => Some(ip),
            _ => None,
        }
    }
}

/// Values threaded between steps during a run
#[derive(Debug, Clone)]
pub struct ProvisionContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub workspace_id: Option<String>,
    pub ip_status: IpStatus,
    pub records: Vec<StepRecord>,
}

impl ProvisionContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            workspace_id: None,
            ip_status: IpStatus::NotChecked,
            records: Vec::new(),
        }
    }

    pub fn record(&mut self, step: Step, outcome: StepOutcome) {
        self.records.push(StepRecord { step, outcome });
    }

    pub fn outcome_of(&self, step: Step) -> Option<&StepOutcome> {
        self.records
            .iter()
            .rev()
            .find(|record| record.step == step)
            .map(|record| &record.outcome)
    }
}

/// Final report of a run
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub resource_group: String,
    pub location: String,
    pub cluster_name: String,
    pub workspace_name: String,
    pub workspace_id: Option<String>,
    pub app_namespace: String,
    pub secret_name: String,
    pub ingress_namespace: String,
    pub ingress_release: String,
    pub external_ip: IpStatus,
    pub steps: Vec<StepRecord>,
    pub next_steps: Vec<String>,
}

impl ProvisionSummary {
    pub fn interrupted(&self) -> bool {
        matches!(self.external_ip, IpStatus::Interrupted { .. })
    }
}

/// Hard failures that abort the sequence
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("missing required tools: {}", tools.join(", "))]
    MissingPrerequisites { tools: Vec<String> },
    #[error("{step} failed: {source}")]
    StepFailed {
        step: Step,
        #[source]
        source: CliError,
    },
    #[error("cannot reach the cluster API server: {message}")]
    Connectivity { message: String },
    #[error("provisioning interrupted")]
    Interrupted,
}

impl ProvisionError {
    pub fn step(step: Step) -> impl FnOnce(CliError) -> Self {
        move |source| ProvisionError::StepFailed { step, source }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            ProvisionError::Interrupted => 130,
            _ => 1,
        }
    }
}
