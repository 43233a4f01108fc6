//! Manifests and chart settings the provisioner applies directly.

use crate::external::ReleaseSpec;

pub const INGRESS_REPO_NAME: &str = "ingress-nginx";
pub const INGRESS_REPO_URL: &str = "https://kubernetes.github.io/ingress-nginx";
pub const INGRESS_RELEASE: &str = "ingress-nginx";
pub const INGRESS_CHART: &str = "ingress-nginx/ingress-nginx";
pub const INGRESS_SERVICE: &str = "ingress-nginx-controller";

/// go-template yielding the first load-balancer IP, empty while pending
pub const LOAD_BALANCER_IP_TEMPLATE: &str =
    "{{range .status.loadBalancer.ingress}}{{if .ip}}{{.ip}}{{end}}{{end}}";

/// Daemonsets deployed by the monitoring addon, current name first
pub const MONITORING_DAEMONSETS: [&str; 2] = ["ama-logs", "omsagent"];

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by: aks-provision";

pub fn namespace_manifest(name: &str) -> String {
    format!(
        "apiVersion: v1\n\
         kind: Namespace\n\
         metadata:\n  \
           name: {name}\n  \
           labels:\n    \
             {MANAGED_BY_LABEL}\n"
    )
}

/// Controller release with a minimal resource profile
pub fn ingress_release(namespace: &str) -> ReleaseSpec {
    ReleaseSpec {
        release: INGRESS_RELEASE.to_string(),
        chart: INGRESS_CHART.to_string(),
        namespace: namespace.to_string(),
        values: [
            ("controller.resources.requests.cpu", "100m"),
            ("controller.resources.requests.memory", "90Mi"),
            ("controller.resources.limits.cpu", "200m"),
            ("controller.resources.limits.memory", "180Mi"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    }
}
