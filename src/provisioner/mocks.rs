// In-memory stand-ins for az/kubectl/helm - no side effects

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::external::{CommandError, CommandExecutor, CommandOutput};
use crate::provisioner::ProvisionSummary;
use crate::report::Reporter;

pub const FAKE_IP: &str = "20.81.10.5";

#[derive(Debug, Default)]
pub struct FakeState {
    pub missing_tools: HashSet<String>,
    pub logged_in: bool,
    pub resource_groups: HashSet<String>,
    pub workspaces: HashMap<(String, String), String>,
    pub clusters: HashSet<(String, String)>,
    pub addon_workspace: HashMap<String, String>,
    pub credentials_fetched: bool,
    pub api_unreachable: bool,
    pub daemonsets: Vec<String>,
    pub namespaces: HashSet<String>,
    pub secrets: HashMap<(String, String), BTreeMap<String, String>>,
    pub helm_repos: HashSet<String>,
    pub releases: HashMap<String, Vec<String>>,
    /// IP appears on this service query (1-based); never when `None`
    pub ip_on_query: Option<u32>,
    pub ip_queries: u32,
    /// Canned responses for calls starting with the given prefix
    pub overrides: Vec<(String, CommandOutput)>,
    pub calls: Vec<String>,
}

/// Scripted cloud + cluster that interprets the CLI invocations it receives
#[derive(Debug, Default)]
pub struct FakeCloud {
    pub state: Mutex<FakeState>,
}

fn flag<'a>(args: &[&'a str], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| *a == name)
        .and_then(|i| args.get(i + 1).copied())
}

fn not_found(what: &str) -> CommandOutput {
    CommandOutput::failed(3, format!("(ResourceNotFound) The Resource '{what}' was not found."))
}

pub fn workspace_resource_id(group: &str, workspace: &str) -> String {
    format!(
        "/subscriptions/0000/resourceGroups/{group}/providers/Microsoft.OperationalInsights/workspaces/{workspace}"
    )
}

impl FakeCloud {
    /// Fresh subscription: tools installed, logged in, nothing provisioned
    pub fn fresh() -> Self {
        let cloud = Self::default();
        cloud.state.lock().unwrap().logged_in = true;
        cloud
    }

    /// Environment where every resource the provisioner manages exists
    pub fn provisioned(group: &str, cluster: &str, workspace: &str, ingress_ns: &str) -> Self {
        let cloud = Self::fresh();
        {
            let mut s = cloud.state.lock().unwrap();
            let id = workspace_resource_id(group, workspace);
            s.resource_groups.insert(group.to_string());
            s.workspaces
                .insert((group.to_string(), workspace.to_string()), id.clone());
            s.clusters.insert((group.to_string(), cluster.to_string()));
            s.addon_workspace.insert(cluster.to_string(), id);
            s.daemonsets.push("ama-logs".to_string());
            s.helm_repos.insert("ingress-nginx".to_string());
            s.releases
                .insert(ingress_ns.to_string(), vec!["ingress-nginx".to_string()]);
            s.ip_on_query = Some(1);
        }
        cloud
    }

    pub fn with<F: FnOnce(&mut FakeState)>(self, f: F) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<BTreeMap<String, String>> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn dispatch(&self, program: &str, args: &[&str], input: Option<&str>) -> Result<CommandOutput, CommandError> {
        let mut s = self.state.lock().unwrap();
        let line = format!("{} {}", program, args.join(" "));
        s.calls.push(line.clone());

        if s.missing_tools.contains(program) {
            return Err(CommandError::CommandNotFound {
                command: program.to_string(),
            });
        }
        if let Some((_, output)) = s.overrides.iter().find(|(prefix, _)| line.starts_with(prefix)) {
            return Ok(output.clone());
        }

        let output = match (program, args) {
            (_, ["version", ..]) => CommandOutput::ok("v1.0.0"),
            ("az", ["account", "show", ..]) => {
                if s.logged_in {
                    CommandOutput::ok("Demo Subscription\n")
                } else {
                    CommandOutput::failed(1, "Please run 'az login' to setup account.")
                }
            }
            ("az", ["group", "create", ..]) => {
                let name = flag(args, "--name").unwrap_or_default().to_string();
                s.resource_groups.insert(name);
                CommandOutput::ok("")
            }
            ("az", ["monitor", "log-analytics", "workspace", verb, ..]) => {
                let group = flag(args, "--resource-group").unwrap_or_default().to_string();
                let name = flag(args, "--workspace-name").unwrap_or_default().to_string();
                match *verb {
                    "show" => match s.workspaces.get(&(group, name.clone())) {
                        Some(id) => CommandOutput::ok(format!("{id}\n")),
                        None => not_found(&format!("Microsoft.OperationalInsights/workspaces/{name}")),
                    },
                    "create" => {
                        if !s.resource_groups.contains(&group) {
                            CommandOutput::failed(
                                3,
                                format!("(ResourceGroupNotFound) Resource group '{group}' could not be found."),
                            )
                        } else {
                            let id = workspace_resource_id(&group, &name);
                            s.workspaces.insert((group, name), id.clone());
                            CommandOutput::ok(format!("{id}\n"))
                        }
                    }
                    _ => CommandOutput::failed(2, "unsupported workspace verb"),
                }
            }
            ("az", ["aks", verb, ..]) => {
                let group = flag(args, "--resource-group").unwrap_or_default().to_string();
                let name = flag(args, "--name").unwrap_or_default().to_string();
                let exists = s.clusters.contains(&(group.clone(), name.clone()));
                let missing = not_found(&format!("Microsoft.ContainerService/managedClusters/{name}"));
                match *verb {
                    "show" if !exists => missing,
                    "show" if flag(args, "--query") == Some("name") => CommandOutput::ok(format!("{name}\n")),
                    "show" => CommandOutput::ok(s.addon_workspace.get(&name).cloned().unwrap_or_default()),
                    "create" => {
                        if !s.resource_groups.contains(&group) {
                            CommandOutput::failed(
                                3,
                                format!("(ResourceGroupNotFound) Resource group '{group}' could not be found."),
                            )
                        } else {
                            let workspace = flag(args, "--workspace-resource-id").unwrap_or_default().to_string();
                            s.clusters.insert((group, name.clone()));
                            s.addon_workspace.insert(name, workspace);
                            s.daemonsets.push("ama-logs".to_string());
                            CommandOutput::ok("")
                        }
                    }
                    "enable-addons" if !exists => missing,
                    "enable-addons" => {
                        if s.addon_workspace.contains_key(&name) {
                            CommandOutput::failed(
                                1,
                                "ERROR: The addon \"monitoring\" is already enabled for this managed cluster.",
                            )
                        } else {
                            let workspace = flag(args, "--workspace-resource-id").unwrap_or_default().to_string();
                            s.addon_workspace.insert(name, workspace);
                            s.daemonsets.push("ama-logs".to_string());
                            CommandOutput::ok("")
                        }
                    }
                    "get-credentials" if !exists => missing,
                    "get-credentials" => {
                        s.credentials_fetched = true;
                        CommandOutput::ok(format!("Merged \"{name}\" as current context"))
                    }
                    _ => CommandOutput::failed(2, "unsupported aks verb"),
                }
            }
            ("kubectl", ["cluster-info"]) => {
                if s.credentials_fetched && !s.api_unreachable {
                    CommandOutput::ok("Kubernetes control plane is running at https://aks.example:443")
                } else {
                    CommandOutput::failed(1, "Unable to connect to the server: dial tcp: i/o timeout")
                }
            }
            ("kubectl", ["get", "daemonset", ..]) => CommandOutput::ok(
                s.daemonsets
                    .iter()
                    .map(|d| format!("daemonset.apps/{d}\n"))
                    .collect::<String>(),
            ),
            ("kubectl", ["create", "secret", "generic", name, ..]) => {
                let namespace = flag(args, "--namespace").unwrap_or("default");
                let mut yaml = format!(
                    "apiVersion: v1\nkind: Secret\nmetadata:\n  name: {name}\n  namespace: {namespace}\ndata:\n"
                );
                for literal in args.iter().filter_map(|a| a.strip_prefix("--from-literal=")) {
                    if let Some((key, value)) = literal.split_once('=') {
                        yaml.push_str(&format!("  {key}: {value}\n"));
                    }
                }
                CommandOutput::ok(yaml)
            }
            ("kubectl", ["apply", "-f", "-"]) => apply(&mut s, input.unwrap_or_default()),
            ("kubectl", ["get", "service", _, "-n", namespace, ..]) => {
                let installed = s
                    .releases
                    .get(*namespace)
                    .is_some_and(|r| r.iter().any(|r| r == "ingress-nginx"));
                if !installed {
                    CommandOutput::failed(1, "Error from server (NotFound): services \"ingress-nginx-controller\" not found")
                } else {
                    s.ip_queries += 1;
                    let queries = s.ip_queries;
                    match s.ip_on_query {
                        Some(n) if queries >= n => CommandOutput::ok(FAKE_IP),
                        _ => CommandOutput::ok(""),
                    }
                }
            }
            ("helm", ["repo", "add", name, ..]) => {
                s.helm_repos.insert(name.to_string());
                CommandOutput::ok(format!("\"{name}\" has been added to your repositories"))
            }
            ("helm", ["repo", "update"]) => CommandOutput::ok("Update Complete."),
            ("helm", ["list", ..]) => {
                let namespace = flag(args, "--namespace").unwrap_or("default");
                CommandOutput::ok(s.releases.get(namespace).cloned().unwrap_or_default().join("\n"))
            }
            ("helm", ["install", release, ..]) => {
                let namespace = flag(args, "--namespace").unwrap_or("default").to_string();
                let releases = s.releases.entry(namespace).or_default();
                if releases.iter().any(|r| r == *release) {
                    CommandOutput::failed(1, "Error: INSTALLATION FAILED: cannot re-use a name that is still in use")
                } else {
                    releases.push(release.to_string());
                    CommandOutput::ok("STATUS: deployed")
                }
            }
            _ => CommandOutput::failed(127, format!("unexpected invocation: {line}")),
        };

        Ok(output)
    }
}

fn apply(s: &mut FakeState, manifest: &str) -> CommandOutput {
    let field = |key: &str| {
        manifest
            .lines()
            .find_map(|l| l.trim().strip_prefix(key))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };
    let kind = field("kind:");
    let name = field("name:");

    match kind.as_str() {
        "Namespace" => {
            let created = s.namespaces.insert(name.clone());
            CommandOutput::ok(format!(
                "namespace/{name} {}",
                if created { "created" } else { "unchanged" }
            ))
        }
        "Secret" => {
            let namespace = field("namespace:");
            if !s.namespaces.contains(&namespace) {
                return CommandOutput::failed(
                    1,
                    format!("Error from server (NotFound): namespaces \"{namespace}\" not found"),
                );
            }
            let data: BTreeMap<String, String> = manifest
                .split_once("\ndata:\n")
                .map(|(_, rest)| rest)
                .unwrap_or_default()
                .lines()
                .filter_map(|l| l.trim().split_once(": "))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let existed = s.secrets.insert((namespace, name.clone()), data).is_some();
            CommandOutput::ok(format!(
                "secret/{name} {}",
                if existed { "configured" } else { "created" }
            ))
        }
        other => CommandOutput::failed(1, format!("error: unknown kind {other}")),
    }
}

#[async_trait]
impl CommandExecutor for FakeCloud {
    async fn execute(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        self.dispatch(program, args, None)
    }

    async fn execute_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
    ) -> Result<CommandOutput, CommandError> {
        self.dispatch(program, args, Some(input))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Step(String),
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
}

/// Reporter that keeps every line for later assertions
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub lines: Mutex<Vec<Line>>,
    pub summaries: Mutex<Vec<ProvisionSummary>>,
}

impl RecordingReporter {
    pub fn warnings(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter_map(|l| match l {
                Line::Warning(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter_map(|l| match l {
                Line::Error(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_summary(&self) -> Option<ProvisionSummary> {
        self.summaries.lock().unwrap().last().cloned()
    }
}

impl Reporter for RecordingReporter {
    fn step(&self, title: &str) {
        self.lines.lock().unwrap().push(Line::Step(title.to_string()));
    }

    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(Line::Info(message.to_string()));
    }

    fn success(&self, message: &str) {
        self.lines.lock().unwrap().push(Line::Success(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.lines.lock().unwrap().push(Line::Warning(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push(Line::Error(message.to_string()));
    }

    fn summary(&self, summary: &ProvisionSummary) -> anyhow::Result<()> {
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}
