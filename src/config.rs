use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "aks-provision.toml";

const REDACTED: &str = "********";

/// Main configuration structure for the provisioner.
///
/// Fields are flat so that every one of them maps onto a plain environment
/// variable (`RESOURCE_GROUP`, `NODE_COUNT`, `MONGO_PASSWORD`, ...).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisionConfig {
    // Azure resources
    pub resource_group: String,
    pub cluster_name: String,
    pub location: String,
    pub node_count: u32,
    pub node_vm_size: String,
    /// Log Analytics workspace; derived from the cluster name when unset
    pub workspace_name: Option<String>,
    pub workspace_retention_days: u32,

    // Cluster layout
    pub app_namespace: String,
    pub secret_name: String,
    pub ingress_namespace: String,
    /// Directory holding the per-service manifests, referenced in the summary
    pub manifests_dir: String,

    // External IP polling
    pub ip_poll_attempts: u32,
    pub ip_poll_interval_secs: u64,

    // Application secrets
    pub mongo_username: String,
    pub mongo_password: String,
    pub redis_password: String,
    /// Database connection URI; derived from the Mongo credentials when unset
    pub mongodb_uri: Option<String>,
    pub api_url: String,
    pub grafana_username: String,
    pub grafana_password: String,

    // Observability
    pub log_level: String,
    pub log_format: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            resource_group: "rg-aks-demo".to_string(),
            cluster_name: "aks-demo".to_string(),
            location: "eastus".to_string(),
            node_count: 2,
            node_vm_size: "Standard_B2s".to_string(),
            workspace_name: None,
            workspace_retention_days: 30,
            app_namespace: "app".to_string(),
            secret_name: "app-secrets".to_string(),
            ingress_namespace: "ingress-nginx".to_string(),
            manifests_dir: "k8s".to_string(),
            ip_poll_attempts: 30,
            ip_poll_interval_secs: 10,
            mongo_username: "admin".to_string(),
            mongo_password: "changeme".to_string(),
            redis_password: "changeme".to_string(),
            mongodb_uri: None,
            api_url: "http://backend:8080".to_string(),
            grafana_username: "admin".to_string(),
            grafana_password: "changeme".to_string(),
            log_level: "warn".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl ProvisionConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`--config` path, or aks-provision.toml if present)
    /// 3. Environment variables (unprefixed, e.g. CLUSTER_NAME)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_from(config_path, Environment::default())
    }

    /// Same as [`ProvisionConfig::load`] with an explicit environment source.
    pub fn load_from(config_path: Option<&Path>, environment: Environment) -> Result<Self> {
        let mut builder = Config::builder();

        match config_path {
            Some(path) => {
                if !path.exists() {
                    bail!("configuration file not found: {}", path.display());
                }
                builder = builder.add_source(File::from(path));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        builder = builder.add_source(environment);

        let config = builder.build().context("failed to read configuration sources")?;
        let provision_config: ProvisionConfig = config
            .try_deserialize()
            .context("failed to parse configuration")?;

        provision_config.validate()?;
        Ok(provision_config)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("resource_group", &self.resource_group),
            ("cluster_name", &self.cluster_name),
            ("location", &self.location),
            ("node_vm_size", &self.node_vm_size),
            ("app_namespace", &self.app_namespace),
            ("secret_name", &self.secret_name),
            ("ingress_namespace", &self.ingress_namespace),
        ] {
            if value.trim().is_empty() {
                bail!("{field} must not be empty");
            }
        }
        if self.node_count == 0 {
            bail!("node_count must be at least 1");
        }
        if self.ip_poll_attempts == 0 {
            bail!("ip_poll_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn workspace_name(&self) -> String {
        self.workspace_name
            .clone()
            .unwrap_or_else(|| format!("{}-logs", self.cluster_name))
    }

    pub fn mongodb_uri(&self) -> String {
        self.mongodb_uri.clone().unwrap_or_else(|| {
            format!(
                "mongodb://{}:{}@mongodb:27017/app?authSource=admin",
                urlencoding::encode(&self.mongo_username),
                urlencoding::encode(&self.mongo_password)
            )
        })
    }

    pub fn ip_poll_interval(&self) -> Duration {
        Duration::from_secs(self.ip_poll_interval_secs)
    }

    /// Key/value pairs written into the application secret, in a fixed order
    pub fn secret_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("mongo-username".to_string(), self.mongo_username.clone()),
            ("mongo-password".to_string(), self.mongo_password.clone()),
            ("redis-password".to_string(), self.redis_password.clone()),
            ("mongodb-uri".to_string(), self.mongodb_uri()),
            ("api-url".to_string(), self.api_url.clone()),
            ("grafana-username".to_string(), self.grafana_username.clone()),
            ("grafana-password".to_string(), self.grafana_password.clone()),
        ]
    }

    /// Names of credential settings still carrying their built-in defaults
    pub fn default_credentials_in_use(&self) -> Vec<&'static str> {
        let defaults = Self::default();
        let mut in_use = Vec::new();
        if self.mongo_password == defaults.mongo_password {
            in_use.push("MONGO_PASSWORD");
        }
        if self.redis_password == defaults.redis_password {
            in_use.push("REDIS_PASSWORD");
        }
        if self.grafana_password == defaults.grafana_password {
            in_use.push("GRAFANA_PASSWORD");
        }
        in_use
    }

    /// Copy with every credential replaced by a placeholder
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.mongo_password = REDACTED.to_string();
        copy.redis_password = REDACTED.to_string();
        copy.grafana_password = REDACTED.to_string();
        if copy.mongodb_uri.is_some() {
            copy.mongodb_uri = Some(REDACTED.to_string());
        }
        copy
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load .env file if it exists. Returns whether one was loaded; runs
    /// before tracing is set up, so logging is left to the caller.
    pub fn load_env_file() -> Result<bool> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            return Ok(true);
        }
        Ok(false)
    }
}
