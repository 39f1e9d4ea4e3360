use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use trainflow_core::fraud::{DEFAULT_REGISTRY_SECRET, REGISTRY_SECRET_KEYS};
use trainflow_core::{Arguments, SecretBinding};
use trainflow_sdk::config::DEFAULT_ENDPOINT_TEMPLATE;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub registry_secret: RegistrySecretConfig,

    /// Pipeline arguments, layered over the built-in defaults
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Fixed endpoint; when unset it is derived from the pod namespace
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_endpoint_template")]
    pub endpoint_template: String,

    #[serde(default = "default_namespace_file")]
    pub namespace_file: PathBuf,

    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,

    #[serde(default = "default_ca_cert_file")]
    pub ca_cert_file: PathBuf,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,

    #[serde(default = "default_run_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub run_name: Option<String>,

    #[serde(default = "default_enable_caching")]
    pub enable_caching: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySecretConfig {
    #[serde(default = "default_secret_name")]
    pub name: String,

    #[serde(default = "default_key_to_env")]
    pub key_to_env: BTreeMap<String, String>,
}

fn default_endpoint_template() -> String {
    DEFAULT_ENDPOINT_TEMPLATE.to_string()
}

fn default_namespace_file() -> PathBuf {
    Path::new(SERVICE_ACCOUNT_DIR).join("namespace")
}

fn default_token_file() -> PathBuf {
    Path::new(SERVICE_ACCOUNT_DIR).join("token")
}

fn default_ca_cert_file() -> PathBuf {
    Path::new(SERVICE_ACCOUNT_DIR).join("service-ca.crt")
}

fn default_experiment_name() -> String {
    "fraud-training".to_string()
}

fn default_run_namespace() -> String {
    "mlops-dev-zone".to_string()
}

fn default_enable_caching() -> bool {
    true
}

fn default_secret_name() -> String {
    DEFAULT_REGISTRY_SECRET.to_string()
}

fn default_key_to_env() -> BTreeMap<String, String> {
    REGISTRY_SECRET_KEYS
        .iter()
        .map(|key| (key.to_string(), key.to_string()))
        .collect()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            endpoint_template: default_endpoint_template(),
            namespace_file: default_namespace_file(),
            token_file: default_token_file(),
            ca_cert_file: default_ca_cert_file(),
            timeout_secs: None,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            experiment_name: default_experiment_name(),
            namespace: default_run_namespace(),
            run_name: None,
            enable_caching: default_enable_caching(),
        }
    }
}

impl Default for RegistrySecretConfig {
    fn default() -> Self {
        Self {
            name: default_secret_name(),
            key_to_env: default_key_to_env(),
        }
    }
}

impl RegistrySecretConfig {
    pub fn binding(&self) -> SecretBinding {
        self.key_to_env
            .iter()
            .fold(SecretBinding::new(&self.name), |binding, (key, env)| {
                binding.map_key(key, env)
            })
    }
}

impl CliConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str(&content).context("Failed to parse configuration file")
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Arguments for the run: built-in defaults overridden by `[parameters]`
    pub fn arguments(&self) -> Arguments {
        let mut arguments = default_arguments();
        arguments.extend(self.parameters.clone());
        arguments
    }
}

fn default_arguments() -> Arguments {
    [
        (
            "datastore".to_string(),
            json!({
                "uri": "transactionsdb.mlops-transactionsdb.svc.cluster.local",
                "table": "transactions.transactions"
            }),
        ),
        ("hyperparameters".to_string(), json!({"epochs": 2})),
    ]
    .into_iter()
    .collect()
}
