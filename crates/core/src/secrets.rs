use crate::error::{PipelineError, Result};
use crate::pipeline::PipelineGraph;
use crate::types::StageId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Pointer to one key of a named secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeyRef {
    pub secret_name: String,
    pub key: String,
}

/// A named secret plus its secret key -> environment variable mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBinding {
    pub secret_name: String,
    pub key_to_env: BTreeMap<String, String>,
}

impl SecretBinding {
    pub fn new(secret_name: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
            key_to_env: BTreeMap::new(),
        }
    }

    /// Expose secret `key` as environment variable `env`
    pub fn map_key(mut self, key: impl Into<String>, env: impl Into<String>) -> Self {
        self.key_to_env.insert(key.into(), env.into());
        self
    }

    /// Expose each key under an environment variable of the same name
    pub fn identity<I, K>(secret_name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let key_to_env = keys
            .into_iter()
            .map(|k| {
                let k = k.into();
                (k.clone(), k)
            })
            .collect();

        Self {
            secret_name: secret_name.into(),
            key_to_env,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.secret_name.trim().is_empty() {
            return Err(PipelineError::InvalidSecretBinding(
                "secret name is empty".to_string(),
            ));
        }
        if self.key_to_env.is_empty() {
            return Err(PipelineError::InvalidSecretBinding(format!(
                "secret '{}' maps no keys",
                self.secret_name
            )));
        }

        let mut envs = HashSet::new();
        for (key, env) in &self.key_to_env {
            if key.trim().is_empty() || env.trim().is_empty() {
                return Err(PipelineError::InvalidSecretBinding(format!(
                    "secret '{}' has an empty key or environment variable name",
                    self.secret_name
                )));
            }
            if !envs.insert(env.as_str()) {
                return Err(PipelineError::InvalidSecretBinding(format!(
                    "secret '{}' maps more than one key to {}",
                    self.secret_name, env
                )));
            }
        }

        Ok(())
    }
}

/// Attach a secret binding to one node of the graph.
///
/// Re-injecting an environment variable name that is already bound on the
/// node replaces the earlier binding. On error the graph is left untouched.
pub fn inject(graph: &mut PipelineGraph, target: &StageId, binding: &SecretBinding) -> Result<()> {
    binding.validate()?;

    let node = graph
        .node_mut(target)
        .ok_or_else(|| PipelineError::NodeNotFound(target.clone()))?;

    for (key, env) in &binding.key_to_env {
        let previous = node.context.secret_env.insert(
            env.clone(),
            SecretKeyRef {
                secret_name: binding.secret_name.clone(),
                key: key.clone(),
            },
        );

        if let Some(previous) = previous {
            tracing::debug!(
                node = %target,
                env = %env,
                previous_secret = %previous.secret_name,
                "Replacing existing secret environment binding"
            );
        }
    }

    tracing::info!(
        node = %target,
        secret = %binding.secret_name,
        keys = binding.key_to_env.len(),
        "Attached secret to node"
    );

    Ok(())
}
