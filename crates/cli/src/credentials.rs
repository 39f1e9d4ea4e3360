// Backend location and credentials mounted into the pod by the platform

use crate::config::BackendConfig;
use anyhow::{bail, Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use trainflow_sdk::{endpoint_for_namespace, BearerToken, TrustAnchor};

/// Whatever could be found on disk.
///
/// A missing token or CA file is left as `None` so the client builder can
/// report it as an authentication or connection failure.
#[derive(Debug)]
pub struct BackendCredentials {
    pub endpoint: String,
    pub bearer_token: Option<BearerToken>,
    pub trust_anchor: Option<TrustAnchor>,
}

impl BackendCredentials {
    pub fn load(backend: &BackendConfig, endpoint_override: Option<&str>) -> Result<Self> {
        let endpoint = match endpoint_override.or(backend.endpoint.as_deref()) {
            Some(endpoint) => endpoint.to_string(),
            None => {
                let namespace = read_optional(&backend.namespace_file)?.with_context(|| {
                    format!(
                        "No endpoint configured and {} does not exist",
                        backend.namespace_file.display()
                    )
                })?;
                let namespace = String::from_utf8(namespace)
                    .context("Namespace file is not valid UTF-8")?;
                let namespace = namespace.trim();
                if namespace.is_empty() {
                    bail!("Namespace file {} is empty", backend.namespace_file.display());
                }
                endpoint_for_namespace(&backend.endpoint_template, namespace)?.to_string()
            }
        };

        let bearer_token = read_optional(&backend.token_file)?
            .map(|bytes| String::from_utf8(bytes).context("Token file is not valid UTF-8"))
            .transpose()?
            .map(BearerToken::new);

        let trust_anchor = read_optional(&backend.ca_cert_file)?.map(TrustAnchor::from_pem);

        tracing::debug!(
            endpoint = %endpoint,
            has_token = bearer_token.is_some(),
            has_ca = trust_anchor.is_some(),
            "Loaded backend credentials"
        );

        Ok(Self {
            endpoint,
            bearer_token,
            trust_anchor,
        })
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}
