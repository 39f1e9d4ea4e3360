//! Configuration types for the submission client.

use crate::error::{SubmitError, SubmitResult};
use std::time::Duration;
use url::Url;

/// Endpoint template used by Data Science Pipelines deployments.
pub const DEFAULT_ENDPOINT_TEMPLATE: &str = "https://ds-pipeline-dspa.{namespace}.svc:8443";

/// Bearer credential presented to the backend.
///
/// The value never appears in `Debug` output or logs.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a token, trimming surrounding whitespace (token files usually end in a newline).
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// PEM-encoded certificate(s) trusted for the backend's TLS endpoint.
#[derive(Clone)]
pub struct TrustAnchor {
    pem: Vec<u8>,
}

impl TrustAnchor {
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> Self {
        Self { pem: pem.into() }
    }

    pub fn pem(&self) -> &[u8] {
        &self.pem
    }

    /// Whether the bytes contain at least one PEM certificate block.
    pub fn has_certificate(&self) -> bool {
        const MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";
        self.pem.windows(MARKER.len()).any(|w| w == MARKER)
    }
}

impl std::fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustAnchor")
            .field("bytes", &self.pem.len())
            .finish()
    }
}

/// Configuration for the submission client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the pipeline backend.
    pub endpoint: Url,
    /// Credential sent as `Authorization: Bearer`.
    pub bearer_token: BearerToken,
    /// Certificates trusted for the endpoint. Built-in roots are not used.
    pub trust_anchor: TrustAnchor,
    /// Request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Create a new configuration with no timeout.
    pub fn new(endpoint: Url, bearer_token: BearerToken, trust_anchor: TrustAnchor) -> Self {
        Self {
            endpoint,
            bearer_token,
            trust_anchor,
            timeout: None,
        }
    }
}

/// Derive the backend endpoint from a template containing `{namespace}`.
pub fn endpoint_for_namespace(template: &str, namespace: &str) -> SubmitResult<Url> {
    let namespace = namespace.trim();
    if namespace.is_empty() {
        return Err(SubmitError::Config("namespace is empty".to_string()));
    }
    Ok(Url::parse(&template.replace("{namespace}", namespace))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_redacted() {
        let token = BearerToken::new("sk-very-secret\n");
        assert_eq!(token.expose(), "sk-very-secret");
        assert!(!format!("{:?}", token).contains("sk-very-secret"));

        let config = ClientConfig::new(
            Url::parse("https://example.com").unwrap(),
            token,
            TrustAnchor::from_pem(b"pem".to_vec()),
        );
        assert!(!format!("{:?}", config).contains("sk-very-secret"));
    }

    #[test]
    fn test_blank_token_is_empty() {
        assert!(BearerToken::new("  \n").is_empty());
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::new(
            Url::parse("https://example.com").unwrap(),
            BearerToken::new("t"),
            TrustAnchor::from_pem(Vec::new()),
        );
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_trust_anchor_detects_certificate() {
        let anchor = TrustAnchor::from_pem(include_bytes!("../testdata/ca.pem").to_vec());
        assert!(anchor.has_certificate());
        assert!(!TrustAnchor::from_pem(b"not a certificate".to_vec()).has_certificate());
    }

    #[test]
    fn test_endpoint_for_namespace() {
        let url = endpoint_for_namespace(DEFAULT_ENDPOINT_TEMPLATE, "fraud-ns\n").unwrap();
        assert_eq!(url.as_str(), "https://ds-pipeline-dspa.fraud-ns.svc:8443/");
    }

    #[test]
    fn test_endpoint_requires_namespace() {
        let result = endpoint_for_namespace(DEFAULT_ENDPOINT_TEMPLATE, "");
        assert!(matches!(result, Err(SubmitError::Config(_))));
    }
}
