//! HTTP transport for backend requests.

use crate::config::ClientConfig;
use crate::error::{SubmitError, SubmitResult};
use reqwest::{header, Certificate, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// HTTP transport bound to one backend and one credential.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: Arc<ClientConfig>,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration.
    ///
    /// Fails with `Authentication` when the credential is empty and with
    /// `Connection` when the trust anchor is missing or unusable. No request
    /// is made in either case.
    pub fn new(config: Arc<ClientConfig>) -> SubmitResult<Self> {
        if config.bearer_token.is_empty() {
            return Err(SubmitError::Authentication(
                "no bearer credential provided".to_string(),
            ));
        }
        if !config.trust_anchor.has_certificate() {
            return Err(SubmitError::Connection(
                "no TLS trust anchor provided".to_string(),
            ));
        }

        let mut auth = header::HeaderValue::from_str(&format!(
            "Bearer {}",
            config.bearer_token.expose()
        ))
        .map_err(|_| SubmitError::Authentication("invalid bearer credential format".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let certificate = Certificate::from_pem(config.trust_anchor.pem())
            .map_err(|e| SubmitError::Connection(format!("invalid TLS trust anchor: {}", e)))?;

        let mut builder = Client::builder()
            .default_headers(headers)
            .tls_built_in_root_certs(false)
            .add_root_certificate(certificate);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| SubmitError::Connection(format!("failed to initialise TLS: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build a URL for the given path, appended to any path the endpoint carries.
    fn build_url(&self, path: &str) -> SubmitResult<url::Url> {
        let mut url = self.config.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SubmitError::Config(format!(
                    "endpoint {} cannot carry a path",
                    self.config.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Send a request exactly once.
    async fn execute(&self, request: RequestBuilder) -> SubmitResult<Response> {
        let response = request.send().await.map_err(SubmitError::from_transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "Backend rejected request");
        Err(SubmitError::from_response(status.as_u16(), &body))
    }

    /// Execute a POST request.
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> SubmitResult<T> {
        let url = self.build_url(path)?;
        debug!(url = %url, "POST request");

        let response = self.execute(self.client.post(url).json(body)).await?;
        let body = response.json().await?;
        Ok(body)
    }
}
