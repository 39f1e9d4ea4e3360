//! Submission client.

use crate::api::{RunHandle, RunsApi};
use crate::config::{BearerToken, ClientConfig, TrustAnchor};
use crate::error::{SubmitError, SubmitResult};
use crate::transport::HttpTransport;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use trainflow_core::{Arguments, PipelineGraph, RunOptions, RunRequest};
use url::Url;

/// Client for submitting runs to a pipeline backend.
///
/// A client is built for a single submission: [`PipelineClient::submit`]
/// consumes it, so the credential it holds is dropped once the call returns.
pub struct PipelineClient {
    config: Arc<ClientConfig>,
    pub(crate) http: HttpTransport,
}

impl PipelineClient {
    /// Create a new client builder.
    pub fn builder() -> PipelineClientBuilder {
        PipelineClientBuilder::new()
    }

    /// Create a client from configuration.
    pub fn from_config(config: ClientConfig) -> SubmitResult<Self> {
        let config = Arc::new(config);
        let http = HttpTransport::new(config.clone())?;

        Ok(Self { config, http })
    }

    pub fn endpoint(&self) -> &Url {
        &self.config.endpoint
    }

    /// Get the runs API.
    pub fn runs(&self) -> RunsApi<'_> {
        RunsApi::new(self)
    }

    /// Submit a compiled run request.
    ///
    /// One request is sent. There is no retry and no polling; the returned
    /// handle identifies the run the backend started.
    pub async fn submit(self, request: &RunRequest) -> SubmitResult<RunHandle> {
        info!(
            endpoint = %self.config.endpoint,
            run_name = %request.run_name,
            namespace = %request.namespace,
            caching = request.enable_caching,
            "Submitting run"
        );

        let handle = self.runs().create(request).await?;

        info!(run_id = %handle.run_id, request_id = %handle.request_id, "Run submitted");
        Ok(handle)
    }

    /// Compile a graph with the given arguments and submit it.
    ///
    /// Compilation failures are reported before anything is sent.
    pub async fn submit_graph(
        self,
        graph: &PipelineGraph,
        arguments: &Arguments,
        options: RunOptions,
    ) -> SubmitResult<RunHandle> {
        let request = RunRequest::compile(graph, arguments, options)?;
        self.submit(&request).await
    }
}

/// Builder for creating a PipelineClient.
pub struct PipelineClientBuilder {
    endpoint: Option<String>,
    bearer_token: Option<BearerToken>,
    trust_anchor: Option<TrustAnchor>,
    timeout: Option<Duration>,
}

impl PipelineClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            endpoint: None,
            bearer_token: None,
            trust_anchor: None,
            timeout: None,
        }
    }

    /// Set the base URL of the pipeline backend.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Set the bearer credential.
    pub fn bearer_token(mut self, token: BearerToken) -> Self {
        self.bearer_token = Some(token);
        self
    }

    /// Set the certificates trusted for the endpoint.
    pub fn trust_anchor(mut self, anchor: TrustAnchor) -> Self {
        self.trust_anchor = Some(anchor);
        self
    }

    /// Bound the request duration. Without this the call waits indefinitely.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> SubmitResult<PipelineClient> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| SubmitError::Config("endpoint is required".to_string()))?;

        let bearer_token = self
            .bearer_token
            .ok_or_else(|| SubmitError::Authentication("no bearer credential provided".to_string()))?;

        let trust_anchor = self
            .trust_anchor
            .ok_or_else(|| SubmitError::Connection("no TLS trust anchor provided".to_string()))?;

        let config = ClientConfig {
            endpoint: Url::parse(&endpoint)?,
            bearer_token,
            trust_anchor,
            timeout: self.timeout,
        };

        PipelineClient::from_config(config)
    }
}

impl Default for PipelineClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
