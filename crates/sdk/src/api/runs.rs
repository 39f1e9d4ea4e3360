//! Runs API endpoints.

use crate::client::PipelineClient;
use crate::error::SubmitResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trainflow_core::{RequestId, RunRequest};

/// Path runs are created under, relative to the backend endpoint.
pub const CREATE_RUN_PATH: &str = "/apis/v2beta1/runs";

/// Identifies a run the backend accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: String,
    pub request_id: RequestId,
    pub run_name: String,
    pub experiment_name: String,
    pub namespace: String,
    pub state: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Runs API for triggering pipeline runs.
pub struct RunsApi<'a> {
    client: &'a PipelineClient,
}

impl<'a> RunsApi<'a> {
    pub(crate) fn new(client: &'a PipelineClient) -> Self {
        Self { client }
    }

    /// Create a run from a compiled request. Returns as soon as the backend accepts it.
    pub async fn create(&self, request: &RunRequest) -> SubmitResult<RunHandle> {
        let response: CreateRunResponse = self.client.http.post(CREATE_RUN_PATH, request).await?;

        Ok(RunHandle {
            run_id: response.run_id,
            request_id: request.request_id,
            run_name: request.run_name.clone(),
            experiment_name: request.experiment_name.clone(),
            namespace: request.namespace.clone(),
            state: response.state,
            created_at: response.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CreateRunResponse {
    run_id: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}
