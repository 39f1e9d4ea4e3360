use crate::error::{PipelineError, Result};
use crate::fingerprint::{cache_keys, digest};
use crate::params::Arguments;
use crate::pipeline::{PipelineGraph, PipelineSpec};
use crate::types::{RequestId, StageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Where and how a compiled pipeline should run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub experiment_name: String,
    /// Defaults to the pipeline name
    pub run_name: Option<String>,
    pub namespace: String,
    pub enable_caching: bool,
}

impl RunOptions {
    pub fn new(experiment_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            run_name: None,
            namespace: namespace.into(),
            enable_caching: false,
        }
    }

    pub fn run_name(mut self, run_name: impl Into<String>) -> Self {
        self.run_name = Some(run_name.into());
        self
    }

    pub fn enable_caching(mut self, enable: bool) -> Self {
        self.enable_caching = enable;
        self
    }
}

/// The unit submitted to the execution backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub request_id: RequestId,
    pub created_at: DateTime<Utc>,
    pub run_name: String,
    pub experiment_name: String,
    pub namespace: String,
    pub enable_caching: bool,
    pub pipeline: PipelineSpec,
    pub parameters: Arguments,
    pub cache_keys: BTreeMap<StageId, String>,
    /// Digest of the pipeline and its resolved parameters
    pub fingerprint: String,
}

impl RunRequest {
    /// Bind arguments to a finalized graph.
    ///
    /// Everything except `request_id` and `created_at` is a pure function of
    /// the graph, the arguments and the options.
    pub fn compile(graph: &PipelineGraph, arguments: &Arguments, options: RunOptions) -> Result<Self> {
        if options.experiment_name.trim().is_empty() {
            return Err(PipelineError::InvalidRunOptions(
                "experiment name is empty".to_string(),
            ));
        }
        if options.namespace.trim().is_empty() {
            return Err(PipelineError::InvalidRunOptions(
                "namespace is empty".to_string(),
            ));
        }

        let parameters = graph.parameters().resolve(arguments)?;
        let pipeline = graph.to_spec();
        let cache_keys = cache_keys(graph, &parameters)?;
        let fingerprint = digest(&(&pipeline, &parameters))?;

        let run_name = options
            .run_name
            .unwrap_or_else(|| graph.name().to_string());

        info!(
            pipeline = %pipeline.name,
            run_name = %run_name,
            namespace = %options.namespace,
            caching = options.enable_caching,
            fingerprint = %fingerprint,
            "Compiled run request"
        );

        Ok(Self {
            request_id: RequestId::new(),
            created_at: Utc::now(),
            run_name,
            experiment_name: options.experiment_name,
            namespace: options.namespace,
            enable_caching: options.enable_caching,
            pipeline,
            parameters,
            cache_keys,
            fingerprint,
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
