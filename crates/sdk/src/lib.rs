//! # trainflow SDK
//!
//! Submits compiled trainflow runs to a Data Science Pipelines style backend.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trainflow_core::{fraud, RunOptions, RunRequest};
//! use trainflow_sdk::{BearerToken, PipelineClient, SubmitResult, TrustAnchor};
//!
//! # async fn example(arguments: trainflow_core::Arguments) -> SubmitResult<()> {
//! let graph = fraud::fraud_training_pipeline(fraud::parameters()?)?;
//! let request = RunRequest::compile(
//!     &graph,
//!     &arguments,
//!     RunOptions::new("fraud-training", "mlops-dev-zone").enable_caching(true),
//! )?;
//!
//! let client = PipelineClient::builder()
//!     .endpoint("https://ds-pipeline-dspa.mlops-dev-zone.svc:8443")
//!     .bearer_token(BearerToken::new("service-account-token"))
//!     .trust_anchor(TrustAnchor::from_pem(std::fs::read("service-ca.crt").unwrap_or_default()))
//!     .build()?;
//!
//! // Consumes the client; the credential is dropped afterwards
//! let handle = client.submit(&request).await?;
//! println!("Started run {}", handle.run_id);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod transport;

// Re-export main client
pub use api::RunHandle;
pub use client::{PipelineClient, PipelineClientBuilder};
pub use config::{endpoint_for_namespace, BearerToken, ClientConfig, TrustAnchor, DEFAULT_ENDPOINT_TEMPLATE};
pub use error::{RejectionReason, SubmitError, SubmitResult};

// Re-export core types for convenience
pub use trainflow_core::{Arguments, PipelineGraph, RequestId, RunOptions, RunRequest};
