// Core types and graph construction for trainflow pipelines

pub mod error;
pub mod fingerprint;
pub mod fraud;
pub mod params;
pub mod pipeline;
pub mod run;
pub mod secrets;
pub mod stage;
pub mod stages;
pub mod types;

pub use error::{PipelineError, Reference, Result};
pub use params::{Arguments, ParameterSet, ParameterSpec};
pub use pipeline::{Edge, PipelineBuilder, PipelineGraph, PipelineSpec, StageNode};
pub use run::{RunOptions, RunRequest};
pub use secrets::{inject, SecretBinding, SecretKeyRef};
pub use stage::{ArtifactHandle, ComponentSpec, InputBinding, InputSlot, OutputSlot, StageOutputs, StageUnit};
pub use types::*;
