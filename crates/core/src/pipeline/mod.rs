pub mod builder;
pub mod dag;

pub use builder::PipelineBuilder;
pub use dag::{Edge, ExecutionContext, PipelineGraph, PipelineSpec, ResolvedInput, StageNode};
