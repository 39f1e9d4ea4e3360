use crate::error::{PipelineError, Result};
use crate::types::{ContentType, ParameterType, StageId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What an input slot accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "type", rename_all = "snake_case")]
pub enum InputKind {
    /// A parameter or literal value of the given type
    Parameter(ParameterType),
    /// An artifact produced by an upstream stage
    Artifact(ContentType),
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parameter(t) => write!(f, "{} parameter", t),
            Self::Artifact(t) => write!(f, "{} artifact", t),
        }
    }
}

/// A declared input of a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSlot {
    pub name: String,
    pub kind: InputKind,
}

impl InputSlot {
    pub fn parameter(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            kind: InputKind::Parameter(param_type),
        }
    }

    pub fn artifact(name: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            name: name.into(),
            kind: InputKind::Artifact(content_type),
        }
    }
}

/// A declared output of a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSlot {
    pub name: String,
    pub content_type: ContentType,
}

impl OutputSlot {
    pub fn new(name: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            name: name.into(),
            content_type,
        }
    }
}

/// Capability interface every stage satisfies.
///
/// The pipeline never looks inside a stage; it only needs the operation
/// identifier the backend runs and the slots the stage reads and writes.
pub trait StageUnit {
    /// Identifier of the operation the backend executes
    fn operation(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    fn declare_inputs(&self) -> Vec<InputSlot>;

    fn declare_outputs(&self) -> Vec<OutputSlot>;

    /// Snapshot the declarations into a serializable component
    fn component(&self) -> ComponentSpec {
        ComponentSpec {
            operation: self.operation().to_string(),
            description: self.description().map(str::to_string),
            inputs: self.declare_inputs(),
            outputs: self.declare_outputs(),
        }
    }
}

/// Data-driven stage declaration, also the form stages take inside a compiled graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub inputs: Vec<InputSlot>,
    pub outputs: Vec<OutputSlot>,
}

impl ComponentSpec {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            description: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, slot: InputSlot) -> Self {
        self.inputs.push(slot);
        self
    }

    pub fn output(mut self, slot: OutputSlot) -> Self {
        self.outputs.push(slot);
        self
    }

    pub fn input_slot(&self, name: &str) -> Option<&InputSlot> {
        self.inputs.iter().find(|s| s.name == name)
    }

    pub fn output_slot(&self, name: &str) -> Option<&OutputSlot> {
        self.outputs.iter().find(|s| s.name == name)
    }
}

impl StageUnit for ComponentSpec {
    fn operation(&self) -> &str {
        &self.operation
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn declare_inputs(&self) -> Vec<InputSlot> {
        self.inputs.clone()
    }

    fn declare_outputs(&self) -> Vec<OutputSlot> {
        self.outputs.clone()
    }

    fn component(&self) -> ComponentSpec {
        self.clone()
    }
}

/// Build-time reference to one output slot of one stage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub producer: StageId,
    pub slot: String,
    pub content_type: ContentType,
}

impl ArtifactHandle {
    pub fn new(producer: impl Into<StageId>, slot: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            producer: producer.into(),
            slot: slot.into(),
            content_type,
        }
    }
}

/// Where an input's value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum InputBinding {
    /// Pipeline-level parameter, by name
    Parameter { name: String },
    /// Constant baked into the graph
    Literal { value: Value },
    /// Output of an upstream stage
    Artifact { handle: ArtifactHandle },
}

impl InputBinding {
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter { name: name.into() }
    }

    pub fn literal(value: Value) -> Self {
        Self::Literal { value }
    }
}

impl From<ArtifactHandle> for InputBinding {
    fn from(handle: ArtifactHandle) -> Self {
        Self::Artifact { handle }
    }
}

impl From<&ArtifactHandle> for InputBinding {
    fn from(handle: &ArtifactHandle) -> Self {
        Self::Artifact {
            handle: handle.clone(),
        }
    }
}

/// Output handles of a declared stage, available as soon as it is declared
#[derive(Debug, Clone)]
pub struct StageOutputs {
    stage: StageId,
    handles: BTreeMap<String, ArtifactHandle>,
}

impl StageOutputs {
    pub(crate) fn new(stage: StageId, component: &ComponentSpec) -> Self {
        let handles = component
            .outputs
            .iter()
            .map(|slot| {
                (
                    slot.name.clone(),
                    ArtifactHandle::new(stage.clone(), slot.name.clone(), slot.content_type),
                )
            })
            .collect();

        Self { stage, handles }
    }

    pub fn stage(&self) -> &StageId {
        &self.stage
    }

    /// Handle for a named output slot
    pub fn output(&self, slot: &str) -> Result<ArtifactHandle> {
        self.handles
            .get(slot)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownOutput {
                stage: self.stage.clone(),
                slot: slot.to_string(),
            })
    }

    pub fn get(&self, slot: &str) -> Option<&ArtifactHandle> {
        self.handles.get(slot)
    }
}
