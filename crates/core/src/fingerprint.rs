use crate::error::{PipelineError, Result};
use crate::params::Arguments;
use crate::pipeline::{ExecutionContext, PipelineGraph};
use crate::stage::{ComponentSpec, InputBinding};
use crate::types::StageId;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// SHA-256 (hex) of a value's JSON encoding.
///
/// All maps on this path are ordered, so equal values always encode to the
/// same bytes.
pub fn digest<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[derive(Serialize)]
struct CacheKeyMaterial<'a> {
    component: &'a ComponentSpec,
    context: &'a ExecutionContext,
    inputs: Vec<(&'a str, InputMaterial<'a>)>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum InputMaterial<'a> {
    Value(&'a Value),
    Upstream { key: &'a str, slot: &'a str },
}

/// Per-node cache keys.
///
/// A node's key covers its component declaration, its execution context,
/// the resolved values of its parameter and literal inputs, and the keys of
/// the upstream nodes it consumes, so a change anywhere upstream changes
/// every key downstream of it.
pub fn cache_keys(graph: &PipelineGraph, arguments: &Arguments) -> Result<BTreeMap<StageId, String>> {
    let mut keys: BTreeMap<StageId, String> = BTreeMap::new();

    for id in graph.topological_order() {
        let node = graph
            .node(id)
            .ok_or_else(|| PipelineError::NodeNotFound(id.clone()))?;

        let mut inputs = Vec::with_capacity(node.inputs.len());
        for input in &node.inputs {
            let material = match &input.binding {
                InputBinding::Parameter { name } => InputMaterial::Value(
                    arguments
                        .get(name)
                        .ok_or_else(|| PipelineError::MissingParameter(name.clone()))?,
                ),
                InputBinding::Literal { value } => InputMaterial::Value(value),
                InputBinding::Artifact { handle } => InputMaterial::Upstream {
                    key: keys
                        .get(&handle.producer)
                        .map(String::as_str)
                        .ok_or_else(|| PipelineError::NodeNotFound(handle.producer.clone()))?,
                    slot: &handle.slot,
                },
            };
            inputs.push((input.name.as_str(), material));
        }

        let key = digest(&CacheKeyMaterial {
            component: &node.component,
            context: &node.context,
            inputs,
        })?;
        keys.insert(id.clone(), key);
    }

    Ok(keys)
}
