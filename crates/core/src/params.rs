use crate::error::{PipelineError, Result};
use crate::types::{json_type_name, ParameterType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Concrete top-level argument values, keyed by parameter name
pub type Arguments = BTreeMap<String, Value>;

/// Declaration of a single pipeline parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSpec {
    /// A parameter the caller must always supply
    pub fn required(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: None,
            description: None,
        }
    }

    /// A parameter that falls back to `default` when not supplied
    pub fn with_default(name: impl Into<String>, param_type: ParameterType, default: Value) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: Some(default),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn check(&self, value: &Value) -> Result<()> {
        if self.param_type.accepts(value) {
            Ok(())
        } else {
            Err(PipelineError::ParameterType {
                name: self.name.clone(),
                expected: self.param_type,
                found: json_type_name(value).to_string(),
            })
        }
    }
}

/// The set of parameters a pipeline declares
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    params: BTreeMap<String, ParameterSpec>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration. Names must be unique and defaults must match the declared type.
    pub fn declare(&mut self, spec: ParameterSpec) -> Result<()> {
        if self.params.contains_key(&spec.name) {
            return Err(PipelineError::DuplicateParameter(spec.name));
        }
        if let Some(default) = &spec.default {
            spec.check(default)?;
        }
        self.params.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Builder-style variant of [`ParameterSet::declare`]
    pub fn with(mut self, spec: ParameterSpec) -> Result<Self> {
        self.declare(spec)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Resolve caller-supplied arguments against the declarations.
    ///
    /// Every supplied name must be declared, every value must match its
    /// declared type, and every declared parameter must end up with a value
    /// (supplied or default).
    pub fn resolve(&self, arguments: &Arguments) -> Result<Arguments> {
        if let Some(unknown) = arguments.keys().find(|name| !self.params.contains_key(*name)) {
            return Err(PipelineError::UnknownParameter(unknown.clone()));
        }

        let mut resolved = Arguments::new();
        for spec in self.params.values() {
            let value = arguments
                .get(&spec.name)
                .or(spec.default.as_ref())
                .ok_or_else(|| PipelineError::MissingParameter(spec.name.clone()))?;
            spec.check(value)?;
            resolved.insert(spec.name.clone(), value.clone());
        }

        Ok(resolved)
    }
}
