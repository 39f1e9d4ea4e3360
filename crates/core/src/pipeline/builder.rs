use super::dag::{EdgeLabel, ExecutionContext, PipelineGraph, ResolvedInput, StageNode};
use crate::error::{PipelineError, Reference, Result};
use crate::params::ParameterSet;
use crate::stage::{ComponentSpec, InputBinding, InputKind, StageOutputs, StageUnit};
use crate::types::{json_type_name, ParameterType, StageId};
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// A stage as recorded at declaration time, before any validation
#[derive(Debug, Clone)]
struct StageDeclaration {
    id: StageId,
    component: ComponentSpec,
    bindings: BTreeMap<String, InputBinding>,
}

/// Inputs and upstream edges of one declaration after resolution
struct ResolvedStage {
    inputs: Vec<ResolvedInput>,
    upstream: Vec<(usize, EdgeLabel)>,
}

/// Records stage declarations, then validates and finalizes them in [`PipelineBuilder::build`].
///
/// Declaring a stage never fails: it hands back the stage's output handles
/// right away so downstream stages can bind to them. All reference, type,
/// duplicate and cycle checks happen in one pass when the graph is built.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    description: Option<String>,
    parameters: ParameterSet,
    declarations: Vec<StageDeclaration>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>, parameters: ParameterSet) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters,
            declarations: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a stage and bind its inputs.
    ///
    /// Binding the same input name twice keeps the later binding.
    pub fn add_stage<U, I, K>(&mut self, id: impl Into<StageId>, unit: &U, bindings: I) -> StageOutputs
    where
        U: StageUnit + ?Sized,
        I: IntoIterator<Item = (K, InputBinding)>,
        K: Into<String>,
    {
        let id = id.into();
        let component = unit.component();
        let outputs = StageOutputs::new(id.clone(), &component);

        self.declarations.push(StageDeclaration {
            id,
            component,
            bindings: bindings.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        });

        outputs
    }

    /// Validate every declaration and produce the finalized graph
    pub fn build(self) -> Result<PipelineGraph> {
        let positions = self.check_identities()?;

        let resolved = (0..self.declarations.len())
            .map(|pos| self.resolve(pos, &positions))
            .collect::<Result<Vec<_>>>()?;

        let mut graph = DiGraph::new();
        let indices: Vec<NodeIndex> = self
            .declarations
            .iter()
            .zip(&resolved)
            .map(|(decl, stage)| {
                graph.add_node(StageNode {
                    id: decl.id.clone(),
                    component: decl.component.clone(),
                    inputs: stage.inputs.clone(),
                    context: ExecutionContext::default(),
                })
            })
            .collect();

        let mut forward_refs = Vec::new();
        for (consumer, stage) in resolved.into_iter().enumerate() {
            for (producer, label) in stage.upstream {
                if producer > consumer {
                    forward_refs.push((consumer, producer, label.clone()));
                }
                graph.add_edge(indices[producer], indices[consumer], label);
            }
        }

        // A producer declared after its consumer is either a cycle or a
        // reference to something not declared yet. Cycles take precedence.
        if let Some(&(consumer, producer, _)) = forward_refs
            .iter()
            .find(|(c, p, _)| has_path_connecting(&graph, indices[*c], indices[*p], None))
        {
            return Err(PipelineError::Cycle {
                stage: self.declarations[consumer].id.clone(),
                producer: self.declarations[producer].id.clone(),
            });
        }
        if let Some((consumer, producer, label)) = forward_refs.into_iter().next() {
            return Err(PipelineError::UnresolvedReference {
                stage: self.declarations[consumer].id.clone(),
                input: label.input,
                reference: Reference::Artifact {
                    producer: self.declarations[producer].id.clone(),
                    slot: label.output,
                },
            });
        }

        debug!(
            pipeline = %self.name,
            stages = graph.node_count(),
            edges = graph.edge_count(),
            "Pipeline graph built"
        );

        Ok(PipelineGraph::from_parts(
            self.name,
            self.description,
            self.parameters,
            graph,
        ))
    }

    /// Reject repeated output identities and stage names; map each name to its declaration
    fn check_identities(&self) -> Result<HashMap<StageId, usize>> {
        let mut positions: HashMap<StageId, usize> = HashMap::new();

        for (pos, decl) in self.declarations.iter().enumerate() {
            let mut seen = HashSet::new();
            for slot in &decl.component.outputs {
                if !seen.insert(slot.name.as_str()) {
                    return Err(PipelineError::DuplicateOutput {
                        stage: decl.id.clone(),
                        slot: slot.name.clone(),
                    });
                }
            }

            if let Some(&first) = positions.get(&decl.id) {
                let earlier: &ComponentSpec = &self.declarations[first].component;
                if let Some(slot) = decl
                    .component
                    .outputs
                    .iter()
                    .find(|s| earlier.output_slot(&s.name).is_some())
                {
                    return Err(PipelineError::DuplicateOutput {
                        stage: decl.id.clone(),
                        slot: slot.name.clone(),
                    });
                }
                return Err(PipelineError::DuplicateStage(decl.id.clone()));
            }

            positions.insert(decl.id.clone(), pos);
        }

        Ok(positions)
    }

    fn resolve(&self, pos: usize, positions: &HashMap<StageId, usize>) -> Result<ResolvedStage> {
        let decl = &self.declarations[pos];

        let mut declared_inputs = HashSet::new();
        if let Some(repeated) = decl
            .component
            .inputs
            .iter()
            .find(|slot| !declared_inputs.insert(slot.name.as_str()))
        {
            return Err(PipelineError::DuplicateInput {
                stage: decl.id.clone(),
                input: repeated.name.clone(),
            });
        }

        if let Some(unknown) = decl
            .bindings
            .keys()
            .find(|name| decl.component.input_slot(name).is_none())
        {
            return Err(PipelineError::UnknownInput {
                stage: decl.id.clone(),
                input: unknown.clone(),
            });
        }

        let mut inputs = Vec::with_capacity(decl.component.inputs.len());
        let mut upstream = Vec::new();

        for slot in &decl.component.inputs {
            let binding = decl
                .bindings
                .get(&slot.name)
                .ok_or_else(|| PipelineError::UnboundInput {
                    stage: decl.id.clone(),
                    input: slot.name.clone(),
                })?;

            let mismatch = |found: String| PipelineError::TypeMismatch {
                stage: decl.id.clone(),
                input: slot.name.clone(),
                expected: slot.kind.to_string(),
                found,
            };

            match (binding, slot.kind) {
                (InputBinding::Parameter { name }, InputKind::Parameter(expected)) => {
                    let spec = self.parameters.get(name).ok_or_else(|| {
                        PipelineError::UnresolvedReference {
                            stage: decl.id.clone(),
                            input: slot.name.clone(),
                            reference: Reference::Parameter(name.clone()),
                        }
                    })?;
                    if !assignable(spec.param_type, expected) {
                        return Err(mismatch(format!("{} parameter", spec.param_type)));
                    }
                }
                (InputBinding::Literal { value }, InputKind::Parameter(expected)) => {
                    if !expected.accepts(value) {
                        return Err(mismatch(format!("{} literal", json_type_name(value))));
                    }
                }
                (InputBinding::Artifact { handle }, InputKind::Artifact(expected)) => {
                    let unresolved = || PipelineError::UnresolvedReference {
                        stage: decl.id.clone(),
                        input: slot.name.clone(),
                        reference: Reference::Artifact {
                            producer: handle.producer.clone(),
                            slot: handle.slot.clone(),
                        },
                    };

                    let producer = *positions.get(&handle.producer).ok_or_else(unresolved)?;
                    if producer == pos {
                        return Err(PipelineError::Cycle {
                            stage: decl.id.clone(),
                            producer: handle.producer.clone(),
                        });
                    }

                    let declared = self.declarations[producer]
                        .component
                        .output_slot(&handle.slot)
                        .ok_or_else(unresolved)?;
                    if declared.content_type != expected || handle.content_type != expected {
                        return Err(mismatch(format!("{} artifact", declared.content_type)));
                    }

                    upstream.push((
                        producer,
                        EdgeLabel {
                            output: handle.slot.clone(),
                            input: slot.name.clone(),
                        },
                    ));
                }
                (InputBinding::Artifact { handle }, InputKind::Parameter(_)) => {
                    return Err(mismatch(format!("{} artifact", handle.content_type)));
                }
                (InputBinding::Parameter { name }, InputKind::Artifact(_)) => {
                    return Err(mismatch(format!("parameter '{}'", name)));
                }
                (InputBinding::Literal { value }, InputKind::Artifact(_)) => {
                    return Err(mismatch(format!("{} literal", json_type_name(value))));
                }
            }

            inputs.push(ResolvedInput {
                name: slot.name.clone(),
                binding: binding.clone(),
            });
        }

        Ok(ResolvedStage { inputs, upstream })
    }
}

/// Whether a parameter of type `from` may feed a slot expecting `to`
fn assignable(from: ParameterType, to: ParameterType) -> bool {
    from == to || (from == ParameterType::Integer && to == ParameterType::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSpec;
    use crate::stage::{ArtifactHandle, InputSlot, OutputSlot};
    use crate::types::ContentType;
    use serde_json::json;

    fn no_inputs() -> Vec<(&'static str, InputBinding)> {
        Vec::new()
    }

    fn producer() -> ComponentSpec {
        ComponentSpec::new("produce").output(OutputSlot::new("data", ContentType::Dataset))
    }

    fn consumer() -> ComponentSpec {
        ComponentSpec::new("consume")
            .input(InputSlot::artifact("data", ContentType::Dataset))
            .output(OutputSlot::new("report", ContentType::Metrics))
    }

    fn params() -> ParameterSet {
        ParameterSet::new()
            .with(ParameterSpec::required("epochs", ParameterType::Integer))
            .unwrap()
    }

    #[test]
    fn test_linear_pipeline() {
        let mut builder = PipelineBuilder::new("linear", ParameterSet::new());
        let first = builder.add_stage("first", &producer(), no_inputs());
        let second = builder.add_stage("second", &consumer(), [("data", first.output("data").unwrap().into())]);
        assert_eq!(second.stage(), &StageId::new("second"));

        let dag = builder.build().unwrap();
        assert_eq!(
            dag.topological_order(),
            &[StageId::new("first"), StageId::new("second")]
        );
        assert_eq!(dag.edges().len(), 1);
        assert_eq!(dag.edges()[0].output, "data");
    }

    #[test]
    fn test_build_is_deterministic() {
        let build = || {
            let mut builder = PipelineBuilder::new("linear", params());
            let first = builder.add_stage("first", &producer(), no_inputs());
            let data: InputBinding = first.output("data").unwrap().into();
            builder.add_stage("second", &consumer(), [("data", data.clone())]);
            builder.add_stage("third", &consumer(), [("data", data)]);
            builder.build().unwrap()
        };

        let a = build();
        let b = build();
        assert_eq!(a.to_spec(), b.to_spec());
        assert_eq!(a.topological_order(), b.topological_order());
    }

    #[test]
    fn test_undeclared_producer_rejected() {
        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        let ghost = ArtifactHandle::new("ghost", "data", ContentType::Dataset);
        builder.add_stage("consumer", &consumer(), [("data", ghost.into())]);

        let err = builder.build().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnresolvedReference {
                reference: Reference::Artifact { ref producer, .. },
                ..
            } if producer.as_str() == "ghost"
        ));
    }

    #[test]
    fn test_undeclared_output_slot_rejected() {
        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        builder.add_stage("first", &producer(), no_inputs());
        let wrong = ArtifactHandle::new("first", "model", ContentType::Dataset);
        builder.add_stage("second", &consumer(), [("data", wrong.into())]);

        assert!(matches!(
            builder.build(),
            Err(PipelineError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_forward_reference_rejected() {
        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        let later = ArtifactHandle::new("later", "data", ContentType::Dataset);
        builder.add_stage("early", &consumer(), [("data", later.into())]);
        builder.add_stage("later", &producer(), no_inputs());

        let err = builder.build().unwrap_err();
        assert!(matches!(err, PipelineError::UnresolvedReference { ref stage, .. } if stage.as_str() == "early"));
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let looping = ComponentSpec::new("loop")
            .input(InputSlot::artifact("data", ContentType::Dataset))
            .output(OutputSlot::new("data", ContentType::Dataset));

        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        let own = ArtifactHandle::new("loop", "data", ContentType::Dataset);
        builder.add_stage("loop", &looping, [("data", own.into())]);

        assert!(matches!(builder.build(), Err(PipelineError::Cycle { .. })));
    }

    #[test]
    fn test_out_of_order_cycle_rejected() {
        let relay = ComponentSpec::new("relay")
            .input(InputSlot::artifact("data", ContentType::Dataset))
            .output(OutputSlot::new("data", ContentType::Dataset));

        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        let b_out = ArtifactHandle::new("b", "data", ContentType::Dataset);
        let a = builder.add_stage("a", &relay, [("data", b_out.into())]);
        builder.add_stage("b", &relay, [("data", a.output("data").unwrap().into())]);

        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("closes a cycle"));
    }

    #[test]
    fn test_cycle_reported_over_earlier_forward_reference() {
        let relay = ComponentSpec::new("relay")
            .input(InputSlot::artifact("data", ContentType::Dataset))
            .output(OutputSlot::new("data", ContentType::Dataset));

        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        let y_out = ArtifactHandle::new("y", "data", ContentType::Dataset);
        builder.add_stage("x", &consumer(), [("data", y_out.into())]);
        builder.add_stage("y", &producer(), no_inputs());
        let q_out = ArtifactHandle::new("q", "data", ContentType::Dataset);
        let p = builder.add_stage("p", &relay, [("data", q_out.into())]);
        builder.add_stage("q", &relay, [("data", p.output("data").unwrap().into())]);

        let err = builder.build().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Cycle { ref stage, ref producer }
                if stage.as_str() == "p" && producer.as_str() == "q"
        ));
    }

    #[test]
    fn test_duplicate_input_slot_rejected() {
        let doubled = ComponentSpec::new("doubled")
            .input(InputSlot::artifact("data", ContentType::Dataset))
            .input(InputSlot::artifact("data", ContentType::Dataset));

        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        let first = builder.add_stage("first", &producer(), no_inputs());
        builder.add_stage("doubled", &doubled, [("data", first.output("data").unwrap().into())]);

        let err = builder.build().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DuplicateInput { ref stage, ref input }
                if stage.as_str() == "doubled" && input == "data"
        ));
    }

    #[test]
    fn test_unresolved_parameter() {
        let trainer = ComponentSpec::new("train").input(InputSlot::parameter("epochs", ParameterType::Integer));

        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        builder.add_stage("train", &trainer, [("epochs", InputBinding::parameter("epochs"))]);

        let err = builder.build().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnresolvedReference {
                reference: Reference::Parameter(ref name),
                ..
            } if name == "epochs"
        ));
    }

    #[test]
    fn test_duplicate_output_across_units() {
        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        builder.add_stage("fetch", &producer(), no_inputs());
        builder.add_stage("fetch", &producer(), no_inputs());

        let err = builder.build().unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateOutput { ref slot, .. } if slot == "data"));
    }

    #[test]
    fn test_duplicate_slot_within_unit() {
        let twice = ComponentSpec::new("twice")
            .output(OutputSlot::new("data", ContentType::Dataset))
            .output(OutputSlot::new("data", ContentType::Metrics));

        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        builder.add_stage("twice", &twice, no_inputs());

        assert!(matches!(
            builder.build(),
            Err(PipelineError::DuplicateOutput { .. })
        ));
    }

    #[test]
    fn test_duplicate_stage_without_outputs() {
        let sink = ComponentSpec::new("sink");
        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        builder.add_stage("sink", &sink, no_inputs());
        builder.add_stage("sink", &sink, no_inputs());

        assert!(matches!(builder.build(), Err(PipelineError::DuplicateStage(_))));
    }

    #[test]
    fn test_unbound_input() {
        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        builder.add_stage("consumer", &consumer(), no_inputs());

        let err = builder.build().unwrap_err();
        assert_eq!(err.to_string(), "stage 'consumer' input 'data' is never bound");
    }

    #[test]
    fn test_unknown_input() {
        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        builder.add_stage("first", &producer(), [("extra", InputBinding::literal(json!(1)))]);

        assert!(matches!(
            builder.build(),
            Err(PipelineError::UnknownInput { ref input, .. }) if input == "extra"
        ));
    }

    #[test]
    fn test_artifact_content_type_mismatch() {
        let wants_model = ComponentSpec::new("deploy").input(InputSlot::artifact("model", ContentType::Model));

        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        let first = builder.add_stage("first", &producer(), no_inputs());
        builder.add_stage("deploy", &wants_model, [("model", first.output("data").unwrap().into())]);

        let err = builder.build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "stage 'deploy' input 'model' expects model artifact, got dataset artifact"
        );
    }

    #[test]
    fn test_parameter_bound_to_artifact_slot() {
        let mut builder = PipelineBuilder::new("p", params());
        builder.add_stage("consumer", &consumer(), [("data", InputBinding::parameter("epochs"))]);

        assert!(matches!(
            builder.build(),
            Err(PipelineError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_literal_type_checked() {
        let trainer = ComponentSpec::new("train").input(InputSlot::parameter("epochs", ParameterType::Integer));

        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        builder.add_stage("train", &trainer, [("epochs", InputBinding::literal(json!("ten")))]);
        assert!(matches!(
            builder.build(),
            Err(PipelineError::TypeMismatch { .. })
        ));

        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        builder.add_stage("train", &trainer, [("epochs", InputBinding::literal(json!(10)))]);
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_integer_parameter_feeds_number_slot() {
        let scorer = ComponentSpec::new("score").input(InputSlot::parameter("threshold", ParameterType::Number));

        let mut builder = PipelineBuilder::new("p", params());
        builder.add_stage("score", &scorer, [("threshold", InputBinding::parameter("epochs"))]);
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_later_binding_wins() {
        let trainer = ComponentSpec::new("train").input(InputSlot::parameter("epochs", ParameterType::Integer));

        let mut builder = PipelineBuilder::new("p", ParameterSet::new());
        builder.add_stage(
            "train",
            &trainer,
            [
                ("epochs", InputBinding::literal(json!(1))),
                ("epochs", InputBinding::literal(json!(5))),
            ],
        );

        let dag = builder.build().unwrap();
        let node = dag.node(&StageId::new("train")).unwrap();
        assert_eq!(node.inputs[0].binding, InputBinding::literal(json!(5)));
    }
}
