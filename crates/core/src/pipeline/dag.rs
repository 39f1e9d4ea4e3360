use crate::error::{PipelineError, Result};
use crate::params::ParameterSet;
use crate::secrets::SecretKeyRef;
use crate::stage::{ComponentSpec, InputBinding};
use crate::types::StageId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{EdgeRef, Topo};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// An input after resolution, in the order the stage declares its inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedInput {
    pub name: String,
    pub binding: InputBinding,
}

/// Per-node execution metadata handed to the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Environment variable name -> secret key it is populated from
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secret_env: BTreeMap<String, SecretKeyRef>,
}

/// A stage as it sits in the finalized graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageNode {
    pub id: StageId,
    pub component: ComponentSpec,
    pub inputs: Vec<ResolvedInput>,
    #[serde(default)]
    pub context: ExecutionContext,
}

/// Producer output -> consumer input
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: StageId,
    pub to: StageId,
    pub output: String,
    pub input: String,
}

#[derive(Debug, Clone)]
pub(crate) struct EdgeLabel {
    pub(crate) output: String,
    pub(crate) input: String,
}

/// Serializable form of a finalized graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: ParameterSet,
    pub nodes: Vec<StageNode>,
    pub edges: Vec<Edge>,
    pub order: Vec<StageId>,
}

/// DAG representation of a pipeline
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    name: String,
    description: Option<String>,
    parameters: ParameterSet,
    graph: DiGraph<StageNode, EdgeLabel>,
    stage_indices: HashMap<StageId, NodeIndex>,
    order: Vec<StageId>,
}

impl PipelineGraph {
    /// Wrap an already validated, acyclic graph
    pub(crate) fn from_parts(
        name: String,
        description: Option<String>,
        parameters: ParameterSet,
        graph: DiGraph<StageNode, EdgeLabel>,
    ) -> Self {
        let stage_indices = graph
            .node_indices()
            .map(|n| (graph[n].id.clone(), n))
            .collect();

        let mut topo = Topo::new(&graph);
        let mut order = Vec::with_capacity(graph.node_count());
        while let Some(node) = topo.next(&graph) {
            order.push(graph[node].id.clone());
        }

        Self {
            name,
            description,
            parameters,
            graph,
            stage_indices,
            order,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, stage_id: &StageId) -> bool {
        self.stage_indices.contains_key(stage_id)
    }

    pub fn node(&self, stage_id: &StageId) -> Option<&StageNode> {
        self.stage_indices.get(stage_id).map(|n| &self.graph[*n])
    }

    pub(crate) fn node_mut(&mut self, stage_id: &StageId) -> Option<&mut StageNode> {
        let node = *self.stage_indices.get(stage_id)?;
        self.graph.node_weight_mut(node)
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &StageNode> {
        self.graph.node_indices().map(move |n| &self.graph[n])
    }

    /// Stages in topological order (producers first)
    pub fn topological_order(&self) -> &[StageId] {
        &self.order
    }

    /// Stages whose outputs the given stage consumes
    pub fn dependencies(&self, stage_id: &StageId) -> Result<Vec<StageId>> {
        self.neighbors(stage_id, Direction::Incoming)
    }

    /// Stages consuming outputs of the given stage
    pub fn dependents(&self, stage_id: &StageId) -> Result<Vec<StageId>> {
        self.neighbors(stage_id, Direction::Outgoing)
    }

    fn neighbors(&self, stage_id: &StageId, direction: Direction) -> Result<Vec<StageId>> {
        let node = self
            .stage_indices
            .get(stage_id)
            .ok_or_else(|| PipelineError::NodeNotFound(stage_id.clone()))?;

        let mut indices: Vec<NodeIndex> = self.graph.neighbors_directed(*node, direction).collect();
        indices.sort();
        indices.dedup();

        Ok(indices.into_iter().map(|n| self.graph[n].id.clone()).collect())
    }

    /// Stages with no upstream producers
    pub fn entry_stages(&self) -> Vec<StageId> {
        self.graph
            .node_indices()
            .filter(|&n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .count()
                    == 0
            })
            .map(|n| self.graph[n].id.clone())
            .collect()
    }

    /// One edge per consumed output slot, in the order bindings were resolved
    pub fn edges(&self) -> Vec<Edge> {
        self.graph
            .edge_references()
            .map(|e| Edge {
                from: self.graph[e.source()].id.clone(),
                to: self.graph[e.target()].id.clone(),
                output: e.weight().output.clone(),
                input: e.weight().input.clone(),
            })
            .collect()
    }

    /// Distinct stage-to-stage dependencies
    pub fn node_edges(&self) -> Vec<(StageId, StageId)> {
        let mut pairs: Vec<(StageId, StageId)> = Vec::new();
        for edge in self.edges() {
            let pair = (edge.from, edge.to);
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
        pairs
    }

    pub fn to_spec(&self) -> PipelineSpec {
        PipelineSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            nodes: self.nodes().cloned().collect(),
            edges: self.edges(),
            order: self.order.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineBuilder;
    use crate::stage::{InputSlot, OutputSlot};
    use crate::types::ContentType;

    fn source() -> ComponentSpec {
        ComponentSpec::new("source").output(OutputSlot::new("data", ContentType::Dataset))
    }

    fn join() -> ComponentSpec {
        ComponentSpec::new("join")
            .input(InputSlot::artifact("left", ContentType::Dataset))
            .input(InputSlot::artifact("right", ContentType::Dataset))
            .output(OutputSlot::new("data", ContentType::Dataset))
    }

    fn diamond() -> PipelineGraph {
        let mut builder = PipelineBuilder::new("diamond", ParameterSet::new());
        let a = builder.add_stage("a", &source(), Vec::<(&str, InputBinding)>::new());
        let b = builder.add_stage("b", &source(), Vec::<(&str, InputBinding)>::new());
        let c = builder.add_stage(
            "c",
            &join(),
            [
                ("left", a.output("data").unwrap().into()),
                ("right", b.output("data").unwrap().into()),
            ],
        );
        builder.add_stage(
            "d",
            &join(),
            [
                ("left", c.output("data").unwrap().into()),
                ("right", c.output("data").unwrap().into()),
            ],
        );
        builder.build().unwrap()
    }

    #[test]
    fn test_entry_stages() {
        let dag = diamond();
        assert_eq!(dag.entry_stages(), vec![StageId::new("a"), StageId::new("b")]);
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let dag = diamond();

        let deps = dag.dependencies(&StageId::new("c")).unwrap();
        assert_eq!(deps, vec![StageId::new("a"), StageId::new("b")]);

        // Two slot edges from c to d collapse into one dependency
        let deps = dag.dependencies(&StageId::new("d")).unwrap();
        assert_eq!(deps, vec![StageId::new("c")]);

        let dependents = dag.dependents(&StageId::new("a")).unwrap();
        assert_eq!(dependents, vec![StageId::new("c")]);
    }

    #[test]
    fn test_unknown_stage_lookup() {
        let dag = diamond();
        let result = dag.dependencies(&StageId::new("missing"));
        assert!(matches!(result, Err(PipelineError::NodeNotFound(_))));
    }

    #[test]
    fn test_edges_per_slot_and_per_pair() {
        let dag = diamond();

        assert_eq!(dag.edges().len(), 4);
        assert_eq!(
            dag.node_edges(),
            vec![
                (StageId::new("a"), StageId::new("c")),
                (StageId::new("b"), StageId::new("c")),
                (StageId::new("c"), StageId::new("d")),
            ]
        );
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let dag = diamond();
        let order = dag.topological_order();
        assert_eq!(order.len(), 4);

        let position = |id: &str| order.iter().position(|s| s.as_str() == id).unwrap();
        for edge in dag.edges() {
            assert!(position(edge.from.as_str()) < position(edge.to.as_str()));
        }
    }

    #[test]
    fn test_spec_nodes_in_declaration_order() {
        let spec = diamond().to_spec();
        let ids: Vec<&str> = spec.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(spec.name, "diamond");
    }

    #[test]
    fn test_graph_accessors() {
        let dag = diamond();
        assert_eq!(dag.name(), "diamond");
        assert_eq!(dag.description(), None);
        assert_eq!(dag.len(), 4);
        assert!(!dag.is_empty());
        assert!(dag.contains(&StageId::new("c")));
        assert!(!dag.contains(&StageId::new("missing")));

        let empty = PipelineBuilder::new("empty", ParameterSet::new())
            .description("nothing to run")
            .build()
            .unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.description(), Some("nothing to run"));
        assert!(empty.topological_order().is_empty());
    }
}
