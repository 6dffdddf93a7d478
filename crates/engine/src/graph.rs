//! Declarative graph model
//!
//! A [`Graph`] is plain data: nodes with an operator type id, a parameter
//! bag and named source references. It derives `serde` traits so loaders
//! can read it from any format; validation happens when a
//! [`GraphContext`](crate::GraphContext) is built.

use serde::{Deserialize, Serialize};

use rasterflow_core::{ParamValue, Parameters};

/// Named reference from a node to another node id or an external input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSource {
    pub name: String,
    pub node: String,
}

/// One node of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<NodeSource>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operator: operator.into(),
            parameters: Parameters::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    /// Add a source reference called `name` pointing at `node`
    pub fn with_source(mut self, name: impl Into<String>, node: impl Into<String>) -> Self {
        self.sources.push(NodeSource {
            name: name.into(),
            node: node.into(),
        });
        self
    }
}

/// Ordered set of nodes plus the ids marked as outputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    /// Explicit outputs; when empty, nodes without consumers are outputs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: GraphNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_output(mut self, id: impl Into<String>) -> Self {
        self.outputs.push(id.into());
        self
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_lookup() {
        let graph = Graph::new()
            .with_node(GraphNode::new("A", "Constant").with_param("value", 100.0))
            .with_node(GraphNode::new("B", "Scale").with_param("factor", 2.0).with_source("source", "A"))
            .with_output("B");
        assert_eq!(graph.node("B").unwrap().sources[0].node, "A");
        assert!(graph.node("C").is_none());
    }

    #[test]
    fn json_description() {
        let json = r#"{
            "nodes": [
                {"id": "A", "operator": "Constant", "parameters": {"width": 4, "value": 100.0}},
                {"id": "B", "operator": "Scale", "parameters": {"factor": 2},
                 "sources": [{"name": "source", "node": "A"}]}
            ]
        }"#;
        let graph: Graph = serde_json::from_str(json).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.outputs.is_empty());
        assert_eq!(
            graph.nodes[0].parameters.get("width"),
            Some(&ParamValue::Int(4))
        );
        let back: Graph = serde_json::from_str(&serde_json::to_string(&graph).unwrap()).unwrap();
        assert_eq!(back, graph);
    }
}
