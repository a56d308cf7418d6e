//! The emitted graph document.
//!
//! A [`GraphDocument`] is the JSON-like node map handed to the external
//! graph-execution engine: an optional version plus an ordered `nodes` map.
//! Each node is either an immutable `{value: ...}` binding or a computed
//! `{agent: ..., inputs?, graph?, isResult?}` node. A `:name` string
//! anywhere inside `inputs` or `graph` references a sibling node or a
//! capture input declared on an enclosing nested node.
//!
//! Key order is preserved end to end (`indexmap` plus `serde_json`'s
//! `preserve_order`), so serializing the same source twice yields identical
//! bytes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The compiled output for one graph or nested sub-graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<f64>,
    pub nodes: IndexMap<String, NodeDocument>,
}

impl GraphDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// The document as a `serde_json::Value`.
    pub fn to_json_value(&self) -> Value {
        serde_json::to_value(self).expect("graph documents always serialize")
    }

    /// The document as a compact JSON string.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).expect("graph documents always serialize")
    }

    /// The document as a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("graph documents always serialize")
    }
}

/// One node of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeDocument {
    Agent(AgentNode),
    Value(ValueNode),
}

impl NodeDocument {
    pub fn is_result(&self) -> Option<bool> {
        match self {
            NodeDocument::Agent(node) => node.is_result,
            NodeDocument::Value(node) => node.is_result,
        }
    }

    pub(crate) fn set_is_result(&mut self, flag: bool) {
        match self {
            NodeDocument::Agent(node) => node.is_result = Some(flag),
            NodeDocument::Value(node) => node.is_result = Some(flag),
        }
    }

    /// Merge an annotation-derived key into the node.
    pub(crate) fn set_extra(&mut self, key: String, value: Value) {
        match self {
            NodeDocument::Agent(node) => {
                node.extra.insert(key, value);
            }
            NodeDocument::Value(node) => {
                node.extra.insert(key, value);
            }
        }
    }
}

/// An immutable binding: `{value: <json>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueNode {
    pub value: Value,
    #[serde(rename = "isResult", default, skip_serializing_if = "Option::is_none")]
    pub is_result: Option<bool>,
    /// Annotation-derived keys.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ValueNode {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            is_result: None,
            extra: IndexMap::new(),
        }
    }
}

/// A computed node: an agent call, possibly carrying a nested sub-graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentNode {
    /// A bare native-agent name, or a `:name` reference to a node holding
    /// an agent definition.
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<Box<GraphDocument>>,
    #[serde(rename = "isResult", default, skip_serializing_if = "Option::is_none")]
    pub is_result: Option<bool>,
    /// Annotation-derived keys.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl AgentNode {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            inputs: None,
            graph: None,
            is_result: None,
            extra: IndexMap::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Value) -> Self {
        self.inputs = Some(inputs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_node_serializes_minimally() {
        let mut doc = GraphDocument::new();
        doc.nodes
            .insert("a".to_string(), NodeDocument::Value(ValueNode::new(json!(1))));
        assert_eq!(doc.to_json_value(), json!({"nodes": {"a": {"value": 1}}}));
    }

    #[test]
    fn agent_node_serializes_with_inputs_and_flag() {
        let mut node = AgentNode::new("identity").with_inputs(json!({"x": ":a"}));
        node.is_result = Some(true);
        let mut doc = GraphDocument::new();
        doc.nodes.insert("b".to_string(), NodeDocument::Agent(node));
        assert_eq!(
            doc.to_json_value(),
            json!({"nodes": {"b": {"agent": "identity", "inputs": {"x": ":a"}, "isResult": true}}})
        );
    }

    #[test]
    fn version_appears_when_present() {
        let mut doc = GraphDocument::new();
        doc.version = Some(0.6);
        assert_eq!(doc.to_json_value(), json!({"version": 0.6, "nodes": {}}));
    }

    #[test]
    fn annotation_keys_flatten_into_the_node() {
        let mut node = NodeDocument::Agent(AgentNode::new("identity"));
        node.set_extra("console".to_string(), json!({"after": true}));
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({"agent": "identity", "console": {"after": true}})
        );
    }

    #[test]
    fn documents_round_trip_through_json() {
        let mut doc = GraphDocument::new();
        doc.nodes.insert(
            "a".to_string(),
            NodeDocument::Agent(AgentNode::new("identity").with_inputs(json!(":b"))),
        );
        doc.nodes
            .insert("b".to_string(), NodeDocument::Value(ValueNode::new(json!("x"))));
        let text = doc.to_json_string();
        let back: GraphDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }
}
