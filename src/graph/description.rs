//! Serializable graph descriptions.
//!
//! A description captures everything an external evaluator needs to drive
//! a node DAG: operators, modes, bound parameters, source wiring and
//! layouts, in dependency order. Producing one has no side effects.

use crate::core::error::NodeId;
use crate::core::mode::Mode;
use crate::core::source::{CollectionKind, Source};
use crate::core::types::{Layout, Value};
use crate::graph::node::Node;
use crate::graph::topology::TopologyAnalyzer;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One source entry of a described node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceDescription {
    Node { id: NodeId },
    Image { layout: Layout },
    Renderable { layout: Layout },
    Collection {
        collection: CollectionKind,
        members: Vec<SourceDescription>,
    },
}

impl SourceDescription {
    fn of(source: &Source) -> Self {
        match source {
            Source::Node(node) => SourceDescription::Node { id: node.id() },
            Source::Image(img) => SourceDescription::Image {
                layout: Layout::Grid(*img.layout()),
            },
            Source::Renderable(r) => SourceDescription::Renderable {
                layout: Layout::Renderable(*r.layout()),
            },
            Source::Collection(c) => SourceDescription::Collection {
                collection: c.kind().clone(),
                members: c.members().iter().map(SourceDescription::of).collect(),
            },
        }
    }
}

/// Serializable representation of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub id: NodeId,
    pub operation: String,
    pub mode: Mode,
    pub immediate: bool,
    pub sources: Vec<SourceDescription>,
    /// Bound parameters in declared order
    pub parameters: IndexMap<String, Value>,
    pub layout: Option<Layout>,
    /// Member nodes, for collection nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionKind>,
}

impl NodeDescription {
    pub fn of(node: &Node) -> Self {
        Self {
            id: node.id(),
            operation: node.operation_name().to_string(),
            mode: node.mode(),
            immediate: node.descriptor().is_immediate(),
            sources: node.sources().iter().map(SourceDescription::of).collect(),
            parameters: node
                .parameters()
                .named_parameters()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
            layout: node.layout(),
            members: node.members().iter().map(|m| m.id()).collect(),
            collection: node.collection_kind().cloned(),
        }
    }
}

/// Serializable representation of a node DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDescription {
    /// Description format version
    pub version: String,
    pub root: NodeId,
    /// Nodes with dependencies first
    pub nodes: Vec<NodeDescription>,
}

impl GraphDescription {
    /// Current format version.
    pub const VERSION: &'static str = "1.0.0";

    /// Describe `root` and everything it depends on.
    pub fn of(root: &Node) -> Self {
        let analyzer = TopologyAnalyzer::new(root);
        let nodes = analyzer
            .topological_sort()
            .into_iter()
            .filter_map(|id| analyzer.node(id))
            .map(NodeDescription::of)
            .collect();
        Self {
            version: Self::VERSION.to_string(),
            root: root.id(),
            nodes,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeDescription> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize to compact JSON (no whitespace).
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
