//! Topological analysis of node DAGs.
//!
//! Provides algorithms for:
//! - Topological sorting (evaluation order)
//! - Parallel batch identification
//! - Dependency analysis
//!
//! A node depends on its upstream nodes and, for collection nodes, on its
//! member nodes.

use crate::core::error::NodeId;
use crate::graph::node::Node;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};

/// Analyzer for the DAG reachable from a set of root nodes.
pub struct TopologyAnalyzer {
    nodes: IndexMap<NodeId, Node>,
    /// Direct dependencies of each node.
    dependencies: HashMap<NodeId, Vec<NodeId>>,
}

impl TopologyAnalyzer {
    /// Analyze everything reachable from `root`.
    pub fn new(root: &Node) -> Self {
        Self::from_roots(std::slice::from_ref(root))
    }

    /// Analyze everything reachable from any of `roots`.
    pub fn from_roots(roots: &[Node]) -> Self {
        let mut nodes: IndexMap<NodeId, Node> = IndexMap::new();
        let mut dependencies: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut queue: VecDeque<Node> = roots.iter().cloned().collect();

        while let Some(node) = queue.pop_front() {
            if nodes.contains_key(&node.id()) {
                continue;
            }
            let deps: Vec<Node> = node
                .upstream()
                .into_iter()
                .chain(node.members().iter().cloned())
                .collect();
            let mut ids: Vec<NodeId> = Vec::with_capacity(deps.len());
            for dep in deps {
                if !ids.contains(&dep.id()) {
                    ids.push(dep.id());
                }
                queue.push_back(dep);
            }
            dependencies.insert(node.id(), ids);
            nodes.insert(node.id(), node);
        }

        Self { nodes, dependencies }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Direct dependencies of a node.
    pub fn dependencies_of(&self, id: NodeId) -> &[NodeId] {
        self.dependencies.get(&id).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Get the topological sort order (Kahn's algorithm).
    ///
    /// Returns nodes in an order where dependencies come before dependents.
    /// Nodes can only reference nodes that existed before them, so the
    /// graph is always acyclic and every node is returned.
    pub fn topological_sort(&self) -> Vec<NodeId> {
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        for (&id, _) in &self.nodes {
            in_degree.insert(id, self.dependencies_of(id).len());
            for &dep in self.dependencies_of(id) {
                dependents.entry(dep).or_default().push(id);
            }
        }

        // Seed in discovery order so the result is deterministic
        let mut queue: VecDeque<NodeId> = self
            .nodes
            .keys()
            .filter(|id| in_degree.get(id) == Some(&0))
            .copied()
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            result.push(id);
            for &next in dependents.get(&id).map(|d| d.as_slice()).unwrap_or(&[]) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
        result
    }

    /// Group nodes into parallel evaluation batches.
    ///
    /// Nodes in the same batch don't depend on each other.
    pub fn parallel_batches(&self) -> Vec<Vec<NodeId>> {
        let sorted = self.topological_sort();
        let mut depth: HashMap<NodeId, usize> = HashMap::new();

        for &id in &sorted {
            let node_depth = self
                .dependencies_of(id)
                .iter()
                .filter_map(|dep| depth.get(dep))
                .max()
                .map(|d| d + 1)
                .unwrap_or(0);
            depth.insert(id, node_depth);
        }

        let max_depth = depth.values().max().copied().unwrap_or(0);
        let mut batches: Vec<Vec<NodeId>> = vec![Vec::new(); max_depth + 1];
        for id in sorted {
            if let Some(&d) = depth.get(&id) {
                batches[d].push(id);
            }
        }
        batches.retain(|batch| !batch.is_empty());
        batches
    }

    /// Length of the longest dependency chain below a node.
    ///
    /// Depth 0 = no dependencies
    pub fn node_depth(&self, id: NodeId) -> Option<usize> {
        if !self.nodes.contains_key(&id) {
            return None;
        }
        let batches = self.parallel_batches();
        batches.iter().position(|batch| batch.contains(&id))
    }

    /// Nodes whose dependencies are all in `evaluated`.
    pub fn ready_to_evaluate(&self, evaluated: &HashSet<NodeId>) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|id| {
                !evaluated.contains(id)
                    && self
                        .dependencies_of(**id)
                        .iter()
                        .all(|dep| evaluated.contains(dep))
            })
            .copied()
            .collect()
    }

    /// Get the critical path length (longest path through the graph).
    pub fn critical_path_length(&self) -> usize {
        self.parallel_batches().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::OperationDescriptor;
    use crate::core::mode::Mode;
    use crate::core::params::ParameterBlock;
    use crate::core::source::{ImageCollection, SourceImage};
    use crate::core::types::{ImageLayout, SampleType};
    use crate::graph::builder::NodeBuilder;
    use crate::registry::operation::OperationRegistry;
    use std::sync::Arc;

    fn unary() -> Arc<OperationDescriptor> {
        Arc::new(
            OperationDescriptor::builder("Invert")
                .modes(Mode::ALL)
                .source("source0")
                .build()
                .unwrap(),
        )
    }

    fn binary() -> Arc<OperationDescriptor> {
        Arc::new(
            OperationDescriptor::builder("Add")
                .modes([Mode::PixelGrid])
                .source("source0")
                .source("source1")
                .build()
                .unwrap(),
        )
    }

    fn image() -> SourceImage {
        SourceImage::new(ImageLayout::new(4, 4, 1, SampleType::Byte))
    }

    #[test]
    fn test_topological_sort_diamond() {
        let registry = OperationRegistry::new();
        let builder = NodeBuilder::new(&registry);
        let a = builder.build(&unary(), Mode::PixelGrid, ParameterBlock::new().with_source(image()));
        let b = builder.build(&unary(), Mode::PixelGrid, ParameterBlock::new().with_source(a.clone()));
        let c = builder.build(&unary(), Mode::PixelGrid, ParameterBlock::new().with_source(a.clone()));
        let d = builder.build(
            &binary(),
            Mode::PixelGrid,
            ParameterBlock::new().with_source(b.clone()).with_source(c.clone()),
        );

        let analyzer = TopologyAnalyzer::new(&d);
        assert_eq!(analyzer.node_count(), 4);
        let sorted = analyzer.topological_sort();
        let pos = |n: &Node| sorted.iter().position(|&id| id == n.id()).unwrap();
        assert!(pos(&a) < pos(&b));
        assert!(pos(&a) < pos(&c));
        assert!(pos(&b) < pos(&d));
        assert!(pos(&c) < pos(&d));

        let batches = analyzer.parallel_batches();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec![a.id()]);
        assert_eq!(batches[1].len(), 2);
        assert_eq!(analyzer.node_depth(d.id()), Some(2));
        assert_eq!(analyzer.critical_path_length(), 3);
    }

    #[test]
    fn test_independent_leaves_sort_in_source_order() {
        let registry = OperationRegistry::new();
        let builder = NodeBuilder::new(&registry);
        let first = builder.build(&unary(), Mode::PixelGrid, ParameterBlock::new().with_source(image()));
        let second = builder.build(&unary(), Mode::PixelGrid, ParameterBlock::new().with_source(image()));
        let sum = builder.build(
            &binary(),
            Mode::PixelGrid,
            ParameterBlock::new().with_source(first.clone()).with_source(second.clone()),
        );

        let sorted = TopologyAnalyzer::new(&sum).topological_sort();
        assert_eq!(sorted, vec![first.id(), second.id(), sum.id()]);
    }

    #[test]
    fn test_ready_to_evaluate() {
        let registry = OperationRegistry::new();
        let builder = NodeBuilder::new(&registry);
        let a = builder.build(&unary(), Mode::PixelGrid, ParameterBlock::new().with_source(image()));
        let b = builder.build(&unary(), Mode::PixelGrid, ParameterBlock::new().with_source(a.clone()));

        let analyzer = TopologyAnalyzer::new(&b);
        assert_eq!(analyzer.ready_to_evaluate(&HashSet::new()), vec![a.id()]);
        let mut evaluated = HashSet::new();
        evaluated.insert(a.id());
        assert_eq!(analyzer.ready_to_evaluate(&evaluated), vec![b.id()]);
    }

    #[test]
    fn test_collection_members_are_dependencies() {
        let registry = OperationRegistry::new();
        let builder = NodeBuilder::new(&registry);
        let collection = ImageCollection::sequence(vec![image().into(), image().into()]);
        let node = builder.build(&unary(), Mode::Collection, ParameterBlock::new().with_source(collection));

        let analyzer = TopologyAnalyzer::new(&node);
        assert_eq!(analyzer.node_count(), 3);
        assert_eq!(analyzer.dependencies_of(node.id()).len(), 2);
        assert_eq!(analyzer.topological_sort().last(), Some(&node.id()));
    }
}
