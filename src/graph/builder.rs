//! Node construction.
//!
//! Building takes an already validated block and cannot fail. Collection
//! mode builds one member node per element block and wraps them in a
//! collection node.

use crate::core::descriptor::OperationDescriptor;
use crate::core::mode::Mode;
use crate::core::params::ParameterBlock;
use crate::core::source::CollectionKind;
use crate::graph::node::{Node, NodeOutput, NodeParts};
use crate::graph::properties::PropertyTable;
use crate::registry::operation::OperationRegistry;
use crate::validation::pipeline::element_blocks;
use log::debug;
use std::sync::Arc;

/// Options applied to every node a builder produces.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Populate the per-node property cache.
    pub cache_properties: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            cache_properties: true,
        }
    }
}

/// Builds nodes against one registry's property rules.
pub struct NodeBuilder<'a> {
    registry: &'a OperationRegistry,
    options: BuildOptions,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(registry: &'a OperationRegistry) -> Self {
        Self {
            registry,
            options: BuildOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Build a node from a validated block.
    pub fn build(&self, descriptor: &Arc<OperationDescriptor>, mode: Mode, block: ParameterBlock) -> Node {
        let node = match mode {
            Mode::Collection => self.build_collection(descriptor, block),
            _ => self.build_single(descriptor, mode, block),
        };
        debug!("Built node {}", node);
        node
    }

    fn build_single(&self, descriptor: &Arc<OperationDescriptor>, mode: Mode, block: ParameterBlock) -> Node {
        let layout = descriptor.derive_layout(mode, &block);
        Node::new(NodeParts {
            descriptor: Arc::clone(descriptor),
            mode,
            layout,
            output: NodeOutput::Image,
            properties: self.property_table(descriptor, mode),
            cache_properties: self.options.cache_properties,
            block,
        })
    }

    fn build_collection(&self, descriptor: &Arc<OperationDescriptor>, block: ParameterBlock) -> Node {
        let element_mode = descriptor.collection_element_mode();
        let (kind, members) = match element_blocks(&block) {
            Some((kind, blocks)) => (
                kind,
                blocks
                    .into_iter()
                    .map(|b| self.build_single(descriptor, element_mode, b))
                    .collect(),
            ),
            None => (CollectionKind::Sequence, Vec::new()),
        };
        Node::new(NodeParts {
            descriptor: Arc::clone(descriptor),
            mode: Mode::Collection,
            layout: None,
            output: NodeOutput::Collection { kind, members },
            properties: self.property_table(descriptor, Mode::Collection),
            cache_properties: self.options.cache_properties,
            block,
        })
    }

    /// Registry rules for the pair, or the descriptor's own generators if
    /// the pair is not registered.
    fn property_table(&self, descriptor: &OperationDescriptor, mode: Mode) -> Arc<PropertyTable> {
        self.registry
            .property_table(descriptor.name(), mode)
            .unwrap_or_else(|| Arc::new(PropertyTable::from_descriptor(descriptor, mode)))
    }
}
