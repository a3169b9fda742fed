//! Deferred graph nodes.
//!
//! A node records an operator applied to a validated parameter block. It
//! never computes pixels on its own; evaluation is driven from outside
//! through the engine's renderer. Nodes are immutable once built and cheap
//! to clone, so they can be shared across threads and used as sources of
//! further nodes. Because a node can only reference nodes that already
//! exist, every graph is acyclic.

use crate::core::descriptor::OperationDescriptor;
use crate::core::error::NodeId;
use crate::core::mode::Mode;
use crate::core::params::ParameterBlock;
use crate::core::source::{CollectionKind, Source};
use crate::core::types::{Layout, Value};
use crate::graph::properties::PropertyTable;
use image::DynamicImage;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// What a node produces.
#[derive(Debug, Clone)]
pub enum NodeOutput {
    /// A single image in the node's mode
    Image,
    /// One member node per collection element
    Collection {
        kind: CollectionKind,
        members: Vec<Node>,
    },
}

/// Everything a node is built from.
pub(crate) struct NodeParts {
    pub descriptor: Arc<OperationDescriptor>,
    pub mode: Mode,
    pub block: ParameterBlock,
    pub layout: Option<Layout>,
    pub output: NodeOutput,
    pub properties: Arc<PropertyTable>,
    pub cache_properties: bool,
}

struct NodeInner {
    id: NodeId,
    descriptor: Arc<OperationDescriptor>,
    mode: Mode,
    block: ParameterBlock,
    layout: Option<Layout>,
    output: NodeOutput,
    properties: Arc<PropertyTable>,
    cache_properties: bool,
    property_cache: RwLock<HashMap<String, Option<Value>>>,
    rendering: OnceLock<Arc<DynamicImage>>,
}

impl NodeInner {
    /// Detach every upstream node and collection member.
    fn take_upstream(&mut self) -> Vec<Source> {
        let mut taken = self.block.take_sources();
        if let NodeOutput::Collection { members, .. } = &mut self.output {
            taken.extend(members.drain(..).map(Source::Node));
        }
        taken
    }
}

impl Drop for NodeInner {
    // Unlinks uniquely owned upstream nodes with an explicit stack.
    fn drop(&mut self) {
        let mut pending = self.take_upstream();
        while let Some(source) = pending.pop() {
            match source {
                Source::Node(node) => {
                    if let Ok(mut inner) = Arc::try_unwrap(node.0) {
                        pending.extend(inner.take_upstream());
                    }
                }
                Source::Collection(collection) => pending.extend(collection.into_members()),
                Source::Image(_) | Source::Renderable(_) => {}
            }
        }
    }
}

/// A deferred graph node.
///
/// Cloning shares the node; identity is preserved.
///
/// Property inheritance asks each upstream level in turn, so a lookup that
/// falls through a chain tens of thousands of nodes deep can exhaust the
/// thread's stack. Dropping such a chain is safe.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl Node {
    pub(crate) fn new(parts: NodeParts) -> Self {
        Self(Arc::new(NodeInner {
            id: NodeId::new(),
            descriptor: parts.descriptor,
            mode: parts.mode,
            block: parts.block,
            layout: parts.layout,
            output: parts.output,
            properties: parts.properties,
            cache_properties: parts.cache_properties,
            property_cache: RwLock::new(HashMap::new()),
            rendering: OnceLock::new(),
        }))
    }

    /// Stable identity, suitable as an evaluation cache key.
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn descriptor(&self) -> &Arc<OperationDescriptor> {
        &self.0.descriptor
    }

    pub fn operation_name(&self) -> &str {
        self.0.descriptor.name()
    }

    pub fn mode(&self) -> Mode {
        self.0.mode
    }

    /// The validated, fully defaulted parameter block.
    pub fn parameters(&self) -> &ParameterBlock {
        &self.0.block
    }

    pub fn sources(&self) -> &[Source] {
        self.0.block.sources()
    }

    /// Nodes this node reads from, including nodes inside source
    /// collections, in source order.
    pub fn upstream(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        for source in self.sources() {
            collect_nodes(source, &mut nodes);
        }
        nodes
    }

    /// Output layout, computed at build time. Collection nodes have none.
    pub fn layout(&self) -> Option<Layout> {
        self.0.layout
    }

    pub fn output(&self) -> &NodeOutput {
        &self.0.output
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.0.output, NodeOutput::Collection { .. })
    }

    /// Member nodes of a collection node; empty otherwise.
    pub fn members(&self) -> &[Node] {
        match &self.0.output {
            NodeOutput::Collection { members, .. } => members,
            NodeOutput::Image => &[],
        }
    }

    pub fn collection_kind(&self) -> Option<&CollectionKind> {
        match &self.0.output {
            NodeOutput::Collection { kind, .. } => Some(kind),
            NodeOutput::Image => None,
        }
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Look up a property. `None` means no information is available.
    ///
    /// Results are cached per node. Concurrent first lookups may both
    /// compute; property computation is pure, so every caller observes an
    /// equal value.
    pub fn property(&self, name: &str) -> Option<Value> {
        let key = name.to_ascii_lowercase();
        if self.0.cache_properties {
            if let Some(cached) = self.0.property_cache.read().get(&key) {
                return cached.clone();
            }
        }

        let value = self.0.properties.resolve(self, &key);

        if self.0.cache_properties {
            self.0
                .property_cache
                .write()
                .entry(key)
                .or_insert(value)
                .clone()
        } else {
            value
        }
    }

    /// Names of the properties this node can resolve.
    pub fn property_names(&self) -> Vec<String> {
        self.0.properties.names(self)
    }

    /// Number of cached property lookups.
    pub fn cached_property_count(&self) -> usize {
        self.0.property_cache.read().len()
    }

    // ========================================================================
    // Rendering slot
    // ========================================================================

    /// Rendering produced by an earlier evaluation, if any.
    pub fn rendering(&self) -> Option<Arc<DynamicImage>> {
        self.0.rendering.get().cloned()
    }

    /// Store a rendering. The first stored rendering wins and is returned.
    pub(crate) fn store_rendering(&self, image: Arc<DynamicImage>) -> Arc<DynamicImage> {
        Arc::clone(self.0.rendering.get_or_init(|| image))
    }

    /// Whether two handles refer to the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn collect_nodes(source: &Source, nodes: &mut Vec<Node>) {
    match source {
        Source::Node(node) => nodes.push(node.clone()),
        Source::Collection(collection) => {
            for member in collection.members() {
                collect_nodes(member, nodes);
            }
        }
        Source::Image(_) | Source::Renderable(_) => {}
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.0.id)
            .field("operation", &self.operation_name())
            .field("mode", &self.0.mode)
            .field("sources", &self.0.block.num_sources())
            .field("members", &self.members().len())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] ({})", self.operation_name(), self.0.id, self.0.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mode::ModeSet;
    use crate::core::source::{ImageCollection, SourceImage};
    use crate::core::types::{ImageLayout, SampleType};
    use crate::graph::properties::PropertyGenerator;
    use image::GrayImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn leaf(table: PropertyTable, cache: bool) -> Node {
        let descriptor = OperationDescriptor::builder("Pattern")
            .modes([Mode::PixelGrid])
            .build()
            .unwrap();
        Node::new(NodeParts {
            descriptor: Arc::new(descriptor),
            mode: Mode::PixelGrid,
            block: ParameterBlock::new(),
            layout: Some(Layout::Grid(ImageLayout::new(4, 2, 1, SampleType::Byte))),
            output: NodeOutput::Image,
            properties: Arc::new(table),
            cache_properties: cache,
        })
    }

    fn counting_table(counter: Arc<AtomicUsize>) -> PropertyTable {
        let mut table = PropertyTable::new();
        table.add_generator(PropertyGenerator::new("count", &["answer"], ModeSet::all(), move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(Value::Integer(42))
        }));
        table
    }

    #[test]
    fn test_property_cache() {
        let counter = Arc::new(AtomicUsize::new(0));
        let node = leaf(counting_table(Arc::clone(&counter)), true);
        assert_eq!(node.property("answer"), Some(Value::Integer(42)));
        assert_eq!(node.property("ANSWER"), Some(Value::Integer(42)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(node.property("unknown"), None);
        assert_eq!(node.cached_property_count(), 2);
    }

    #[test]
    fn test_property_cache_disabled() {
        let counter = Arc::new(AtomicUsize::new(0));
        let node = leaf(counting_table(Arc::clone(&counter)), false);
        node.property("answer");
        node.property("answer");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(node.cached_property_count(), 0);
    }

    #[test]
    fn test_synthetic_properties() {
        let node = leaf(PropertyTable::new(), true);
        assert_eq!(node.property("image_width"), Some(Value::Integer(4)));
        assert_eq!(node.property("image_height"), Some(Value::Integer(2)));
        assert!(node.property_names().contains(&"image_min_x_coord".to_string()));
    }

    #[test]
    fn test_identity_and_rendering_slot() {
        let node = leaf(PropertyTable::new(), true);
        let same = node.clone();
        let other = leaf(PropertyTable::new(), true);
        assert_eq!(node, same);
        assert_ne!(node, other);
        assert_eq!(node.id(), same.id());

        assert!(node.rendering().is_none());
        let first = Arc::new(DynamicImage::ImageLuma8(GrayImage::new(1, 1)));
        let second = Arc::new(DynamicImage::ImageLuma8(GrayImage::new(2, 2)));
        node.store_rendering(Arc::clone(&first));
        let kept = same.store_rendering(second);
        assert!(Arc::ptr_eq(&kept, &first));
    }

    #[test]
    fn test_upstream_includes_collection_members() {
        let a = leaf(PropertyTable::new(), true);
        let b = leaf(PropertyTable::new(), true);
        let descriptor = OperationDescriptor::builder("AddCollection")
            .modes([Mode::PixelGrid])
            .build()
            .unwrap();
        let raw = SourceImage::new(ImageLayout::new(1, 1, 1, SampleType::Byte));
        let block = ParameterBlock::new()
            .with_source(ImageCollection::sequence(vec![a.clone().into(), raw.into()]))
            .with_source(b.clone());
        let node = Node::new(NodeParts {
            descriptor: Arc::new(descriptor),
            mode: Mode::PixelGrid,
            block,
            layout: None,
            output: NodeOutput::Image,
            properties: Arc::new(PropertyTable::new()),
            cache_properties: true,
        });
        assert_eq!(node.upstream(), vec![a, b]);
    }

    fn wrap(source: Node) -> Node {
        let descriptor = OperationDescriptor::builder("Invert")
            .modes([Mode::PixelGrid])
            .source("source0")
            .build()
            .unwrap();
        Node::new(NodeParts {
            descriptor: Arc::new(descriptor),
            mode: Mode::PixelGrid,
            block: ParameterBlock::new().with_source(source),
            layout: None,
            output: NodeOutput::Image,
            properties: Arc::new(PropertyTable::new()),
            cache_properties: false,
        })
    }

    #[test]
    fn test_deep_chain_drops_without_recursion() {
        let mut tip = leaf(PropertyTable::new(), true);
        for _ in 0..200_000 {
            tip = wrap(tip);
        }
        drop(tip);
    }

    #[test]
    fn test_shared_upstream_survives_drop() {
        let base = leaf(PropertyTable::new(), true);
        let mut tip = wrap(base.clone());
        for _ in 0..100 {
            tip = wrap(tip);
        }
        assert_eq!(tip.property("image_width"), Some(Value::Integer(4)));
        drop(tip);
        assert_eq!(base.property("image_width"), Some(Value::Integer(4)));
    }

    #[test]
    fn test_inherited_lookup_through_a_long_chain() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut tip = leaf(counting_table(Arc::clone(&counter)), true);
        for _ in 0..500 {
            tip = wrap(tip);
        }
        assert_eq!(tip.property("answer"), Some(Value::Integer(42)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
