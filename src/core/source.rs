//! Graph sources.
//!
//! A source is anything an operator can read from: a raw raster, a raw
//! resolution-independent image, an upstream node, or a group of those.

use crate::core::mode::Mode;
use crate::core::types::{ImageLayout, Layout, RenderableLayout, SampleType, Value};
use crate::graph::node::{Node, NodeOutput};
use image::{ColorType, DynamicImage};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A raw pixel-grid image supplied by the caller.
///
/// Pixel data is optional. Validation and property queries only ever look
/// at the layout and the attached properties.
#[derive(Debug, Clone)]
pub struct SourceImage {
    layout: ImageLayout,
    data: Option<Arc<DynamicImage>>,
    properties: IndexMap<String, Value>,
}

impl SourceImage {
    /// An image known only by its layout.
    pub fn new(layout: ImageLayout) -> Self {
        Self {
            layout,
            data: None,
            properties: IndexMap::new(),
        }
    }

    /// Wrap a decoded image, deriving the layout from its color type.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let color = image.color();
        let layout = ImageLayout::new(
            image.width(),
            image.height(),
            color.channel_count() as u32,
            sample_type_of(color),
        );
        Self {
            layout,
            data: Some(Arc::new(image)),
            properties: IndexMap::new(),
        }
    }

    /// Attach a property. Names are stored lowercase.
    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    pub fn data(&self) -> Option<&Arc<DynamicImage>> {
        self.data.as_ref()
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(&name.to_ascii_lowercase())
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(|k| k.as_str())
    }
}

fn sample_type_of(color: ColorType) -> SampleType {
    match color {
        ColorType::L16 | ColorType::La16 | ColorType::Rgb16 | ColorType::Rgba16 => SampleType::UShort,
        ColorType::Rgb32F | ColorType::Rgba32F => SampleType::Float,
        _ => SampleType::Byte,
    }
}

/// A raw resolution-independent image supplied by the caller.
#[derive(Debug, Clone)]
pub struct RenderableSource {
    layout: RenderableLayout,
    properties: IndexMap<String, Value>,
}

impl RenderableSource {
    pub fn new(layout: RenderableLayout) -> Self {
        Self {
            layout,
            properties: IndexMap::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn layout(&self) -> &RenderableLayout {
        &self.layout
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(&name.to_ascii_lowercase())
    }
}

/// Container category of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Ordered sequence; the fallback category.
    Sequence,
    /// Unordered group.
    Set,
    /// Last-in-first-out stack.
    Stack,
    /// A caller-defined category the graph cannot rebuild.
    External(String),
}

impl CollectionKind {
    /// Whether a collection of this category can be rebuilt by the graph.
    pub fn is_reconstructible(&self) -> bool {
        !matches!(self, CollectionKind::External(_))
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Sequence => f.write_str("sequence"),
            CollectionKind::Set => f.write_str("set"),
            CollectionKind::Stack => f.write_str("stack"),
            CollectionKind::External(name) => write!(f, "external<{}>", name),
        }
    }
}

/// A group of sources with a container category.
#[derive(Debug, Clone)]
pub struct ImageCollection {
    kind: CollectionKind,
    members: Vec<Source>,
}

impl ImageCollection {
    pub fn new(kind: CollectionKind, members: Vec<Source>) -> Self {
        Self { kind, members }
    }

    pub fn sequence(members: Vec<Source>) -> Self {
        Self::new(CollectionKind::Sequence, members)
    }

    pub fn kind(&self) -> &CollectionKind {
        &self.kind
    }

    pub fn members(&self) -> &[Source] {
        &self.members
    }

    pub(crate) fn into_members(self) -> Vec<Source> {
        self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// One entry in a parameter block's source list.
#[derive(Debug, Clone)]
pub enum Source {
    /// Raw pixel-grid image
    Image(Arc<SourceImage>),
    /// Raw resolution-independent image
    Renderable(Arc<RenderableSource>),
    /// Output of an upstream node
    Node(Node),
    /// Group of sources
    Collection(ImageCollection),
}

impl Source {
    pub fn image(image: SourceImage) -> Self {
        Source::Image(Arc::new(image))
    }

    pub fn renderable(source: RenderableSource) -> Self {
        Source::Renderable(Arc::new(source))
    }

    /// The mode this source's output is expressed in.
    pub fn mode(&self) -> Mode {
        match self {
            Source::Image(_) => Mode::PixelGrid,
            Source::Renderable(_) => Mode::ResolutionIndependent,
            Source::Node(node) => node.mode(),
            Source::Collection(_) => Mode::Collection,
        }
    }

    /// Layout without evaluating anything. Collections have none.
    pub fn layout(&self) -> Option<Layout> {
        match self {
            Source::Image(img) => Some(Layout::Grid(*img.layout())),
            Source::Renderable(r) => Some(Layout::Renderable(*r.layout())),
            Source::Node(node) => node.layout(),
            Source::Collection(_) => None,
        }
    }

    /// Property as seen by a downstream node.
    pub fn property(&self, name: &str) -> Option<Value> {
        match self {
            Source::Image(img) => img.property(name).cloned(),
            Source::Renderable(r) => r.property(name).cloned(),
            Source::Node(node) => node.property(name),
            Source::Collection(_) => None,
        }
    }

    /// Names of the properties this source can supply.
    pub fn property_names(&self) -> Vec<String> {
        match self {
            Source::Image(img) => img.property_names().map(str::to_string).collect(),
            Source::Renderable(r) => r.properties.keys().cloned().collect(),
            Source::Node(node) => node.property_names(),
            Source::Collection(_) => Vec::new(),
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        if let Source::Node(node) = self {
            Some(node)
        } else {
            None
        }
    }

    /// View this source as a collection: either a raw collection or the
    /// output of a collection-mode node.
    pub fn collection_view(&self) -> Option<(CollectionKind, Vec<Source>)> {
        match self {
            Source::Collection(c) => Some((c.kind.clone(), c.members.clone())),
            Source::Node(node) => match node.output() {
                NodeOutput::Collection { kind, members } => Some((
                    kind.clone(),
                    members.iter().cloned().map(Source::Node).collect(),
                )),
                NodeOutput::Image => None,
            },
            _ => None,
        }
    }

    /// Short description used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Source::Image(_) => "pixel_grid image".to_string(),
            Source::Renderable(_) => "resolution_independent image".to_string(),
            Source::Node(node) => format!("{} node '{}'", node.mode(), node.operation_name()),
            Source::Collection(c) => format!("{} of {}", c.kind, c.len()),
        }
    }
}

impl From<SourceImage> for Source {
    fn from(image: SourceImage) -> Self {
        Source::image(image)
    }
}

impl From<RenderableSource> for Source {
    fn from(source: RenderableSource) -> Self {
        Source::renderable(source)
    }
}

impl From<Node> for Source {
    fn from(node: Node) -> Self {
        Source::Node(node)
    }
}

impl From<ImageCollection> for Source {
    fn from(collection: ImageCollection) -> Self {
        Source::Collection(collection)
    }
}

/// What a declared source slot accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// A raster image or a pixel-grid node
    PixelGrid,
    /// A renderable image or a resolution-independent node
    ResolutionIndependent,
    /// A group whose members all match `element`
    Collection { element: Box<SourceKind>, min_len: usize },
    /// Anything
    Any,
}

impl SourceKind {
    pub fn collection_of(element: SourceKind, min_len: usize) -> Self {
        SourceKind::Collection {
            element: Box::new(element),
            min_len,
        }
    }

    /// Single-image kind matching a mode. Collection maps to `Any`.
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::PixelGrid => SourceKind::PixelGrid,
            Mode::ResolutionIndependent => SourceKind::ResolutionIndependent,
            Mode::Collection => SourceKind::Any,
        }
    }

    /// Whether a single (non-collection) source matches this kind.
    ///
    /// Collection kinds are checked member by member by the validator.
    pub fn accepts(&self, source: &Source) -> bool {
        match self {
            SourceKind::Any => true,
            SourceKind::PixelGrid => source.mode() == Mode::PixelGrid,
            SourceKind::ResolutionIndependent => source.mode() == Mode::ResolutionIndependent,
            SourceKind::Collection { .. } => source.collection_view().is_some(),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::PixelGrid => f.write_str("pixel_grid image"),
            SourceKind::ResolutionIndependent => f.write_str("resolution_independent image"),
            SourceKind::Collection { element, min_len } => {
                write!(f, "collection of at least {} {}", min_len, element)
            }
            SourceKind::Any => f.write_str("any source"),
        }
    }
}
