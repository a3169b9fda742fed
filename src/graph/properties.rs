//! Property generation.
//!
//! Properties are named metadata attached to nodes, derived on demand from
//! the node's descriptor, parameters, layout and upstream properties. No
//! property computation ever evaluates pixels.
//!
//! A node resolves a property name in this order:
//! 1. suppressed names resolve to nothing
//! 2. synthetic layout properties (`image_width` and friends)
//! 3. copy-from-source directives
//! 4. generators in registration order, first defined value wins
//! 5. inheritance from sources in index order, first defined value wins

use crate::core::descriptor::OperationDescriptor;
use crate::core::mode::{Mode, ModeSet};
use crate::core::types::{Layout, Value};
use crate::graph::node::Node;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Width of the node's pixel grid.
pub const IMAGE_WIDTH: &str = "image_width";
/// Height of the node's pixel grid.
pub const IMAGE_HEIGHT: &str = "image_height";
/// Minimum x coordinate of the node's pixel grid.
pub const IMAGE_MIN_X: &str = "image_min_x_coord";
/// Minimum y coordinate of the node's pixel grid.
pub const IMAGE_MIN_Y: &str = "image_min_y_coord";

const SYNTHETIC: [&str; 4] = [IMAGE_WIDTH, IMAGE_HEIGHT, IMAGE_MIN_X, IMAGE_MIN_Y];

/// Function computing one property of a node.
pub type PropertyFn = Arc<dyn Fn(&str, &Node) -> Option<Value> + Send + Sync>;

/// Produces a fixed set of property names for nodes of some modes.
#[derive(Clone)]
pub struct PropertyGenerator {
    label: String,
    names: Vec<String>,
    modes: ModeSet,
    compute: PropertyFn,
}

impl PropertyGenerator {
    pub fn new<F>(label: impl Into<String>, names: &[&str], modes: ModeSet, compute: F) -> Self
    where
        F: Fn(&str, &Node) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            names: names.iter().map(|n| n.to_ascii_lowercase()).collect(),
            modes,
            compute: Arc::new(compute),
        }
    }

    /// A generator that always yields `value` for `name`.
    pub fn constant(name: &str, value: Value, modes: ModeSet) -> Self {
        Self::new(format!("constant:{}", name), &[name], modes, move |_, _| Some(value.clone()))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Produced names, lowercase.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn produces(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn applies_to(&self, mode: Mode) -> bool {
        self.modes.contains(mode)
    }

    /// Compute `name` for `node`. `None` means undefined.
    pub fn compute(&self, name: &str, node: &Node) -> Option<Value> {
        (self.compute)(name, node)
    }
}

impl fmt::Debug for PropertyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyGenerator")
            .field("label", &self.label)
            .field("names", &self.names)
            .field("modes", &self.modes)
            .finish()
    }
}

/// Resolution rules for one (operator, mode) pair.
///
/// Nodes capture an `Arc` of the table in force when they were built, so
/// later registry changes never affect existing nodes.
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    generators: Vec<PropertyGenerator>,
    copies: Vec<(String, usize)>,
    suppressed: HashSet<String>,
    exempt: HashSet<String>,
    suppress_all: bool,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the descriptor's generators for `mode`.
    pub fn from_descriptor(descriptor: &OperationDescriptor, mode: Mode) -> Self {
        Self {
            generators: descriptor.property_generators(mode).cloned().collect(),
            ..Self::default()
        }
    }

    /// Append a generator. Its names are no longer suppressed.
    pub fn add_generator(&mut self, generator: PropertyGenerator) {
        for name in generator.names() {
            self.suppressed.remove(name);
            self.exempt.insert(name.clone());
        }
        self.generators.push(generator);
    }

    /// Take `name` from the source at `source_index`, ahead of generators.
    pub fn copy_from_source(&mut self, name: &str, source_index: usize) {
        self.copies.push((name.to_ascii_lowercase(), source_index));
    }

    pub fn suppress(&mut self, name: &str) {
        let name = name.to_ascii_lowercase();
        self.exempt.remove(&name);
        self.suppressed.insert(name);
    }

    /// Suppress every property, including inherited ones.
    pub fn suppress_all(&mut self) {
        self.suppress_all = true;
        self.exempt.clear();
    }

    pub fn is_suppressed(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.suppressed.contains(&name) || (self.suppress_all && !self.exempt.contains(&name))
    }

    pub fn generators(&self) -> &[PropertyGenerator] {
        &self.generators
    }

    /// Resolve `name` for `node`, bypassing the node's cache.
    pub fn resolve(&self, node: &Node, name: &str) -> Option<Value> {
        if self.is_suppressed(name) {
            return None;
        }
        if let Some(value) = synthetic(node.layout(), name) {
            return Some(value);
        }
        for (copied, index) in &self.copies {
            if copied.eq_ignore_ascii_case(name) {
                if let Some(value) = node.sources().get(*index).and_then(|s| s.property(name)) {
                    return Some(value);
                }
            }
        }
        for generator in &self.generators {
            if generator.applies_to(node.mode()) && generator.produces(name) {
                if let Some(value) = generator.compute(name, node) {
                    return Some(value);
                }
            }
        }
        node.sources().iter().find_map(|s| s.property(name))
    }

    /// Names this table can resolve for `node`, lowercase and deduplicated.
    pub fn names(&self, node: &Node) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            let name = name.to_ascii_lowercase();
            if !names.contains(&name) {
                names.push(name);
            }
        };
        if matches!(node.layout(), Some(Layout::Grid(_))) {
            SYNTHETIC.iter().for_each(|n| push(n));
        }
        self.copies.iter().for_each(|(n, _)| push(n));
        self.generators
            .iter()
            .filter(|g| g.applies_to(node.mode()))
            .flat_map(|g| g.names().iter())
            .for_each(|n| push(n));
        node.sources()
            .iter()
            .flat_map(|s| s.property_names())
            .for_each(|n| push(&n));
        names.retain(|n| !self.is_suppressed(n));
        names
    }
}

fn synthetic(layout: Option<Layout>, name: &str) -> Option<Value> {
    let grid = *layout?.as_grid()?;
    let name = name.to_ascii_lowercase();
    match name.as_str() {
        IMAGE_WIDTH => Some(Value::Integer(grid.width as i64)),
        IMAGE_HEIGHT => Some(Value::Integer(grid.height as i64)),
        IMAGE_MIN_X => Some(Value::Integer(grid.min_x as i64)),
        IMAGE_MIN_Y => Some(Value::Integer(grid.min_y as i64)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_names_ignore_case() {
        let g = PropertyGenerator::constant("COMPLEX", Value::Boolean(true), ModeSet::all());
        assert!(g.produces("complex"));
        assert_eq!(g.names(), &["complex".to_string()]);
        assert!(g.applies_to(Mode::Collection));
    }

    #[test]
    fn test_suppression_and_exemption() {
        let mut table = PropertyTable::new();
        table.suppress("complex");
        assert!(table.is_suppressed("Complex"));

        table.add_generator(PropertyGenerator::constant(
            "complex",
            Value::Boolean(false),
            ModeSet::all(),
        ));
        assert!(!table.is_suppressed("complex"));

        table.suppress_all();
        assert!(table.is_suppressed("complex"));
        assert!(table.is_suppressed("anything"));
    }

    #[test]
    fn test_synthetic_only_for_grid_layouts() {
        use crate::core::types::{ImageLayout, RenderableLayout, SampleType};
        let grid = Layout::Grid(ImageLayout::new(7, 5, 1, SampleType::Byte).with_origin(2, 3));
        assert_eq!(synthetic(Some(grid), "IMAGE_WIDTH"), Some(Value::Integer(7)));
        assert_eq!(synthetic(Some(grid), IMAGE_MIN_Y), Some(Value::Integer(3)));
        let renderable = Layout::Renderable(RenderableLayout::new(0.0, 0.0, 1.0, 1.0, 1));
        assert_eq!(synthetic(Some(renderable), IMAGE_WIDTH), None);
        assert_eq!(synthetic(None, IMAGE_WIDTH), None);
    }
}
