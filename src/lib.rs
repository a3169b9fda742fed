//! # OpGraph - Deferred Image Operation Graphs
//!
//! OpGraph keeps a registry of image operators, validates the parameters
//! supplied for each invocation and records the result as a node in a
//! deferred graph. Pixels are only produced when a node is forced through
//! an external renderer.
//!
//! ## Features
//!
//! - **Operation Registry**: Operators are described once and registered per evaluation mode
//! - **Validation**: Mode, source, parameter and operator-specific checks run before a node exists
//! - **Deferred Graph**: Nodes are immutable and carry their derived layout and properties
//! - **Collection Mode**: Element-wise operators are lifted over image collections
//! - **Property Generators**: Registered per operator and mode, evaluated lazily
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use opgraph::prelude::*;
//!
//! let engine = Engine::with_builtins()?;
//!
//! let a = SourceImage::new(ImageLayout::new(100, 100, 3, SampleType::Byte));
//! let b = SourceImage::new(ImageLayout::new(50, 50, 3, SampleType::Byte));
//! let sum = engine.create_grid("Add", ParameterBlock::new().with_source(a).with_source(b))?;
//!
//! assert_eq!(sum.layout().and_then(|l| l.as_grid().map(|g| g.width)), Some(50));
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Values, layouts, sources, parameter blocks, descriptors and errors
//! - [`registry`]: Operation registry and codec capability table
//! - [`validation`]: Four-stage validation pipeline
//! - [`graph`]: Deferred nodes, property tables and graph descriptions
//! - [`execution`]: The engine façade and the renderer hand-off
//! - [`operators`]: Built-in operator catalogue

#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod graph;
pub mod operators;
pub mod registry;
pub mod validation;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use opgraph::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{
        EnumValue, Handle, ImageLayout, Kernel, Layout, RenderableLayout, SampleType, Value,
        ValueType,
    };
    pub use crate::core::mode::{Mode, ModeSet};
    pub use crate::core::source::{
        CollectionKind, ImageCollection, RenderableSource, Source, SourceImage, SourceKind,
    };
    pub use crate::core::params::ParameterBlock;

    // Descriptors
    pub use crate::core::descriptor::{
        DescriptorBuilder, OperationDescriptor, ParameterSpec, SourceSpec,
    };
    pub use crate::core::context::ValidationContext;

    // Errors
    pub use crate::core::error::{
        ExecutionError, NodeId, OpGraphError, RegistryError, ValidationError, ValidationErrorKind,
    };
    pub use crate::core::messages::{MessageKey, MessageProvider};

    // Registry
    pub use crate::registry::{CodecInfo, CodecRegistry, OperationRegistry, RegistryBuilder};

    // Validation
    pub use crate::validation::{ValidationPipeline, ValidationStage};

    // Graph
    pub use crate::graph::{GraphDescription, Node, PropertyGenerator, TopologyAnalyzer};

    // Execution
    pub use crate::execution::{CancellationToken, Engine, EngineOptions, RenderFailure, Renderer};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "opgraph");
    }

    #[test]
    fn test_registry_with_builtins() {
        let registry = OperationRegistry::with_builtins().unwrap();

        assert!(registry.contains("Add", Mode::PixelGrid));
        assert!(registry.contains("add", Mode::ResolutionIndependent));
        assert!(registry.contains("AddCollection", Mode::PixelGrid));
        assert!(registry.contains("FileStore", Mode::PixelGrid));
        assert!(!registry.contains("Binarize", Mode::Collection));
    }

    #[test]
    fn test_prelude_builds_a_chain() {
        let engine = Engine::with_builtins().unwrap();
        let pattern = engine
            .create_grid(
                "Pattern",
                ParameterBlock::new()
                    .with_parameter("width", 16i64)
                    .with_parameter("height", 8i64),
            )
            .unwrap();
        let inverted = engine
            .create_grid("Invert", ParameterBlock::new().with_source(pattern.clone()))
            .unwrap();

        let description = GraphDescription::of(&inverted);
        assert_eq!(description.nodes.len(), 2);
        assert_eq!(description.root, inverted.id());
    }
}
