//! Graph module for deferred operation nodes.
//!
//! Nodes form a directed acyclic graph where each node applies one
//! registered operation to its sources. Building a node never computes
//! pixels.

pub mod builder;
pub mod description;
pub mod node;
pub mod properties;
pub mod topology;

// Re-export commonly used types
pub use builder::{BuildOptions, NodeBuilder};
pub use description::{GraphDescription, NodeDescription, SourceDescription};
pub use node::{Node, NodeOutput};
pub use properties::{PropertyFn, PropertyGenerator, PropertyTable};
pub use topology::TopologyAnalyzer;
