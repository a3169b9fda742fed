//! Core types for the OpGraph operation registry.
//!
//! This module contains the foundational types shared by the registry,
//! the validator and the graph, including:
//! - Value and layout types
//! - Evaluation modes
//! - Sources and parameter blocks
//! - Operation descriptors
//! - Error types and message keys

pub mod types;
pub mod mode;
pub mod source;
pub mod params;
pub mod descriptor;
pub mod context;
pub mod error;
pub mod messages;

// Re-export commonly used types
pub use types::{EnumValue, Handle, ImageLayout, Kernel, Layout, RenderableLayout, SampleType, Value, ValueType};
pub use mode::{Mode, ModeSet};
pub use source::{CollectionKind, ImageCollection, RenderableSource, Source, SourceImage, SourceKind};
pub use params::ParameterBlock;
pub use descriptor::{DescriptorBuilder, OperationDescriptor, ParamDefault, ParameterSpec, SourceSpec, ValueRange};
pub use context::ValidationContext;
pub use error::{ExecutionError, NodeId, OpGraphError, RegistryError, ValidationError, ValidationErrorKind};
pub use messages::{DefaultMessages, MessageKey, MessageProvider};
