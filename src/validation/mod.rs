//! Validation module.
//!
//! Every parameter block is validated before a node is built from it.

pub mod pipeline;
pub mod stages;

pub use pipeline::{element_blocks, ValidationPipeline};
pub use stages::{
    CustomValidation, ModeValidation, ParameterValidation, SourceValidation, ValidationRequest,
    ValidationStage,
};
