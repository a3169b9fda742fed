//! Registry module.
//!
//! Contains the operation registry and the codec capability table.

pub mod operation;
pub mod codec;

pub use operation::{OperationRegistry, RegistryBuilder, RegistryEntry};
pub use codec::{CodecInfo, CodecRegistry};
