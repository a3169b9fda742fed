//! Error types for OpGraph.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Name the violated rule together with the offending source or parameter
//! - Carry a stable message key so callers can localize the text
//! - Be serializable so they can cross process boundaries

use crate::core::messages::MessageKey;
use crate::core::mode::{Mode, ModeSet};
use crate::core::source::SourceKind;
use crate::core::types::{Value, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a node ID from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Top-level error type for OpGraph.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum OpGraphError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OpGraphError {
    /// The validation failure, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        if let OpGraphError::Validation(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

/// Category of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    UnsupportedMode,
    MissingSource,
    SourceTypeMismatch,
    SourceCollectionInvalid,
    MissingParameter,
    ParameterTypeMismatch,
    ParameterOutOfRange,
    UnknownParameter,
    CustomValidationFailed,
}

/// Why a parameter block was rejected.
///
/// Validation errors are permanent for a given parameter block; retrying
/// the same block yields the same error.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("{operation} does not support {mode} mode (supported: {supported})")]
    UnsupportedMode {
        operation: String,
        mode: Mode,
        supported: ModeSet,
    },

    #[error("{operation}: missing source {index}, expected {expected}")]
    MissingSource {
        operation: String,
        index: usize,
        expected: SourceKind,
    },

    #[error("{operation}: source {index}{} must be {expected}, found {found}", member_suffix(.member))]
    SourceTypeMismatch {
        operation: String,
        index: usize,
        member: Option<usize>,
        expected: SourceKind,
        found: String,
    },

    #[error("{operation}: source collection {index} is invalid: {reason}")]
    SourceCollectionInvalid {
        operation: String,
        index: usize,
        reason: MessageKey,
    },

    #[error("{operation}: missing parameter '{name}' (index {index})")]
    MissingParameter {
        operation: String,
        index: usize,
        name: String,
    },

    #[error("{operation}: parameter '{name}' must be {expected}, found {found}")]
    ParameterTypeMismatch {
        operation: String,
        index: usize,
        name: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("{operation}: parameter '{name}' = {value} is outside {constraint}")]
    ParameterOutOfRange {
        operation: String,
        index: usize,
        name: String,
        value: Value,
        constraint: String,
    },

    #[error("{operation}: unknown parameter '{name}'")]
    UnknownParameter { operation: String, name: String },

    #[error("{operation}: {detail}")]
    CustomValidationFailed {
        operation: String,
        detail: MessageKey,
        context: IndexMap<String, String>,
    },
}

fn member_suffix(member: &Option<usize>) -> String {
    member.map(|m| format!(" member {}", m)).unwrap_or_default()
}

/// Errors from registry population and lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryError {
    #[error("{operation} is already registered for {mode} mode")]
    DuplicateRegistration { operation: String, mode: Mode },

    #[error("{operation} cannot be registered for {mode} mode it does not declare")]
    ModeNotDeclared { operation: String, mode: Mode },

    #[error("No operator named {operation} is registered for {mode} mode")]
    NotFound { operation: String, mode: Mode },

    #[error("Invalid descriptor for {operation}: {reason}")]
    InvalidDescriptor { operation: String, reason: String },
}

/// Errors on the external evaluation path.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionError {
    #[error("No renderer configured to evaluate {operation} node {node_id}")]
    NoRenderer { node_id: NodeId, operation: String },

    #[error("{operation} node {node_id} failed to render: {error}")]
    RenderFailed {
        node_id: NodeId,
        operation: String,
        error: String,
    },

    #[error("{operation} node {node_id} is a collection; evaluate its members")]
    CollectionNode { node_id: NodeId, operation: String },

    #[error("Evaluation cancelled")]
    Cancelled,
}

// ============================================================================
// Error Utilities
// ============================================================================

impl ValidationError {
    /// Build a custom-validation failure with no extra context.
    pub fn custom(operation: impl Into<String>, detail: MessageKey) -> Self {
        ValidationError::CustomValidationFailed {
            operation: operation.into(),
            detail,
            context: IndexMap::new(),
        }
    }

    /// Attach a context entry to a custom-validation failure. Other
    /// variants are returned unchanged.
    pub fn with_context(mut self, key: &str, value: impl ToString) -> Self {
        if let ValidationError::CustomValidationFailed { context, .. } = &mut self {
            context.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn kind(&self) -> ValidationErrorKind {
        match self {
            ValidationError::UnsupportedMode { .. } => ValidationErrorKind::UnsupportedMode,
            ValidationError::MissingSource { .. } => ValidationErrorKind::MissingSource,
            ValidationError::SourceTypeMismatch { .. } => ValidationErrorKind::SourceTypeMismatch,
            ValidationError::SourceCollectionInvalid { .. } => {
                ValidationErrorKind::SourceCollectionInvalid
            }
            ValidationError::MissingParameter { .. } => ValidationErrorKind::MissingParameter,
            ValidationError::ParameterTypeMismatch { .. } => {
                ValidationErrorKind::ParameterTypeMismatch
            }
            ValidationError::ParameterOutOfRange { .. } => ValidationErrorKind::ParameterOutOfRange,
            ValidationError::UnknownParameter { .. } => ValidationErrorKind::UnknownParameter,
            ValidationError::CustomValidationFailed { .. } => {
                ValidationErrorKind::CustomValidationFailed
            }
        }
    }

    /// Name of the operator that rejected the block.
    pub fn operation(&self) -> &str {
        match self {
            ValidationError::UnsupportedMode { operation, .. }
            | ValidationError::MissingSource { operation, .. }
            | ValidationError::SourceTypeMismatch { operation, .. }
            | ValidationError::SourceCollectionInvalid { operation, .. }
            | ValidationError::MissingParameter { operation, .. }
            | ValidationError::ParameterTypeMismatch { operation, .. }
            | ValidationError::ParameterOutOfRange { operation, .. }
            | ValidationError::UnknownParameter { operation, .. }
            | ValidationError::CustomValidationFailed { operation, .. } => operation,
        }
    }

    /// Offending parameter name, if the error concerns a parameter.
    pub fn parameter_name(&self) -> Option<&str> {
        match self {
            ValidationError::MissingParameter { name, .. }
            | ValidationError::ParameterTypeMismatch { name, .. }
            | ValidationError::ParameterOutOfRange { name, .. }
            | ValidationError::UnknownParameter { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Offending source index, if the error concerns a source.
    pub fn source_index(&self) -> Option<usize> {
        match self {
            ValidationError::MissingSource { index, .. }
            | ValidationError::SourceTypeMismatch { index, .. }
            | ValidationError::SourceCollectionInvalid { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Stable key plus arguments for localized display.
    ///
    /// Custom failures return their operator-specific detail key.
    pub fn message_key(&self) -> MessageKey {
        match self {
            ValidationError::UnsupportedMode { operation, mode, .. } => {
                MessageKey::new("validation.unsupported_mode").arg(operation).arg(mode)
            }
            ValidationError::MissingSource { operation, index, .. } => {
                MessageKey::new("validation.missing_source").arg(operation).arg(index)
            }
            ValidationError::SourceTypeMismatch {
                operation,
                index,
                expected,
                found,
                ..
            } => MessageKey::new("validation.source_type_mismatch")
                .arg(operation)
                .arg(index)
                .arg(expected)
                .arg(found),
            ValidationError::SourceCollectionInvalid {
                operation,
                index,
                reason,
            } => MessageKey::new("validation.source_collection_invalid")
                .arg(operation)
                .arg(index)
                .arg(reason),
            ValidationError::MissingParameter { operation, name, .. } => {
                MessageKey::new("validation.missing_parameter").arg(operation).arg(name)
            }
            ValidationError::ParameterTypeMismatch {
                operation,
                name,
                expected,
                found,
                ..
            } => MessageKey::new("validation.parameter_type_mismatch")
                .arg(operation)
                .arg(name)
                .arg(expected)
                .arg(found),
            ValidationError::ParameterOutOfRange { operation, name, .. } => {
                MessageKey::new("validation.parameter_out_of_range")
                    .arg(operation)
                    .arg(name)
            }
            ValidationError::UnknownParameter { operation, name } => {
                MessageKey::new("validation.unknown_parameter").arg(operation).arg(name)
            }
            ValidationError::CustomValidationFailed { detail, .. } => detail.clone(),
        }
    }

    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            ValidationError::UnsupportedMode { supported, .. } => {
                Some(format!("Use one of the supported modes {}", supported))
            }
            ValidationError::MissingSource { index, expected, .. } => {
                Some(format!("Add a {} as source {}", expected, index))
            }
            ValidationError::MissingParameter { name, .. } => {
                Some(format!("Supply a value for '{}'", name))
            }
            ValidationError::ParameterTypeMismatch { name, expected, .. } => {
                Some(format!("Pass '{}' as {}", name, expected))
            }
            ValidationError::ParameterOutOfRange { name, constraint, .. } => {
                Some(format!("Adjust '{}' to lie within {}", name, constraint))
            }
            ValidationError::UnknownParameter { name, .. } => {
                Some(format!("Remove '{}' or check its spelling", name))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl RegistryError {
    pub fn message_key(&self) -> MessageKey {
        match self {
            RegistryError::DuplicateRegistration { operation, mode } => {
                MessageKey::new("registry.duplicate_registration").arg(operation).arg(mode)
            }
            RegistryError::ModeNotDeclared { operation, mode } => {
                MessageKey::new("registry.mode_not_declared").arg(operation).arg(mode)
            }
            RegistryError::NotFound { operation, mode } => {
                MessageKey::new("registry.not_found").arg(operation).arg(mode)
            }
            RegistryError::InvalidDescriptor { operation, reason } => {
                MessageKey::new("registry.invalid_descriptor").arg(operation).arg(reason)
            }
        }
    }
}

impl ExecutionError {
    /// Get the node ID that caused this error, if applicable.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            ExecutionError::NoRenderer { node_id, .. }
            | ExecutionError::RenderFailed { node_id, .. }
            | ExecutionError::CollectionNode { node_id, .. } => Some(*node_id),
            ExecutionError::Cancelled => None,
        }
    }

    /// Whether evaluating the same node again could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExecutionError::RenderFailed { .. } | ExecutionError::Cancelled
        )
    }
}

/// Result type alias for OpGraph operations.
pub type OpGraphResult<T> = Result<T, OpGraphError>;

/// Result type alias for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type alias for execution operations.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        let id = NodeId::new();
        let display = format!("{}", id);
        assert_eq!(display.len(), 8);
    }

    #[test]
    fn test_out_of_range_names_parameter() {
        let error = ValidationError::ParameterOutOfRange {
            operation: "Pattern".to_string(),
            index: 0,
            name: "width".to_string(),
            value: Value::Integer(0),
            constraint: "[1, +inf]".to_string(),
        };
        assert_eq!(error.kind(), ValidationErrorKind::ParameterOutOfRange);
        assert_eq!(error.parameter_name(), Some("width"));
        assert!(error.to_string().contains("width"));
        assert!(error.suggested_fix().unwrap().contains("width"));
        assert_eq!(error.message_key().key, "validation.parameter_out_of_range");
    }

    #[test]
    fn test_custom_failure_carries_detail_key() {
        let error = ValidationError::custom("Binarize", MessageKey::new("binarize.single_band").arg(3))
            .with_context("bands", 3);
        assert_eq!(error.kind(), ValidationErrorKind::CustomValidationFailed);
        assert_eq!(error.message_key().key, "binarize.single_band");
        assert_eq!(error.to_string(), "Binarize: source must be single-banded, found 3 bands");
        if let ValidationError::CustomValidationFailed { context, .. } = &error {
            assert_eq!(context.get("bands").map(String::as_str), Some("3"));
        }
    }

    #[test]
    fn test_source_mismatch_display_includes_member() {
        let error = ValidationError::SourceTypeMismatch {
            operation: "Add".to_string(),
            index: 1,
            member: Some(2),
            expected: SourceKind::PixelGrid,
            found: "resolution_independent image".to_string(),
        };
        assert_eq!(error.source_index(), Some(1));
        assert!(error.to_string().contains("source 1 member 2"));
    }

    #[test]
    fn test_validation_error_serializes() {
        let error = ValidationError::MissingSource {
            operation: "Add".to_string(),
            index: 0,
            expected: SourceKind::PixelGrid,
        };
        let json = serde_json::to_string(&error).unwrap();
        let back: ValidationError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, error);
    }

    #[test]
    fn test_execution_error_recoverability() {
        assert!(ExecutionError::Cancelled.is_recoverable());
        let error = ExecutionError::NoRenderer {
            node_id: NodeId::new(),
            operation: "FileStore".to_string(),
        };
        assert!(!error.is_recoverable());
        assert!(error.node_id().is_some());
    }
}
