//! Individual validation stages.
//!
//! Each stage checks one category of rule. The standard pipeline runs them
//! in the order mode, sources, parameters, custom, and stops at the first
//! failure.

use crate::core::context::ValidationContext;
use crate::core::descriptor::OperationDescriptor;
use crate::core::error::{ValidationError, ValidationResult};
use crate::core::messages::MessageKey;
use crate::core::mode::Mode;
use crate::core::params::ParameterBlock;
use crate::core::source::{Source, SourceKind};
use crate::core::types::Value;
use crate::registry::codec::CodecRegistry;
use crate::validation::pipeline::element_blocks;

/// State threaded through the stages of one validation run.
pub struct ValidationRequest<'a> {
    pub descriptor: &'a OperationDescriptor,
    pub mode: Mode,
    /// The block under validation. The parameter stage replaces it with
    /// the bound, fully defaulted block.
    pub block: ParameterBlock,
    pub codecs: &'a CodecRegistry,
}

/// Trait for validation stages.
pub trait ValidationStage: Send + Sync {
    /// Name of this validation stage.
    fn name(&self) -> &str;

    /// Check the request, returning the first violated rule.
    fn validate(&self, request: &mut ValidationRequest<'_>) -> ValidationResult<()>;
}

/// Mode validation - the operator must support the requested mode.
pub struct ModeValidation;

impl ValidationStage for ModeValidation {
    fn name(&self) -> &str {
        "Mode Validation"
    }

    fn validate(&self, request: &mut ValidationRequest<'_>) -> ValidationResult<()> {
        let d = request.descriptor;
        if d.supports(request.mode) {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedMode {
                operation: d.name().to_string(),
                mode: request.mode,
                supported: d.supported_modes(),
            })
        }
    }
}

/// Source validation - arity and kind of every declared source slot.
///
/// Verifies:
/// - Required slots are filled
/// - Each source matches its slot's kind
/// - Collection slots meet their minimum size and every member matches
/// - In collection mode, at least one source is a non-empty collection
///
/// Sources beyond the declared slots are accepted unchecked.
pub struct SourceValidation;

impl SourceValidation {
    fn mismatch(operation: &str, index: usize, member: Option<usize>, expected: &SourceKind, found: &Source) -> ValidationError {
        ValidationError::SourceTypeMismatch {
            operation: operation.to_string(),
            index,
            member,
            expected: expected.clone(),
            found: found.describe(),
        }
    }

    fn check_members(
        operation: &str,
        index: usize,
        element: &SourceKind,
        members: &[Source],
    ) -> ValidationResult<()> {
        for (j, member) in members.iter().enumerate() {
            if !element.accepts(member) {
                return Err(Self::mismatch(operation, index, Some(j), element, member));
            }
        }
        Ok(())
    }
}

impl ValidationStage for SourceValidation {
    fn name(&self) -> &str {
        "Source Validation"
    }

    fn validate(&self, request: &mut ValidationRequest<'_>) -> ValidationResult<()> {
        let operation = request.descriptor.name();
        let lifting = request.mode == Mode::Collection;

        for (i, spec) in request.descriptor.source_specs(request.mode).iter().enumerate() {
            let source = match request.block.source(i) {
                Some(source) => source,
                None if spec.required => {
                    return Err(ValidationError::MissingSource {
                        operation: operation.to_string(),
                        index: i,
                        expected: spec.kind.clone(),
                    })
                }
                None => continue,
            };

            match (&spec.kind, source.collection_view()) {
                (SourceKind::Collection { element, min_len }, Some((_, members))) => {
                    if members.len() < *min_len {
                        return Err(ValidationError::SourceCollectionInvalid {
                            operation: operation.to_string(),
                            index: i,
                            reason: MessageKey::new("collection.too_small")
                                .arg(min_len)
                                .arg(members.len()),
                        });
                    }
                    Self::check_members(operation, i, element, &members)?;
                }
                (SourceKind::Collection { .. }, None) => {
                    return Err(Self::mismatch(operation, i, None, &spec.kind, source));
                }
                (kind, Some((_, members))) if lifting => {
                    if members.is_empty() {
                        return Err(ValidationError::SourceCollectionInvalid {
                            operation: operation.to_string(),
                            index: i,
                            reason: MessageKey::new("collection.empty"),
                        });
                    }
                    Self::check_members(operation, i, kind, &members)?;
                }
                (kind, _) => {
                    if !kind.accepts(source) {
                        return Err(Self::mismatch(operation, i, None, kind, source));
                    }
                }
            }
        }

        if lifting && request.block.sources().iter().all(|s| s.collection_view().is_none()) {
            return Err(ValidationError::SourceCollectionInvalid {
                operation: operation.to_string(),
                index: 0,
                reason: MessageKey::new("collection.no_collection_source"),
            });
        }
        Ok(())
    }
}

/// Parameter validation - binding, defaults, types and ranges.
///
/// Named entries bind by name, positional entries by declaration order.
/// Omitted parameters take their declared default. On success the request
/// block is replaced by one naming every declared parameter in order.
pub struct ParameterValidation;

impl ValidationStage for ParameterValidation {
    fn name(&self) -> &str {
        "Parameter Validation"
    }

    fn validate(&self, request: &mut ValidationRequest<'_>) -> ValidationResult<()> {
        let d = request.descriptor;
        let operation = d.name();
        let block = &request.block;

        if let Some(unknown) = block.parameter_names().find(|n| d.parameter(n).is_none()) {
            return Err(ValidationError::UnknownParameter {
                operation: operation.to_string(),
                name: unknown.to_string(),
            });
        }
        let positional: Vec<&Value> = block.positional_parameters().collect();
        if positional.len() > d.parameters().len() {
            return Err(ValidationError::UnknownParameter {
                operation: operation.to_string(),
                name: format!("#{}", d.parameters().len()),
            });
        }

        let mut bound = block.clone();
        bound.clear_parameters();
        for (i, spec) in d.parameters().iter().enumerate() {
            let value = block
                .get_parameter(&spec.name)
                .or_else(|| positional.get(i).copied())
                .or_else(|| spec.default_value())
                .ok_or_else(|| ValidationError::MissingParameter {
                    operation: operation.to_string(),
                    index: i,
                    name: spec.name.clone(),
                })?;

            if !spec.value_type.matches(value) {
                return Err(ValidationError::ParameterTypeMismatch {
                    operation: operation.to_string(),
                    index: i,
                    name: spec.name.clone(),
                    expected: spec.value_type.clone(),
                    found: value.value_type(),
                });
            }
            if let Err(constraint) = spec.check_constraints(value) {
                return Err(ValidationError::ParameterOutOfRange {
                    operation: operation.to_string(),
                    index: i,
                    name: spec.name.clone(),
                    value: value.clone(),
                    constraint,
                });
            }
            bound.set_parameter(&spec.name, value.clone());
        }

        request.block = bound;
        Ok(())
    }
}

/// Custom validation - the descriptor's own business rules.
///
/// Runs against the defaulted block. In collection mode the rules run once
/// per element, with each collection source replaced by its member.
pub struct CustomValidation;

impl ValidationStage for CustomValidation {
    fn name(&self) -> &str {
        "Custom Validation"
    }

    fn validate(&self, request: &mut ValidationRequest<'_>) -> ValidationResult<()> {
        let d = request.descriptor;
        let Some(validator) = d.validator() else {
            return Ok(());
        };

        if request.mode == Mode::Collection {
            if let Some((_, blocks)) = element_blocks(&request.block) {
                let element_mode = d.collection_element_mode();
                for (j, element) in blocks.iter().enumerate() {
                    let ctx = ValidationContext::new(d, element_mode, element, request.codecs).for_element(j);
                    validator(&ctx)?;
                }
            }
            return Ok(());
        }

        let ctx = ValidationContext::new(d, request.mode, &request.block, request.codecs);
        validator(&ctx)
    }
}
