//! Validation context.
//!
//! Custom validators receive a [`ValidationContext`] holding the fully
//! defaulted parameter block. It exposes source layouts and the codec
//! table but never any pixel data.

use crate::core::descriptor::OperationDescriptor;
use crate::core::error::ValidationError;
use crate::core::messages::MessageKey;
use crate::core::mode::Mode;
use crate::core::params::ParameterBlock;
use crate::core::source::Source;
use crate::core::types::{EnumValue, Handle, Kernel, Layout, Value};
use crate::registry::codec::CodecRegistry;

/// Context handed to a descriptor's custom validator.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    descriptor: &'a OperationDescriptor,
    mode: Mode,
    block: &'a ParameterBlock,
    codecs: &'a CodecRegistry,
    element: Option<usize>,
}

impl<'a> ValidationContext<'a> {
    /// Create a new validation context.
    pub fn new(
        descriptor: &'a OperationDescriptor,
        mode: Mode,
        block: &'a ParameterBlock,
        codecs: &'a CodecRegistry,
    ) -> Self {
        Self {
            descriptor,
            mode,
            block,
            codecs,
            element: None,
        }
    }

    /// Context for one element of a collection-mode block.
    pub fn for_element(mut self, index: usize) -> Self {
        self.element = Some(index);
        self
    }

    pub fn descriptor(&self) -> &'a OperationDescriptor {
        self.descriptor
    }

    pub fn operation_name(&self) -> &'a str {
        self.descriptor.name()
    }

    /// Mode the block is validated for. Collection elements report their
    /// element mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn block(&self) -> &'a ParameterBlock {
        self.block
    }

    pub fn codecs(&self) -> &'a CodecRegistry {
        self.codecs
    }

    /// Index of the collection element being validated, if any.
    pub fn element_index(&self) -> Option<usize> {
        self.element
    }

    // ========================================================================
    // Source Getters
    // ========================================================================

    pub fn source(&self, index: usize) -> Option<&'a Source> {
        self.block.source(index)
    }

    pub fn source_layout(&self, index: usize) -> Option<Layout> {
        self.source(index).and_then(|s| s.layout())
    }

    pub fn source_bands(&self, index: usize) -> Option<u32> {
        self.source_layout(index).map(|l| l.bands())
    }

    // ========================================================================
    // Parameter Getters
    // ========================================================================

    pub fn parameter(&self, name: &str) -> Option<&'a Value> {
        self.block.get_parameter(name)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.block.get_int(name)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.block.get_float(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.block.get_bool(name)
    }

    pub fn get_string(&self, name: &str) -> Option<&'a str> {
        self.block.get_string(name)
    }

    pub fn get_double_array(&self, name: &str) -> Option<&'a [f64]> {
        self.block.get_double_array(name)
    }

    pub fn get_enum(&self, name: &str) -> Option<&'a EnumValue> {
        self.block.get_enum(name)
    }

    pub fn get_kernel_list(&self, name: &str) -> Option<&'a [Kernel]> {
        self.block.get_kernel_list(name)
    }

    pub fn get_handle(&self, name: &str) -> Option<&'a Handle> {
        self.block.get_handle(name)
    }

    /// Build a custom-validation failure for this operator. The element
    /// index is recorded when validating a collection element.
    pub fn fail(&self, detail: MessageKey) -> ValidationError {
        let error = ValidationError::custom(self.operation_name(), detail);
        match self.element {
            Some(i) => error.with_context("element", i),
            None => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::ParameterSpec;
    use crate::core::error::ValidationErrorKind;
    use crate::core::source::SourceImage;
    use crate::core::types::{ImageLayout, SampleType, ValueType};

    #[test]
    fn test_context_exposes_layouts_and_parameters() {
        let descriptor = OperationDescriptor::builder("Binarize")
            .modes([Mode::PixelGrid])
            .source("source0")
            .parameter(ParameterSpec::new("threshold", ValueType::Float).with_default(0.5))
            .build()
            .unwrap();
        let block = ParameterBlock::new()
            .with_source(SourceImage::new(ImageLayout::new(4, 4, 3, SampleType::Byte)))
            .with_parameter("threshold", 0.25);
        let codecs = CodecRegistry::new();
        let ctx = ValidationContext::new(&descriptor, Mode::PixelGrid, &block, &codecs);

        assert_eq!(ctx.operation_name(), "Binarize");
        assert_eq!(ctx.source_bands(0), Some(3));
        assert_eq!(ctx.get_float("THRESHOLD"), Some(0.25));
        assert!(ctx.source(1).is_none());
    }

    #[test]
    fn test_fail_records_element() {
        let descriptor = OperationDescriptor::builder("Invert")
            .modes([Mode::PixelGrid])
            .build()
            .unwrap();
        let block = ParameterBlock::new();
        let codecs = CodecRegistry::new();
        let ctx = ValidationContext::new(&descriptor, Mode::PixelGrid, &block, &codecs).for_element(2);
        let error = ctx.fail(MessageKey::new("collection.empty"));
        assert_eq!(error.kind(), ValidationErrorKind::CustomValidationFailed);
        match error {
            ValidationError::CustomValidationFailed { context, .. } => {
                assert_eq!(context.get("element").map(String::as_str), Some("2"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
