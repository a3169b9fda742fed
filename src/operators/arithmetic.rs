//! Pixel-wise arithmetic operators.

use crate::core::descriptor::OperationDescriptor;
use crate::core::error::RegistryResult;
use crate::core::mode::Mode;
use crate::operators::intersection_layout;
use crate::registry::operation::OperationRegistry;

/// Register arithmetic operators.
pub fn register(registry: &mut OperationRegistry) -> RegistryResult<()> {
    registry.register_all_modes(add()?)?;
    registry.register_all_modes(subtract()?)?;
    registry.register_all_modes(multiply()?)?;
    registry.register_all_modes(invert()?)?;
    Ok(())
}

fn dyadic(name: &str, description: &str) -> RegistryResult<OperationDescriptor> {
    OperationDescriptor::builder(name)
        .description(description)
        .modes(Mode::ALL)
        .source("source0")
        .source("source1")
        .layout(intersection_layout)
        .build()
}

/// Adds two images pixel by pixel over their intersection.
pub fn add() -> RegistryResult<OperationDescriptor> {
    dyadic("Add", "Adds two images pixel by pixel")
}

/// Subtracts source 1 from source 0.
pub fn subtract() -> RegistryResult<OperationDescriptor> {
    dyadic("Subtract", "Subtracts the second image from the first")
}

/// Multiplies two images pixel by pixel.
pub fn multiply() -> RegistryResult<OperationDescriptor> {
    dyadic("Multiply", "Multiplies two images pixel by pixel")
}

/// Inverts every sample.
pub fn invert() -> RegistryResult<OperationDescriptor> {
    OperationDescriptor::builder("Invert")
        .description("Inverts the pixel values of an image")
        .modes(Mode::ALL)
        .source("source0")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ValidationErrorKind;
    use crate::core::params::ParameterBlock;
    use crate::core::source::{ImageCollection, RenderableSource, SourceImage};
    use crate::core::types::{ImageLayout, RenderableLayout, SampleType};
    use crate::registry::codec::CodecRegistry;
    use crate::validation::ValidationPipeline;

    fn gray(size: u32) -> SourceImage {
        SourceImage::new(ImageLayout::new(size, size, 1, SampleType::Byte))
    }

    #[test]
    fn test_add_derives_intersection() {
        let descriptor = add().unwrap();
        let block = ParameterBlock::new().with_source(gray(100)).with_source(gray(50));
        let validated = ValidationPipeline::standard()
            .validate(&descriptor, Mode::PixelGrid, &block, &CodecRegistry::new())
            .unwrap();
        let layout = descriptor.derive_layout(Mode::PixelGrid, &validated).unwrap();
        let grid = layout.as_grid().unwrap();
        assert_eq!((grid.width, grid.height), (50, 50));
    }

    #[test]
    fn test_add_rejects_renderable_in_grid_mode() {
        let descriptor = subtract().unwrap();
        let block = ParameterBlock::new()
            .with_source(gray(10))
            .with_source(RenderableSource::new(RenderableLayout::new(0.0, 0.0, 1.0, 1.0, 1)));
        let err = ValidationPipeline::standard()
            .validate(&descriptor, Mode::PixelGrid, &block, &CodecRegistry::new())
            .unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::SourceTypeMismatch);
        assert_eq!(err.source_index(), Some(1));
    }

    #[test]
    fn test_multiply_lifts_over_collections() {
        let descriptor = multiply().unwrap();
        let block = ParameterBlock::new()
            .with_source(ImageCollection::sequence(vec![gray(4).into(), gray(5).into()]))
            .with_source(gray(8));
        assert!(ValidationPipeline::standard()
            .validate(&descriptor, Mode::Collection, &block, &CodecRegistry::new())
            .is_ok());
    }

    #[test]
    fn test_invert_requires_source() {
        let err = ValidationPipeline::standard()
            .validate(&invert().unwrap(), Mode::PixelGrid, &ParameterBlock::new(), &CodecRegistry::new())
            .unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::MissingSource);
    }
}
