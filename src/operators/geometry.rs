//! Operators defining image bounds: pattern generation and cropping.

use crate::core::context::ValidationContext;
use crate::core::descriptor::{OperationDescriptor, ParameterSpec};
use crate::core::error::{RegistryResult, ValidationResult};
use crate::core::messages::MessageKey;
use crate::core::mode::Mode;
use crate::core::params::ParameterBlock;
use crate::core::types::{ImageLayout, Layout, RenderableLayout, SampleType, ValueType};
use crate::registry::operation::OperationRegistry;

/// Register geometry operators.
pub fn register(registry: &mut OperationRegistry) -> RegistryResult<()> {
    registry.register_all_modes(pattern()?)?;
    registry.register_all_modes(crop()?)?;
    Ok(())
}

/// Generates a tiled pattern image of the given size.
pub fn pattern() -> RegistryResult<OperationDescriptor> {
    OperationDescriptor::builder("Pattern")
        .description("Generates an image of the given size from a repeating pattern")
        .modes([Mode::PixelGrid])
        .no_sources(Mode::PixelGrid)
        .parameter(ParameterSpec::new("width", ValueType::Integer).with_min(1.0))
        .parameter(ParameterSpec::new("height", ValueType::Integer).with_min(1.0))
        .parameter(
            ParameterSpec::new("bands", ValueType::Integer)
                .with_default(1i64)
                .with_min(1.0),
        )
        .layout(|_, block| {
            let width = u32::try_from(block.get_int("width")?).ok()?;
            let height = u32::try_from(block.get_int("height")?).ok()?;
            let bands = u32::try_from(block.get_int("bands")?).ok()?;
            Some(Layout::Grid(ImageLayout::new(width, height, bands, SampleType::Byte)))
        })
        .build()
}

/// Crops an image to a rectangle.
pub fn crop() -> RegistryResult<OperationDescriptor> {
    let mut builder = OperationDescriptor::builder("Crop")
        .description("Crops an image to a rectangular region")
        .modes([Mode::PixelGrid, Mode::ResolutionIndependent])
        .source("source0");
    for name in ["x", "y", "width", "height"] {
        builder = builder.parameter(ParameterSpec::new(name, ValueType::Float));
    }
    builder.validator(check_rectangle).layout(crop_layout).build()
}

fn rectangle(block: &ParameterBlock) -> Option<(f64, f64, f64, f64)> {
    Some((
        block.get_float("x")?,
        block.get_float("y")?,
        block.get_float("width")?,
        block.get_float("height")?,
    ))
}

fn check_rectangle(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    let Some((x, y, width, height)) = rectangle(ctx.block()) else {
        return Ok(());
    };
    if width <= 0.0 || height <= 0.0 {
        return Err(ctx
            .fail(MessageKey::new("crop.empty_rectangle"))
            .with_context("width", width)
            .with_context("height", height));
    }
    match ctx.source_layout(0) {
        Some(layout) if !layout.contains_rect(x, y, width, height) => {
            Err(ctx.fail(MessageKey::new("crop.outside_source")))
        }
        _ => Ok(()),
    }
}

fn crop_layout(_mode: Mode, block: &ParameterBlock) -> Option<Layout> {
    let (x, y, width, height) = rectangle(block)?;
    match block.source(0)?.layout()? {
        Layout::Grid(source) => {
            let min_x = x.round() as i32;
            let min_y = y.round() as i32;
            let max_x = (x + width).round() as i32;
            let max_y = (y + height).round() as i32;
            Some(Layout::Grid(ImageLayout {
                min_x,
                min_y,
                width: span(min_x, max_x),
                height: span(min_y, max_y),
                ..source
            }))
        }
        Layout::Renderable(source) => Some(Layout::Renderable(RenderableLayout::new(
            x as f32,
            y as f32,
            width as f32,
            height as f32,
            source.bands,
        ))),
    }
}

/// Pixel count between two edges; empty when they are reversed.
fn span(min: i32, max: i32) -> u32 {
    u32::try_from(i64::from(max) - i64::from(min)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ValidationError, ValidationErrorKind};
    use crate::core::source::{RenderableSource, SourceImage};
    use crate::core::types::Value;
    use crate::registry::codec::CodecRegistry;
    use crate::validation::ValidationPipeline;

    fn run(d: &OperationDescriptor, mode: Mode, block: ParameterBlock) -> Result<ParameterBlock, ValidationError> {
        ValidationPipeline::standard().validate(d, mode, &block, &CodecRegistry::new())
    }

    fn rect(block: ParameterBlock, x: f64, y: f64, w: f64, h: f64) -> ParameterBlock {
        block
            .with_parameter("x", x)
            .with_parameter("y", y)
            .with_parameter("width", w)
            .with_parameter("height", h)
    }

    #[test]
    fn test_pattern_width_out_of_range() {
        let block = ParameterBlock::new()
            .with_parameter("width", 0i64)
            .with_parameter("height", 10i64);
        let err = run(&pattern().unwrap(), Mode::PixelGrid, block).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::ParameterOutOfRange);
        assert_eq!(err.parameter_name(), Some("width"));
    }

    #[test]
    fn test_pattern_layout_from_parameters() {
        let d = pattern().unwrap();
        let block = ParameterBlock::new().with_positional(7i64).with_positional(5i64);
        let validated = run(&d, Mode::PixelGrid, block).unwrap();
        assert_eq!(validated.get_parameter("bands"), Some(&Value::Integer(1)));
        let layout = d.derive_layout(Mode::PixelGrid, &validated).unwrap();
        assert_eq!(
            layout.as_grid().map(|g| (g.width, g.height, g.bands)),
            Some((7, 5, 1))
        );
    }

    #[test]
    fn test_crop_rectangle_rules() {
        let d = crop().unwrap();
        let source = || ParameterBlock::new().with_source(SourceImage::new(ImageLayout::new(10, 10, 1, SampleType::Byte)));

        let err = run(&d, Mode::PixelGrid, rect(source(), 0.0, 0.0, 0.0, 4.0)).unwrap_err();
        assert_eq!(err.message_key().key, "crop.empty_rectangle");

        let err = run(&d, Mode::PixelGrid, rect(source(), 8.0, 0.0, 4.0, 4.0)).unwrap_err();
        assert_eq!(err.message_key().key, "crop.outside_source");

        let validated = run(&d, Mode::PixelGrid, rect(source(), 2.0, 3.0, 4.0, 5.0)).unwrap();
        let grid = *d.derive_layout(Mode::PixelGrid, &validated).unwrap().as_grid().unwrap();
        assert_eq!((grid.min_x, grid.min_y, grid.width, grid.height), (2, 3, 4, 5));
    }

    #[test]
    fn test_crop_layout_of_extreme_rectangle() {
        let source = ParameterBlock::new().with_source(SourceImage::new(ImageLayout::new(10, 10, 1, SampleType::Byte)));
        let block = rect(source.clone(), -1.0e12, -1.0e12, 2.0e12, 2.0e12);
        let grid = *crop_layout(Mode::PixelGrid, &block).unwrap().as_grid().unwrap();
        assert_eq!((grid.min_x, grid.min_y), (i32::MIN, i32::MIN));
        assert_eq!((grid.width, grid.height), (u32::MAX, u32::MAX));

        let reversed = rect(source, 5.0, 5.0, -3.0, -3.0);
        let grid = *crop_layout(Mode::PixelGrid, &reversed).unwrap().as_grid().unwrap();
        assert_eq!((grid.width, grid.height), (0, 0));
    }

    #[test]
    fn test_crop_renderable_bounds() {
        let d = crop().unwrap();
        let source = ParameterBlock::new().with_source(RenderableSource::new(RenderableLayout::new(0.0, 0.0, 1.0, 1.0, 3)));
        let err = run(&d, Mode::ResolutionIndependent, rect(source.clone(), 0.5, 0.5, 1.0, 0.1)).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::CustomValidationFailed);
        assert!(run(&d, Mode::ResolutionIndependent, rect(source, 0.25, 0.25, 0.5, 0.5)).is_ok());
    }
}
