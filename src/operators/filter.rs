//! Neighbourhood operators: convolution and ordered dithering.

use crate::core::context::ValidationContext;
use crate::core::descriptor::{OperationDescriptor, ParameterSpec};
use crate::core::error::{RegistryError, RegistryResult, ValidationResult};
use crate::core::messages::MessageKey;
use crate::core::mode::Mode;
use crate::core::types::{Handle, Kernel, SampleType, Value, ValueType};
use crate::operators::reshape;
use crate::registry::operation::OperationRegistry;

/// Handle type name of the `colorMap` parameter.
pub const COLOR_CUBE: &str = "ColorCube";

/// Register neighbourhood operators.
pub fn register(registry: &mut OperationRegistry) -> RegistryResult<()> {
    registry.register_all_modes(convolve()?)?;
    registry.register_all_modes(ordered_dither()?)?;
    Ok(())
}

/// Convolves an image with a kernel.
pub fn convolve() -> RegistryResult<OperationDescriptor> {
    OperationDescriptor::builder("Convolve")
        .description("Convolves an image with a kernel")
        .modes([Mode::PixelGrid, Mode::Collection])
        .source("source0")
        .parameter(ParameterSpec::new("kernel", ValueType::Kernel))
        .build()
}

// ============================================================================
// OrderedDither
// ============================================================================

/// A lookup color cube: one dimension per band.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorCube {
    pub sample_type: SampleType,
    pub dimensions: Vec<u32>,
}

impl ColorCube {
    pub fn new(sample_type: SampleType, dimensions: Vec<u32>) -> Self {
        Self {
            sample_type,
            dimensions,
        }
    }

    /// Byte cube with 4, 9 and 6 levels.
    pub fn byte_496() -> Self {
        Self::new(SampleType::Byte, vec![4, 9, 6])
    }

    pub fn bands(&self) -> u32 {
        self.dimensions.len() as u32
    }

    /// Wrap for use as a parameter value.
    pub fn into_handle(self) -> Handle {
        Handle::new(COLOR_CUBE, self)
    }
}

const BAYER_4X4: [f32; 16] = [
    0.0, 8.0, 2.0, 10.0, 12.0, 4.0, 14.0, 6.0, 3.0, 11.0, 1.0, 9.0, 15.0, 7.0, 13.0, 5.0,
];

/// Three 4x4 dither masks, one per band, with thresholds in (0, 1).
pub fn dither_mask_443() -> Result<Vec<Kernel>, String> {
    (0..3)
        .map(|band| {
            let data = BAYER_4X4
                .iter()
                .cycle()
                .skip(band * 5)
                .take(16)
                .map(|v| (v + 0.5) / 16.0)
                .collect();
            Kernel::new(4, 4, data)
        })
        .collect()
}

/// Quantizes an image to a color cube with an ordered dither.
pub fn ordered_dither() -> RegistryResult<OperationDescriptor> {
    let masks = dither_mask_443().map_err(|reason| RegistryError::InvalidDescriptor {
        operation: "OrderedDither".to_string(),
        reason,
    })?;
    OperationDescriptor::builder("OrderedDither")
        .description("Quantizes an image to a color cube using an ordered dither")
        .modes([Mode::PixelGrid])
        .source("source0")
        .parameter(
            ParameterSpec::new("colorMap", ValueType::Handle(COLOR_CUBE.to_string()))
                .with_default(Value::Handle(ColorCube::byte_496().into_handle())),
        )
        .parameter(ParameterSpec::new("ditherMask", ValueType::KernelList).with_default(masks))
        .validator(check_dither)
        .layout(|_, block| {
            reshape(
                block,
                |mut g| {
                    g.bands = 1;
                    g
                },
                |_| 1,
            )
        })
        .build()
}

fn check_dither(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    let Some(layout) = ctx.source_layout(0) else {
        return Ok(());
    };
    let bands = layout.bands();

    if let Some(cube) = ctx.get_handle("colorMap").and_then(|h| h.downcast_ref::<ColorCube>()) {
        if cube.bands() != bands {
            return Err(ctx.fail(MessageKey::new("dither.colormap_bands").arg(cube.bands()).arg(bands)));
        }
        if let Some(grid) = layout.as_grid() {
            if cube.sample_type != grid.sample_type {
                return Err(ctx.fail(
                    MessageKey::new("dither.colormap_type")
                        .arg(cube.sample_type)
                        .arg(grid.sample_type),
                ));
            }
        }
    }

    let masks = ctx.get_kernel_list("ditherMask").unwrap_or(&[]);
    if masks.len() != bands as usize {
        return Err(ctx.fail(MessageKey::new("dither.band_mismatch").arg(masks.len()).arg(bands)));
    }
    if let Some(first) = masks.first() {
        if masks
            .iter()
            .any(|m| m.width != first.width || m.height != first.height)
        {
            return Err(ctx.fail(MessageKey::new("dither.size_mismatch")));
        }
    }
    if masks
        .iter()
        .flat_map(|m| m.data().iter())
        .any(|v| !(0.0..=1.0).contains(v))
    {
        return Err(ctx.fail(MessageKey::new("dither.value_range")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ValidationError, ValidationErrorKind};
    use crate::core::params::ParameterBlock;
    use crate::core::source::SourceImage;
    use crate::core::types::ImageLayout;
    use crate::registry::codec::CodecRegistry;
    use crate::validation::ValidationPipeline;

    fn rgb() -> SourceImage {
        SourceImage::new(ImageLayout::new(16, 16, 3, SampleType::Byte))
    }

    fn validate(block: ParameterBlock) -> Result<ParameterBlock, ValidationError> {
        ValidationPipeline::standard().validate(
            &ordered_dither().unwrap(),
            Mode::PixelGrid,
            &block,
            &CodecRegistry::new(),
        )
    }

    #[test]
    fn test_default_mask_is_valid() {
        let masks = dither_mask_443().unwrap();
        assert_eq!(masks.len(), 3);
        assert!(masks.iter().all(|m| m.data().iter().all(|v| *v > 0.0 && *v < 1.0)));
        assert!(validate(ParameterBlock::new().with_source(rgb())).is_ok());
    }

    #[test]
    fn test_mask_count_must_match_bands() {
        let masks = dither_mask_443().unwrap()[..2].to_vec();
        let err = validate(ParameterBlock::new().with_source(rgb()).with_parameter("ditherMask", masks)).unwrap_err();
        assert_eq!(err.message_key().key, "dither.band_mismatch");
    }

    #[test]
    fn test_mask_sizes_and_values() {
        let mut masks = dither_mask_443().unwrap();
        masks[2] = Kernel::new(2, 2, vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        let err = validate(ParameterBlock::new().with_source(rgb()).with_parameter("ditherMask", masks)).unwrap_err();
        assert_eq!(err.message_key().key, "dither.size_mismatch");

        let mut masks = dither_mask_443().unwrap();
        masks[0] = Kernel::new(4, 4, vec![1.5; 16]).unwrap();
        let err = validate(ParameterBlock::new().with_source(rgb()).with_parameter("ditherMask", masks)).unwrap_err();
        assert_eq!(err.message_key().key, "dither.value_range");
    }

    #[test]
    fn test_color_map_must_match_source() {
        let cube = ColorCube::new(SampleType::Byte, vec![8, 8]).into_handle();
        let err = validate(ParameterBlock::new().with_source(rgb()).with_parameter("colorMap", cube)).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::CustomValidationFailed);
        assert_eq!(err.message_key().key, "dither.colormap_bands");

        let cube = ColorCube::new(SampleType::UShort, vec![4, 9, 6]).into_handle();
        let err = validate(ParameterBlock::new().with_source(rgb()).with_parameter("colorMap", cube)).unwrap_err();
        assert_eq!(err.message_key().key, "dither.colormap_type");
    }

    #[test]
    fn test_convolve_requires_kernel() {
        let err = ValidationPipeline::standard()
            .validate(
                &convolve().unwrap(),
                Mode::PixelGrid,
                &ParameterBlock::new().with_source(rgb()),
                &CodecRegistry::new(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::MissingParameter);

        let block = ParameterBlock::new().with_source(rgb()).with_parameter("kernel", Kernel::box3());
        assert!(ValidationPipeline::standard()
            .validate(&convolve().unwrap(), Mode::PixelGrid, &block, &CodecRegistry::new())
            .is_ok());
    }
}
