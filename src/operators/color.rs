//! Point operators on sample values: thresholding, table lookup, color
//! space conversion and sample type conversion.

use crate::core::context::ValidationContext;
use crate::core::descriptor::{OperationDescriptor, ParameterSpec};
use crate::core::error::{RegistryResult, ValidationResult};
use crate::core::messages::MessageKey;
use crate::core::mode::Mode;
use crate::core::params::ParameterBlock;
use crate::core::types::{EnumValue, Layout, SampleType, ValueType};
use crate::operators::reshape;
use crate::registry::operation::OperationRegistry;

/// Enumeration type of the `colorSpace` parameter.
pub const COLOR_SPACE: &str = "ColorSpace";

/// Enumeration type of the `dataType` parameter.
pub const DATA_TYPE: &str = "DataType";

/// Known color spaces with their band counts.
const COLOR_SPACES: [(&str, i32, u32); 4] = [("GRAY", 0, 1), ("RGB", 1, 3), ("CMYK", 2, 4), ("YCC", 3, 3)];

const DATA_TYPES: [(&str, SampleType); 6] = [
    ("BYTE", SampleType::Byte),
    ("USHORT", SampleType::UShort),
    ("SHORT", SampleType::Short),
    ("INT", SampleType::Int),
    ("FLOAT", SampleType::Float),
    ("DOUBLE", SampleType::Double),
];

/// Register point operators.
pub fn register(registry: &mut OperationRegistry) -> RegistryResult<()> {
    registry.register_all_modes(binarize()?)?;
    registry.register_all_modes(lookup()?)?;
    registry.register_all_modes(color_convert()?)?;
    registry.register_all_modes(format()?)?;
    Ok(())
}

// ============================================================================
// Enumerations
// ============================================================================

/// Member of the `ColorSpace` enumeration, by name.
pub fn color_space(name: &str) -> Option<EnumValue> {
    COLOR_SPACES
        .iter()
        .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        .map(|(n, v, _)| EnumValue::new(COLOR_SPACE, *n, *v))
}

/// Member of the `DataType` enumeration for a sample type.
pub fn data_type(sample_type: SampleType) -> EnumValue {
    let (index, (name, _)) = DATA_TYPES
        .iter()
        .enumerate()
        .find(|(_, (_, t))| *t == sample_type)
        .unwrap_or((0, &DATA_TYPES[0]));
    EnumValue::new(DATA_TYPE, *name, index as i32)
}

fn space_bands(space: &EnumValue) -> Option<u32> {
    COLOR_SPACES
        .iter()
        .find(|(n, _, _)| n.eq_ignore_ascii_case(&space.name))
        .map(|(_, _, bands)| *bands)
}

fn sample_type_of(value: &EnumValue) -> Option<SampleType> {
    DATA_TYPES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(&value.name))
        .map(|(_, t)| *t)
}

fn all_color_spaces() -> Vec<EnumValue> {
    COLOR_SPACES
        .iter()
        .map(|(n, v, _)| EnumValue::new(COLOR_SPACE, *n, *v))
        .collect()
}

// ============================================================================
// Binarize
// ============================================================================

/// Thresholds a single-banded image into a bilevel image.
pub fn binarize() -> RegistryResult<OperationDescriptor> {
    OperationDescriptor::builder("Binarize")
        .description("Thresholds a single-banded image to a bilevel image")
        .modes([Mode::PixelGrid, Mode::ResolutionIndependent])
        .source("source0")
        .parameter(
            ParameterSpec::new("threshold", ValueType::Float)
                .with_description("Samples at or above the threshold become 1"),
        )
        .validator(single_band)
        .layout(|_, block| {
            reshape(
                block,
                |mut g| {
                    g.bands = 1;
                    g.sample_type = SampleType::Byte;
                    g
                },
                |_| 1,
            )
        })
        .build()
}

fn single_band(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    match ctx.source_bands(0) {
        Some(bands) if bands != 1 => Err(ctx
            .fail(MessageKey::new("binarize.single_band").arg(bands))
            .with_context("bands", bands)),
        _ => Ok(()),
    }
}

// ============================================================================
// Lookup
// ============================================================================

/// Maps samples through a table.
pub fn lookup() -> RegistryResult<OperationDescriptor> {
    OperationDescriptor::builder("Lookup")
        .description("Maps every sample through a lookup table")
        .modes(Mode::ALL)
        .source("source0")
        .parameter(ParameterSpec::new("table", ValueType::DoubleArray))
        .validator(|ctx| match ctx.get_double_array("table") {
            Some(table) if table.is_empty() => Err(ctx.fail(MessageKey::new("lookup.empty_table"))),
            _ => Ok(()),
        })
        .build()
}

// ============================================================================
// ColorConvert
// ============================================================================

/// Converts between color spaces.
pub fn color_convert() -> RegistryResult<OperationDescriptor> {
    OperationDescriptor::builder("ColorConvert")
        .description("Converts an image to another color space")
        .modes(Mode::ALL)
        .source("source0")
        .parameter(
            ParameterSpec::new("colorSpace", ValueType::Enumerated(COLOR_SPACE.to_string()))
                .with_valid_values(all_color_spaces())
                .with_description("Target color space"),
        )
        .parameter(
            ParameterSpec::new("sourceSpace", ValueType::Enumerated(COLOR_SPACE.to_string()))
                .with_default(EnumValue::new(COLOR_SPACE, "RGB", 1))
                .with_valid_values(all_color_spaces())
                .with_description("Color space of the source"),
        )
        .validator(|ctx| {
            let (Some(space), Some(found)) = (ctx.get_enum("sourceSpace"), ctx.source_bands(0)) else {
                return Ok(());
            };
            match space_bands(space) {
                Some(expected) if expected != found => Err(ctx.fail(
                    MessageKey::new("color.band_mismatch")
                        .arg(&space.name)
                        .arg(expected)
                        .arg(found),
                )),
                _ => Ok(()),
            }
        })
        .layout(color_convert_layout)
        .build()
}

fn color_convert_layout(_mode: Mode, block: &ParameterBlock) -> Option<Layout> {
    let bands = block.get_enum("colorSpace").and_then(space_bands)?;
    reshape(
        block,
        |mut g| {
            g.bands = bands;
            g
        },
        |_| bands,
    )
}

// ============================================================================
// Format
// ============================================================================

/// Casts samples to another data type.
pub fn format() -> RegistryResult<OperationDescriptor> {
    OperationDescriptor::builder("Format")
        .description("Casts the samples of an image to another data type")
        .modes(Mode::ALL)
        .source("source0")
        .parameter(
            ParameterSpec::new("dataType", ValueType::Enumerated(DATA_TYPE.to_string()))
                .with_default(data_type(SampleType::Byte))
                .with_valid_values(DATA_TYPES.iter().map(|(_, t)| data_type(*t)).collect()),
        )
        .layout(|_, block| {
            let sample_type = block.get_enum("dataType").and_then(sample_type_of)?;
            reshape(
                block,
                |mut g| {
                    g.sample_type = sample_type;
                    g
                },
                |b| b,
            )
        })
        .build()
}
