//! Frequency-domain transforms.
//!
//! Both transforms publish the `complex` property, so downstream operators
//! can tell whether their input holds interleaved real/imaginary bands.

use crate::core::context::ValidationContext;
use crate::core::descriptor::{OperationDescriptor, ParameterSpec};
use crate::core::error::{RegistryResult, ValidationResult};
use crate::core::messages::MessageKey;
use crate::core::mode::{Mode, ModeSet};
use crate::core::params::ParameterBlock;
use crate::core::types::{EnumValue, Layout, SampleType, Value, ValueType};
use crate::graph::properties::PropertyGenerator;
use crate::operators::reshape;
use crate::registry::operation::OperationRegistry;

/// Property set by DFT and IDFT nodes.
pub const COMPLEX: &str = "complex";

/// Enumeration type of the `scalingType` parameter.
pub const SCALING_TYPE: &str = "DFTScalingType";

/// Enumeration type of the `dataNature` parameter.
pub const DATA_NATURE: &str = "DFTDataNature";

pub const SCALING_NONE: (&str, i32) = ("SCALING_NONE", 1);
pub const SCALING_UNITARY: (&str, i32) = ("SCALING_UNITARY", 2);
pub const SCALING_DIMENSIONS: (&str, i32) = ("SCALING_DIMENSIONS", 3);

pub const REAL_TO_COMPLEX: (&str, i32) = ("REAL_TO_COMPLEX", 1);
pub const COMPLEX_TO_COMPLEX: (&str, i32) = ("COMPLEX_TO_COMPLEX", 2);
pub const COMPLEX_TO_REAL: (&str, i32) = ("COMPLEX_TO_REAL", 3);

/// Register the transforms.
pub fn register(registry: &mut OperationRegistry) -> RegistryResult<()> {
    registry.register_all_modes(dft()?)?;
    registry.register_all_modes(idft()?)?;
    Ok(())
}

pub fn scaling(member: (&str, i32)) -> EnumValue {
    EnumValue::new(SCALING_TYPE, member.0, member.1)
}

pub fn nature(member: (&str, i32)) -> EnumValue {
    EnumValue::new(DATA_NATURE, member.0, member.1)
}

fn is_nature(value: &EnumValue, member: (&str, i32)) -> bool {
    value.name.eq_ignore_ascii_case(member.0)
}

/// Forward transform.
pub fn dft() -> RegistryResult<OperationDescriptor> {
    transform("DFT", "Computes the discrete Fourier transform of an image", SCALING_NONE, REAL_TO_COMPLEX)
}

/// Inverse transform.
pub fn idft() -> RegistryResult<OperationDescriptor> {
    transform(
        "IDFT",
        "Computes the inverse discrete Fourier transform of an image",
        SCALING_DIMENSIONS,
        COMPLEX_TO_REAL,
    )
}

fn transform(
    name: &str,
    description: &str,
    default_scaling: (&str, i32),
    default_nature: (&str, i32),
) -> RegistryResult<OperationDescriptor> {
    let modes = [Mode::PixelGrid, Mode::ResolutionIndependent];
    OperationDescriptor::builder(name)
        .description(description)
        .modes(modes)
        .source("source0")
        .parameter(
            ParameterSpec::new("scalingType", ValueType::Enumerated(SCALING_TYPE.to_string()))
                .with_default(scaling(default_scaling))
                .with_valid_values(
                    [SCALING_NONE, SCALING_UNITARY, SCALING_DIMENSIONS]
                        .into_iter()
                        .map(scaling)
                        .collect(),
                ),
        )
        .parameter(
            ParameterSpec::new("dataNature", ValueType::Enumerated(DATA_NATURE.to_string()))
                .with_default(nature(default_nature))
                .with_valid_values(
                    [REAL_TO_COMPLEX, COMPLEX_TO_COMPLEX, COMPLEX_TO_REAL]
                        .into_iter()
                        .map(nature)
                        .collect(),
                ),
        )
        .validator(even_bands_for_complex_input)
        .layout(transform_layout)
        .property_generator(PropertyGenerator::new(
            format!("{}.complex", name.to_ascii_lowercase()),
            &[COMPLEX],
            modes.into_iter().collect::<ModeSet>(),
            |_, node| {
                node.parameters()
                    .get_enum("dataNature")
                    .map(|n| Value::Boolean(!is_nature(n, COMPLEX_TO_REAL)))
            },
        ))
        .build()
}

/// Complex input is stored as interleaved real/imaginary bands. Only
/// checked for pixel-grid sources, whose band count is known.
fn even_bands_for_complex_input(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    if ctx.mode() != Mode::PixelGrid {
        return Ok(());
    }
    let real_input = ctx
        .get_enum("dataNature")
        .map_or(true, |n| is_nature(n, REAL_TO_COMPLEX));
    match ctx.source_bands(0) {
        Some(bands) if !real_input && bands % 2 != 0 => {
            Err(ctx.fail(MessageKey::new("dft.odd_band_count").arg(bands)))
        }
        _ => Ok(()),
    }
}

fn transform_layout(_mode: Mode, block: &ParameterBlock) -> Option<Layout> {
    let nature = block.get_enum("dataNature")?.clone();
    let bands = move |b: u32| {
        if is_nature(&nature, REAL_TO_COMPLEX) {
            b.saturating_mul(2)
        } else if is_nature(&nature, COMPLEX_TO_REAL) {
            (b / 2).max(1)
        } else {
            b
        }
    };
    reshape(
        block,
        |mut g| {
            g.bands = bands(g.bands);
            if g.sample_type != SampleType::Double {
                g.sample_type = SampleType::Float;
            }
            g
        },
        &bands,
    )
}
