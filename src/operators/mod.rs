//! Built-in operator descriptors.
//!
//! This module contains the descriptors that ship with opgraph. Only the
//! contracts live here; pixel kernels belong to the renderer.

mod arithmetic;
mod collection;
mod color;
mod filter;
mod frequency;
mod geometry;
mod io;

use crate::core::error::RegistryResult;
use crate::core::mode::Mode;
use crate::core::params::ParameterBlock;
use crate::core::types::{ImageLayout, Layout, RenderableLayout};
use crate::registry::operation::OperationRegistry;

/// Register all built-in operators under every mode they declare.
pub fn register_all(registry: &mut OperationRegistry) -> RegistryResult<()> {
    arithmetic::register(registry)?;
    collection::register(registry)?;
    color::register(registry)?;
    filter::register(registry)?;
    frequency::register(registry)?;
    geometry::register(registry)?;
    io::register(registry)?;
    Ok(())
}

// Re-export for direct access
pub use arithmetic::{add, invert, multiply, subtract};
pub use collection::add_collection;
pub use color::{binarize, color_convert, color_space, data_type, format, lookup, COLOR_SPACE, DATA_TYPE};
pub use filter::{convolve, dither_mask_443, ordered_dither, ColorCube, COLOR_CUBE};
pub use frequency::{
    dft, idft, nature, scaling, COMPLEX, COMPLEX_TO_COMPLEX, COMPLEX_TO_REAL, DATA_NATURE,
    REAL_TO_COMPLEX, SCALING_DIMENSIONS, SCALING_NONE, SCALING_TYPE, SCALING_UNITARY,
};
pub use geometry::{crop, pattern};
pub use io::{encode, file_store, write_output, OutputStream, OUTPUT_STREAM};

// ============================================================================
// Layout helpers shared by the catalogue
// ============================================================================

/// Intersection of the layouts of every source, for operators that combine
/// sources pixel by pixel. Falls back to source 0 when the sources are not
/// all of one kind or do not overlap.
pub(crate) fn intersection_layout(_mode: Mode, block: &ParameterBlock) -> Option<Layout> {
    let layouts: Vec<Layout> = block.sources().iter().filter_map(|s| s.layout()).collect();
    let first = *layouts.first()?;
    let combined = match first {
        Layout::Grid(grid) => layouts
            .iter()
            .skip(1)
            .try_fold(grid, |acc, l| l.as_grid().and_then(|g| acc.intersect(g)))
            .map(Layout::Grid),
        Layout::Renderable(r) => layouts
            .iter()
            .skip(1)
            .try_fold(r, |acc, l| l.as_renderable().and_then(|o| intersect_renderable(&acc, o)))
            .map(Layout::Renderable),
    };
    combined.or(Some(first))
}

fn intersect_renderable(a: &RenderableLayout, b: &RenderableLayout) -> Option<RenderableLayout> {
    let min_x = a.min_x.max(b.min_x);
    let min_y = a.min_y.max(b.min_y);
    let max_x = (a.min_x + a.width).min(b.min_x + b.width);
    let max_y = (a.min_y + a.height).min(b.min_y + b.height);
    if max_x <= min_x || max_y <= min_y {
        return None;
    }
    Some(RenderableLayout::new(
        min_x,
        min_y,
        max_x - min_x,
        max_y - min_y,
        a.bands.min(b.bands),
    ))
}

/// Source 0's layout with its band count and sample type rewritten.
pub(crate) fn reshape(
    block: &ParameterBlock,
    reshape_grid: impl Fn(ImageLayout) -> ImageLayout,
    bands: impl Fn(u32) -> u32,
) -> Option<Layout> {
    match block.source(0)?.layout()? {
        Layout::Grid(grid) => Some(Layout::Grid(reshape_grid(grid))),
        Layout::Renderable(mut r) => {
            r.bands = bands(r.bands);
            Some(Layout::Renderable(r))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::{RenderableSource, SourceImage};
    use crate::core::types::SampleType;

    #[test]
    fn test_register_all_is_complete() {
        let mut registry = OperationRegistry::new();
        register_all(&mut registry).unwrap();
        for name in [
            "Add",
            "Subtract",
            "Multiply",
            "AddCollection",
            "Invert",
            "Binarize",
            "Pattern",
            "Crop",
            "Convolve",
            "OrderedDither",
            "Lookup",
            "DFT",
            "IDFT",
            "ColorConvert",
            "Format",
            "FileStore",
            "Encode",
        ] {
            assert!(!registry.modes_for(name).is_empty(), "{} not registered", name);
        }
        // Registering twice is a population conflict
        assert!(register_all(&mut registry).is_err());
    }

    #[test]
    fn test_intersection_layout() {
        let block = ParameterBlock::new()
            .with_source(SourceImage::new(ImageLayout::new(100, 100, 3, SampleType::Byte)))
            .with_source(SourceImage::new(
                ImageLayout::new(50, 50, 1, SampleType::Float).with_origin(10, 20),
            ));
        let layout = intersection_layout(Mode::PixelGrid, &block).unwrap();
        let grid = layout.as_grid().unwrap();
        assert_eq!((grid.min_x, grid.min_y, grid.width, grid.height), (10, 20, 50, 50));
        assert_eq!(grid.bands, 1);
        assert_eq!(grid.sample_type, SampleType::Float);

        let block = ParameterBlock::new()
            .with_source(RenderableSource::new(RenderableLayout::new(0.0, 0.0, 2.0, 1.0, 3)))
            .with_source(RenderableSource::new(RenderableLayout::new(1.0, 0.0, 2.0, 1.0, 3)));
        let layout = intersection_layout(Mode::ResolutionIndependent, &block).unwrap();
        assert_eq!(layout.as_renderable().unwrap().width, 1.0);
    }
}
