//! Operators consuming a whole image collection.

use crate::core::descriptor::{OperationDescriptor, SourceSpec};
use crate::core::error::RegistryResult;
use crate::core::mode::Mode;
use crate::core::params::ParameterBlock;
use crate::core::source::SourceKind;
use crate::core::types::Layout;
use crate::operators::intersection_layout;
use crate::registry::operation::OperationRegistry;

/// Register collection operators.
pub fn register(registry: &mut OperationRegistry) -> RegistryResult<()> {
    registry.register_all_modes(add_collection()?)?;
    Ok(())
}

/// Sums every member of a collection of at least two images.
pub fn add_collection() -> RegistryResult<OperationDescriptor> {
    let mut builder = OperationDescriptor::builder("AddCollection")
        .description("Adds all images of a collection pixel by pixel")
        .modes([Mode::PixelGrid, Mode::ResolutionIndependent])
        .layout(member_intersection);
    for mode in [Mode::PixelGrid, Mode::ResolutionIndependent] {
        builder = builder.mode_source(
            mode,
            SourceSpec::new("source0", SourceKind::collection_of(SourceKind::for_mode(mode), 2)),
        );
    }
    builder.build()
}

fn member_intersection(mode: Mode, block: &ParameterBlock) -> Option<Layout> {
    let (_, members) = block.source(0)?.collection_view()?;
    intersection_layout(mode, &block.with_sources_replaced(members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ValidationError, ValidationErrorKind};
    use crate::core::source::{ImageCollection, RenderableSource, SourceImage};
    use crate::core::types::{ImageLayout, RenderableLayout, SampleType};
    use crate::registry::codec::CodecRegistry;
    use crate::validation::ValidationPipeline;

    fn gray(size: u32) -> SourceImage {
        SourceImage::new(ImageLayout::new(size, size, 1, SampleType::Byte))
    }

    fn validate(block: &ParameterBlock, mode: Mode) -> Result<ParameterBlock, ValidationError> {
        ValidationPipeline::standard().validate(&add_collection().unwrap(), mode, block, &CodecRegistry::new())
    }

    #[test]
    fn test_single_member_collection_is_invalid() {
        let block = ParameterBlock::new().with_source(ImageCollection::sequence(vec![gray(4).into()]));
        let err = validate(&block, Mode::PixelGrid).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::SourceCollectionInvalid);
        assert_eq!(err.source_index(), Some(0));
    }

    #[test]
    fn test_member_kind_is_checked() {
        let renderable = RenderableSource::new(RenderableLayout::new(0.0, 0.0, 1.0, 1.0, 1));
        let block = ParameterBlock::new()
            .with_source(ImageCollection::sequence(vec![gray(4).into(), renderable.into()]));
        match validate(&block, Mode::PixelGrid).unwrap_err() {
            ValidationError::SourceTypeMismatch { member, .. } => assert_eq!(member, Some(1)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_plain_image_is_not_a_collection() {
        let block = ParameterBlock::new().with_source(gray(4));
        let err = validate(&block, Mode::PixelGrid).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::SourceTypeMismatch);
    }

    #[test]
    fn test_layout_is_member_intersection() {
        let block = ParameterBlock::new()
            .with_source(ImageCollection::sequence(vec![gray(8).into(), gray(6).into(), gray(7).into()]));
        let validated = validate(&block, Mode::PixelGrid).unwrap();
        let layout = add_collection()
            .unwrap()
            .derive_layout(Mode::PixelGrid, &validated)
            .unwrap();
        assert_eq!(layout.as_grid().map(|g| g.width), Some(6));
    }
}
