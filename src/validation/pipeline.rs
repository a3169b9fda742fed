//! Validation pipeline implementation.

use crate::core::descriptor::OperationDescriptor;
use crate::core::error::ValidationResult;
use crate::core::mode::Mode;
use crate::core::params::ParameterBlock;
use crate::core::source::{CollectionKind, Source};
use crate::registry::codec::CodecRegistry;
use crate::validation::stages::{
    CustomValidation, ModeValidation, ParameterValidation, SourceValidation, ValidationRequest,
    ValidationStage,
};
use log::debug;

/// Multi-stage validation pipeline.
///
/// Runs its stages in order against one parameter block and stops at the
/// first failure. Validation never evaluates pixels and never touches the
/// caller's block; the defaulted block is returned on success.
pub struct ValidationPipeline {
    stages: Vec<Box<dyn ValidationStage>>,
}

impl ValidationPipeline {
    /// Create a new pipeline with the given stages.
    pub fn new(stages: Vec<Box<dyn ValidationStage>>) -> Self {
        Self { stages }
    }

    /// The four standard stages: mode, sources, parameters, custom.
    pub fn standard() -> Self {
        Self {
            stages: vec![
                Box::new(ModeValidation),
                Box::new(SourceValidation),
                Box::new(ParameterValidation),
                Box::new(CustomValidation),
            ],
        }
    }

    /// Add a stage after the existing ones.
    pub fn add_stage(&mut self, stage: Box<dyn ValidationStage>) {
        self.stages.push(stage);
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Validate `block` for `descriptor` in `mode`.
    pub fn validate(
        &self,
        descriptor: &OperationDescriptor,
        mode: Mode,
        block: &ParameterBlock,
        codecs: &CodecRegistry,
    ) -> ValidationResult<ParameterBlock> {
        let mut request = ValidationRequest {
            descriptor,
            mode,
            block: block.clone(),
            codecs,
        };
        for stage in &self.stages {
            stage.validate(&mut request)?;
        }
        debug!(
            "Validated {} in {} mode ({} sources, {} parameters)",
            descriptor.name(),
            mode,
            request.block.num_sources(),
            request.block.num_parameters()
        );
        Ok(request.block)
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

/// Split a collection-mode block into one block per element.
///
/// Each collection source contributes its i-th member; other sources are
/// repeated for every element. The element count is the size of the
/// smallest collection. The container category is the first one that can
/// be rebuilt, else `Sequence`. Returns `None` when no source is a
/// collection.
pub fn element_blocks(block: &ParameterBlock) -> Option<(CollectionKind, Vec<ParameterBlock>)> {
    let views: Vec<Option<(CollectionKind, Vec<Source>)>> =
        block.sources().iter().map(|s| s.collection_view()).collect();

    let len = views.iter().flatten().map(|(_, members)| members.len()).min()?;
    let kind = views
        .iter()
        .flatten()
        .map(|(kind, _)| kind)
        .find(|kind| kind.is_reconstructible())
        .cloned()
        .unwrap_or(CollectionKind::Sequence);

    let blocks = (0..len)
        .map(|i| {
            let sources = block
                .sources()
                .iter()
                .zip(&views)
                .map(|(source, view)| match view {
                    Some((_, members)) => members[i].clone(),
                    None => source.clone(),
                })
                .collect();
            block.with_sources_replaced(sources)
        })
        .collect();
    Some((kind, blocks))
}
