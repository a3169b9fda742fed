//! Engine façade.
//!
//! The engine ties the registry, the validation pipeline and node
//! construction together behind `create`, and hands evaluation off to a
//! [`Renderer`].

use crate::core::descriptor::OperationDescriptor;
use crate::core::error::{
    ExecutionError, ExecutionResult, OpGraphError, OpGraphResult, RegistryError, RegistryResult,
    ValidationError,
};
use crate::core::mode::Mode;
use crate::core::params::ParameterBlock;
use crate::core::types::Value;
use crate::execution::renderer::{CancellationToken, RenderFailure, Renderer};
use crate::graph::builder::{BuildOptions, NodeBuilder};
use crate::graph::node::Node;
use crate::registry::codec::CodecRegistry;
use crate::registry::operation::OperationRegistry;
use crate::validation::pipeline::ValidationPipeline;
use image::DynamicImage;
use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;

/// Engine options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Evaluate immediate operators while they are created.
    pub evaluate_immediate: bool,
    /// Populate the per-node property cache.
    pub cache_properties: bool,
    /// Log rejected parameter blocks at warn level.
    pub log_validation_failures: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            evaluate_immediate: true,
            cache_properties: true,
            log_validation_failures: false,
        }
    }
}

impl EngineOptions {
    /// Create a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable immediate evaluation.
    pub fn with_evaluate_immediate(mut self, evaluate: bool) -> Self {
        self.evaluate_immediate = evaluate;
        self
    }

    /// Enable/disable the property cache.
    pub fn with_property_cache(mut self, cache: bool) -> Self {
        self.cache_properties = cache;
        self
    }

    /// Enable/disable validation failure logging.
    pub fn with_validation_logging(mut self, log: bool) -> Self {
        self.log_validation_failures = log;
        self
    }

    /// Parse options from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> OpGraphResult<Self> {
        toml::from_str(text).map_err(OpGraphError::from)
    }
}

/// The graph engine.
pub struct Engine {
    registry: Arc<OperationRegistry>,
    codecs: Arc<CodecRegistry>,
    renderer: Option<Arc<dyn Renderer>>,
    pipeline: ValidationPipeline,
    options: EngineOptions,
    cancel: CancellationToken,
}

impl Engine {
    /// Create an engine over a populated registry.
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self {
            registry,
            codecs: Arc::new(CodecRegistry::with_defaults()),
            renderer: None,
            pipeline: ValidationPipeline::standard(),
            options: EngineOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Create an engine over the process-wide built-in registry.
    pub fn with_builtins() -> RegistryResult<Self> {
        Ok(Self::new(OperationRegistry::global()?))
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn with_codecs(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn with_pipeline(mut self, pipeline: ValidationPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Token observed by renderers during evaluation.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register an operator for `modes`.
    ///
    /// Nodes already created keep the registry state they were built with.
    /// If the registry is shared with other engines it is copied first.
    pub fn register_operator(
        &mut self,
        descriptor: OperationDescriptor,
        modes: impl IntoIterator<Item = Mode>,
    ) -> RegistryResult<()> {
        Arc::make_mut(&mut self.registry).register(descriptor, modes)
    }

    // ========================================================================
    // Node creation
    // ========================================================================

    /// Create a deferred node for operator `name` applied to `block`.
    ///
    /// Immediate operators are rendered before returning when
    /// `evaluate_immediate` is set. Without a renderer that fails with
    /// [`ExecutionError::NoRenderer`] and no node is returned.
    pub fn create(&self, name: &str, block: ParameterBlock, mode: Mode) -> OpGraphResult<Node> {
        let descriptor = self.resolve(name, mode)?;

        let validated = match self
            .pipeline
            .validate(&descriptor, mode, &block, &self.codecs)
        {
            Ok(validated) => validated,
            Err(error) => {
                if self.options.log_validation_failures {
                    warn!("{} [{}]", error, error.message_key().key);
                }
                return Err(error.into());
            }
        };

        let node = NodeBuilder::new(&self.registry)
            .with_options(BuildOptions {
                cache_properties: self.options.cache_properties,
            })
            .build(&descriptor, mode, validated);

        if descriptor.is_immediate() && self.options.evaluate_immediate {
            self.evaluate_immediate(&node)?;
        }
        Ok(node)
    }

    /// Shorthand for `create` in pixel-grid mode.
    pub fn create_grid(&self, name: &str, block: ParameterBlock) -> OpGraphResult<Node> {
        self.create(name, block, Mode::PixelGrid)
    }

    fn resolve(&self, name: &str, mode: Mode) -> OpGraphResult<Arc<OperationDescriptor>> {
        match self.registry.lookup(name, mode) {
            Ok(descriptor) => Ok(descriptor),
            Err(RegistryError::NotFound { .. }) => {
                // Known operator, wrong mode
                let supported = self.registry.modes_for(name);
                let first = supported.iter().next();
                match first {
                    Some(other) => {
                        let descriptor = self.registry.lookup(name, other)?;
                        Err(ValidationError::UnsupportedMode {
                            operation: descriptor.name().to_string(),
                            mode,
                            supported,
                        }
                        .into())
                    }
                    None => Err(RegistryError::NotFound {
                        operation: name.to_string(),
                        mode,
                    }
                    .into()),
                }
            }
            Err(other) => Err(other.into()),
        }
    }

    fn evaluate_immediate(&self, node: &Node) -> OpGraphResult<()> {
        if self.renderer.is_none() {
            return Err(ExecutionError::NoRenderer {
                node_id: node.id(),
                operation: node.operation_name().to_string(),
            }
            .into());
        }
        if node.is_collection() {
            for member in node.members() {
                self.force_evaluate(member)?;
            }
        } else {
            self.force_evaluate(node)?;
        }
        debug!("Evaluated immediate node {}", node);
        Ok(())
    }

    // ========================================================================
    // Properties and evaluation
    // ========================================================================

    /// Look up a node property. `None` means no information is available.
    pub fn get_property(&self, node: &Node, name: &str) -> Option<Value> {
        node.property(name)
    }

    /// Render a node, or return the rendering stored by an earlier call.
    pub fn force_evaluate(&self, node: &Node) -> ExecutionResult<Arc<DynamicImage>> {
        if let Some(rendering) = node.rendering() {
            return Ok(rendering);
        }
        if node.is_collection() {
            return Err(ExecutionError::CollectionNode {
                node_id: node.id(),
                operation: node.operation_name().to_string(),
            });
        }
        let renderer = self.renderer.as_ref().ok_or_else(|| ExecutionError::NoRenderer {
            node_id: node.id(),
            operation: node.operation_name().to_string(),
        })?;
        if self.cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        debug!("Rendering {}", node);
        match renderer.render(node, &self.cancel) {
            Ok(image) => Ok(node.store_rendering(Arc::new(image))),
            Err(RenderFailure::Cancelled) => Err(ExecutionError::Cancelled),
            Err(RenderFailure::Failed(error)) => Err(ExecutionError::RenderFailed {
                node_id: node.id(),
                operation: node.operation_name().to_string(),
                error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ValidationErrorKind;
    use crate::core::mode::ModeSet;
    use crate::core::source::SourceImage;
    use crate::core::types::{ImageLayout, SampleType};
    use image::GrayImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine() -> Engine {
        Engine::new(Arc::new(OperationRegistry::with_builtins().unwrap()))
    }

    fn gray(width: u32, height: u32) -> SourceImage {
        SourceImage::new(ImageLayout::new(width, height, 1, SampleType::Byte))
    }

    fn counting_renderer(counter: Arc<AtomicUsize>) -> impl Renderer {
        move |node: &Node, _: &CancellationToken| -> Result<DynamicImage, RenderFailure> {
            counter.fetch_add(1, Ordering::SeqCst);
            let layout = node.layout().and_then(|l| l.as_grid().copied());
            let (w, h) = layout.map(|l| (l.width, l.height)).unwrap_or((1, 1));
            Ok(DynamicImage::ImageLuma8(GrayImage::new(w, h)))
        }
    }

    #[test]
    fn test_options_from_toml() {
        let options = EngineOptions::from_toml_str("evaluate_immediate = false\n").unwrap();
        assert!(!options.evaluate_immediate);
        assert!(options.cache_properties);
        assert!(!options.log_validation_failures);

        let err = EngineOptions::from_toml_str("cache_properties = \"yes\"").unwrap_err();
        assert!(matches!(err, OpGraphError::Config(_)));
    }

    #[test]
    fn test_create_unknown_operator() {
        let err = engine()
            .create("NoSuchOperator", ParameterBlock::new(), Mode::PixelGrid)
            .unwrap_err();
        assert!(matches!(err, OpGraphError::Registry(RegistryError::NotFound { .. })));
    }

    #[test]
    fn test_unregistered_mode_is_unsupported() {
        let err = engine()
            .create("Binarize", ParameterBlock::new().with_source(gray(4, 4)), Mode::Collection)
            .unwrap_err();
        let validation = err.as_validation().unwrap();
        assert_eq!(validation.kind(), ValidationErrorKind::UnsupportedMode);
    }

    #[test]
    fn test_force_evaluate_caches_rendering() {
        let counter = Arc::new(AtomicUsize::new(0));
        let engine = engine().with_renderer(counting_renderer(Arc::clone(&counter)));
        let node = engine
            .create_grid("Invert", ParameterBlock::new().with_source(gray(6, 3)))
            .unwrap();

        let first = engine.force_evaluate(&node).unwrap();
        let second = engine.force_evaluate(&node).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.width(), 6);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_force_evaluate_without_renderer() {
        let engine = engine();
        let node = engine
            .create_grid("Invert", ParameterBlock::new().with_source(gray(2, 2)))
            .unwrap();
        assert!(matches!(
            engine.force_evaluate(&node),
            Err(ExecutionError::NoRenderer { .. })
        ));
    }

    #[test]
    fn test_immediate_operator_needs_a_renderer() {
        let mut engine = engine();
        let descriptor = OperationDescriptor::builder("Touch")
            .modes([Mode::PixelGrid])
            .source("source0")
            .immediate(true)
            .build()
            .unwrap();
        engine.register_operator(descriptor, [Mode::PixelGrid]).unwrap();

        let err = engine
            .create_grid("Touch", ParameterBlock::new().with_source(gray(3, 3)))
            .unwrap_err();
        assert!(matches!(
            err,
            OpGraphError::Execution(ExecutionError::NoRenderer { ref operation, .. }) if operation == "Touch"
        ));

        let counter = Arc::new(AtomicUsize::new(0));
        let engine = engine.with_renderer(counting_renderer(Arc::clone(&counter)));
        let node = engine
            .create_grid("Touch", ParameterBlock::new().with_source(gray(3, 3)))
            .unwrap();
        assert!(node.rendering().is_some());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_render_failure_and_cancellation() {
        let failing = |_: &Node, _: &CancellationToken| -> Result<DynamicImage, RenderFailure> {
            Err(RenderFailure::failed("kernel missing"))
        };
        let engine = engine().with_renderer(failing);
        let node = engine
            .create_grid("Invert", ParameterBlock::new().with_source(gray(2, 2)))
            .unwrap();
        match engine.force_evaluate(&node) {
            Err(ExecutionError::RenderFailed { error, .. }) => assert_eq!(error, "kernel missing"),
            other => panic!("unexpected {:?}", other),
        }

        engine.cancellation_token().cancel();
        assert!(matches!(engine.force_evaluate(&node), Err(ExecutionError::Cancelled)));
    }

    #[test]
    fn test_register_operator_copies_shared_registry() {
        let shared = Arc::new(OperationRegistry::with_builtins().unwrap());
        let mut engine = Engine::new(Arc::clone(&shared));
        let descriptor = OperationDescriptor::builder("Identity")
            .modes([Mode::PixelGrid])
            .source("source0")
            .build()
            .unwrap();
        engine.register_operator(descriptor, [Mode::PixelGrid]).unwrap();

        assert!(engine.registry().contains("identity", Mode::PixelGrid));
        assert!(!shared.contains("identity", Mode::PixelGrid));
        assert_eq!(engine.registry().modes_for("Identity"), ModeSet::from(Mode::PixelGrid));
    }

    #[test]
    fn test_cache_option_reaches_nodes() {
        let engine = engine().with_options(EngineOptions::new().with_property_cache(false));
        let node = engine
            .create_grid("Invert", ParameterBlock::new().with_source(gray(2, 2)))
            .unwrap();
        assert_eq!(engine.get_property(&node, "image_width"), Some(Value::Integer(2)));
        assert_eq!(node.cached_property_count(), 0);
    }
}
