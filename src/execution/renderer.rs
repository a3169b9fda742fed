//! Rendering collaborator.
//!
//! The graph never computes pixels itself. A [`Renderer`] receives a node
//! (its descriptor, bound parameters and upstream references) and produces
//! the pixel buffer. Pixel kernels live behind this trait.

use crate::graph::node::Node;
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why a rendering attempt produced no image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderFailure {
    /// The kernel failed.
    Failed(String),
    /// The renderer observed a cancellation request.
    Cancelled,
}

impl RenderFailure {
    pub fn failed(message: impl Into<String>) -> Self {
        RenderFailure::Failed(message.into())
    }
}

/// Evaluates nodes into pixel data.
///
/// Implementations may render upstream nodes recursively; renderings
/// already stored on a node are available through [`Node::rendering`].
pub trait Renderer: Send + Sync {
    /// Render one node.
    fn render(&self, node: &Node, cancel: &CancellationToken) -> Result<DynamicImage, RenderFailure>;
}

impl<F> Renderer for F
where
    F: Fn(&Node, &CancellationToken) -> Result<DynamicImage, RenderFailure> + Send + Sync,
{
    fn render(&self, node: &Node, cancel: &CancellationToken) -> Result<DynamicImage, RenderFailure> {
        self(node, cancel)
    }
}

/// Shared cancellation flag for in-flight evaluations.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation request.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
