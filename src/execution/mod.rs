//! Execution module.
//!
//! Node creation and the hand-off to the external renderer.

pub mod engine;
pub mod renderer;

pub use engine::{Engine, EngineOptions};
pub use renderer::{CancellationToken, RenderFailure, Renderer};
