//! Displacement Engine
//!
//! CPU renderer for the classic displacement (warp) effect: every output pixel
//! is sampled from the base image at an offset read from the red and green
//! channels of a displacement map.

pub mod config;
pub mod domain;
pub mod engine;
pub mod loader;
pub mod pattern;

pub use domain::{DisplacementStrength, PixelBuffer, PixelError};
pub use engine::{
    Canvas, DecodeOutcome, DisplacementEngine, EngineError, EngineOptions, EngineState,
    ImageSource, PreviewSurface, RenderOutcome, SetOutcome,
};
pub use loader::{AssetLoader, DecodeError, ReferenceLoader};
