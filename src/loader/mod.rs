//! Asset loading
//!
//! Turns image references into pixel buffers sized for the engine.

mod reference;
mod traits;

pub use reference::ReferenceLoader;
pub use traits::{AssetLoader, DecodeError, DecodeResult};
