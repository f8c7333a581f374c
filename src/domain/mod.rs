//! Domain types shared by the engine, loaders and generators

mod pixel;
mod strength;

pub use pixel::{PixelBuffer, PixelError, CHANNELS};
pub use strength::{DisplacementStrength, DEFAULT_STRENGTH, MAX_STRENGTH, MIN_STRENGTH};
