//! Procedural "broken" displacement maps
//!
//! Produces a neutral map in which a random subset of square blocks carries a
//! constant offset, so the warped image looks shattered into shifted tiles.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{PixelBuffer, PixelError};

/// Channel value meaning "no displacement"
pub const NEUTRAL: u8 = 128;

/// Block edge length in pixels per unit of `block_size`
pub const BLOCK_UNIT: u32 = 8;

/// Axes a broken block may shift along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Horizontal,
    Vertical,
    Both,
}

impl Direction {
    fn shifts_x(self) -> bool {
        matches!(self, Direction::Horizontal | Direction::Both)
    }

    fn shifts_y(self) -> bool {
        matches!(self, Direction::Vertical | Direction::Both)
    }
}

/// Parameters for a broken-tile map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrokenMap {
    noise_density: f64,
    direction: Direction,
    block_size: u32,
}

impl BrokenMap {
    /// Build parameters, clamping density to [0, 1] and block size to [1, 10]
    pub fn new(noise_density: f64, direction: Direction, block_size: u32) -> Self {
        let noise_density = if noise_density.is_nan() {
            0.0
        } else {
            noise_density.clamp(0.0, 1.0)
        };
        BrokenMap {
            noise_density,
            direction,
            block_size: block_size.clamp(1, 10),
        }
    }

    pub fn noise_density(&self) -> f64 {
        self.noise_density
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Edge length of one block in pixels
    pub fn block_pixels(&self) -> u32 {
        self.block_size * BLOCK_UNIT
    }

    /// Generate a `width` x `height` map; identical seeds give identical maps
    pub fn generate(&self, width: u32, height: u32, seed: u64) -> Result<PixelBuffer, PixelError> {
        let mut map = PixelBuffer::filled(width, height, [NEUTRAL, NEUTRAL, 0, 255])?;
        let mut rng = StdRng::seed_from_u64(seed);
        let block = self.block_pixels();
        let mut broken = 0usize;

        for block_y in (0..height).step_by(block as usize) {
            for block_x in (0..width).step_by(block as usize) {
                // Always draw the same values so block layout does not depend on direction
                let roll: f64 = rng.gen();
                let offset_x: u8 = rng.gen();
                let offset_y: u8 = rng.gen();
                if roll >= self.noise_density {
                    continue;
                }
                broken += 1;

                let r = if self.direction.shifts_x() { offset_x } else { NEUTRAL };
                let g = if self.direction.shifts_y() { offset_y } else { NEUTRAL };
                for y in block_y..(block_y + block).min(height) {
                    for x in block_x..(block_x + block).min(width) {
                        map.set_pixel(x, y, [r, g, 0, 255]);
                    }
                }
            }
        }

        debug!(
            width = width,
            height = height,
            block = block,
            broken_blocks = broken,
            "Generated broken displacement map"
        );

        Ok(map)
    }
}

impl Default for BrokenMap {
    fn default() -> Self {
        BrokenMap::new(0.5, Direction::Both, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_clamped() {
        let params = BrokenMap::new(3.0, Direction::Both, 40);
        assert_eq!(params.noise_density(), 1.0);
        assert_eq!(params.block_size(), 10);

        let params = BrokenMap::new(-1.0, Direction::Both, 0);
        assert_eq!(params.noise_density(), 0.0);
        assert_eq!(params.block_size(), 1);
    }

    #[test]
    fn test_zero_density_is_neutral() {
        let map = BrokenMap::new(0.0, Direction::Both, 1).generate(20, 12, 7).unwrap();
        for y in 0..12 {
            for x in 0..20 {
                assert_eq!(map.pixel(x, y), [NEUTRAL, NEUTRAL, 0, 255]);
            }
        }
    }

    #[test]
    fn test_horizontal_leaves_green_neutral() {
        let map = BrokenMap::new(1.0, Direction::Horizontal, 1).generate(32, 32, 3).unwrap();
        for y in 0..32 {
            for x in 0..32 {
                assert_eq!(map.pixel(x, y)[1], NEUTRAL);
            }
        }
    }

    #[test]
    fn test_vertical_leaves_red_neutral() {
        let map = BrokenMap::new(1.0, Direction::Vertical, 1).generate(32, 32, 3).unwrap();
        for y in 0..32 {
            for x in 0..32 {
                assert_eq!(map.pixel(x, y)[0], NEUTRAL);
            }
        }
    }

    #[test]
    fn test_blocks_are_uniform() {
        let params = BrokenMap::new(1.0, Direction::Both, 1);
        let map = params.generate(16, 16, 11).unwrap();
        let block = params.block_pixels();

        for block_y in (0..16).step_by(block as usize) {
            for block_x in (0..16).step_by(block as usize) {
                let expected = map.pixel(block_x, block_y);
                for y in block_y..block_y + block {
                    for x in block_x..block_x + block {
                        assert_eq!(map.pixel(x, y), expected);
                    }
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_map() {
        let params = BrokenMap::default();
        assert_eq!(
            params.generate(50, 40, 42).unwrap(),
            params.generate(50, 40, 42).unwrap()
        );
    }
}
