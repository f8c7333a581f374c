//! Displacement sampling pass
//!
//! Warps a base image by per-pixel offsets read from a displacement map:
//! - Red (channel 0) drives horizontal offset
//! - Green (channel 1) drives vertical offset
//! - 128 = no displacement, 0 = pull from left/up, 255 = pull from right/down
//!
//! Sampling is nearest-neighbour with edge clamping, and all four channels
//! (alpha included) are copied verbatim from the sampled source pixel.

use rayon::prelude::*;

use crate::domain::{DisplacementStrength, PixelBuffer, CHANNELS};

/// Apply displacement mapping to `base`
///
/// `map` must have the same dimensions as `base`.
///
/// # Arguments
/// * `base` - The image to warp
/// * `map` - Displacement map (R = x offset, G = y offset)
/// * `strength` - Offset scale, 0-100
///
/// # Returns
/// A fresh buffer the size of `base`
pub fn displace(base: &PixelBuffer, map: &PixelBuffer, strength: DisplacementStrength) -> PixelBuffer {
    debug_assert_eq!(base.dimensions(), map.dimensions());

    let mut output = base.clone();
    let stride = base.stride();
    for (y, row) in output.as_bytes_mut().chunks_exact_mut(stride).enumerate() {
        displace_row(base, map, strength, y as u32, row);
    }
    output
}

/// Same as [`displace`], with rows split across the rayon pool
///
/// Each worker writes a disjoint output row and only reads the inputs, so the
/// result is identical to the sequential pass.
pub fn displace_parallel(
    base: &PixelBuffer,
    map: &PixelBuffer,
    strength: DisplacementStrength,
) -> PixelBuffer {
    debug_assert_eq!(base.dimensions(), map.dimensions());

    let mut output = base.clone();
    let stride = base.stride();
    output
        .as_bytes_mut()
        .par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(y, row)| displace_row(base, map, strength, y as u32, row));
    output
}

/// Fill one output row
fn displace_row(
    base: &PixelBuffer,
    map: &PixelBuffer,
    strength: DisplacementStrength,
    y: u32,
    row: &mut [u8],
) {
    let (width, height) = base.dimensions();
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;
    let stride = base.stride();
    let src = base.as_bytes();
    let disp = map.as_bytes();
    let map_row = y as usize * stride;

    for x in 0..width as usize {
        let index = x * CHANNELS;
        let offset_x = strength.offset_for(disp[map_row + index]);
        let offset_y = strength.offset_for(disp[map_row + index + 1]);

        // Clamp first, then floor; coordinates are non-negative after the clamp
        let src_x = (x as f64 + offset_x).clamp(0.0, max_x).floor() as usize;
        let src_y = (y as f64 + offset_y).clamp(0.0, max_y).floor() as usize;

        let src_index = src_y * stride + src_x * CHANNELS;
        row[index..index + CHANNELS].copy_from_slice(&src[src_index..src_index + CHANNELS]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut buffer = PixelBuffer::new(width, height).unwrap();
        for y in 0..height {
            for x in 0..width {
                buffer.set_pixel(x, y, [x as u8, y as u8, (x + y) as u8, (10 + x * 3 + y) as u8]);
            }
        }
        buffer
    }

    #[test]
    fn test_neutral_map_is_identity() {
        let base = gradient(7, 5);
        let map = PixelBuffer::filled(7, 5, [128, 128, 0, 255]).unwrap();

        for amount in [0.0, 1.0, 50.0, 100.0] {
            let output = displace(&base, &map, DisplacementStrength::new(amount));
            assert_eq!(output, base, "strength {}", amount);
        }
    }

    #[test]
    fn test_zero_strength_ignores_map() {
        let base = gradient(6, 6);
        let map = PixelBuffer::filled(6, 6, [0, 255, 0, 255]).unwrap();
        assert_eq!(displace(&base, &map, DisplacementStrength::new(0.0)), base);
    }

    #[test]
    fn test_full_offset_clamps_to_edges() {
        let base = gradient(4, 3);

        // R=255, G=255 pushes the sample far right/down
        let map = PixelBuffer::filled(4, 3, [255, 255, 0, 255]).unwrap();
        let output = displace(&base, &map, DisplacementStrength::new(100.0));
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(output.pixel(x, y), base.pixel(3, 2));
            }
        }

        // R=0, G=0 pulls the sample far left/up
        let map = PixelBuffer::filled(4, 3, [0, 0, 0, 255]).unwrap();
        let output = displace(&base, &map, DisplacementStrength::new(100.0));
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(output.pixel(x, y), base.pixel(0, 0));
            }
        }
    }

    #[test]
    fn test_fractional_offset_floors() {
        let base = gradient(4, 1);
        // (192 - 128) * 2 / 128 = 1.0, (160 - 128) * 2 / 128 = 0.5
        let mut map = PixelBuffer::filled(4, 1, [128, 128, 0, 255]).unwrap();
        map.set_pixel(0, 0, [192, 128, 0, 255]);
        map.set_pixel(1, 0, [160, 128, 0, 255]);
        // (96 - 128) * 2 / 128 = -0.5 -> 1.5 floors to 1
        map.set_pixel(2, 0, [96, 128, 0, 255]);

        let output = displace(&base, &map, DisplacementStrength::new(2.0));
        assert_eq!(output.pixel(0, 0), base.pixel(1, 0));
        assert_eq!(output.pixel(1, 0), base.pixel(1, 0));
        assert_eq!(output.pixel(2, 0), base.pixel(1, 0));
        assert_eq!(output.pixel(3, 0), base.pixel(3, 0));
    }

    #[test]
    fn test_alpha_follows_sampled_pixel() {
        let mut base = PixelBuffer::filled(3, 1, [50, 50, 50, 255]).unwrap();
        base.set_pixel(2, 0, [9, 9, 9, 7]);
        // Sample pixel 0 from two pixels to the right
        let mut map = PixelBuffer::filled(3, 1, [128, 128, 0, 255]).unwrap();
        map.set_pixel(0, 0, [255, 128, 0, 0]);

        let output = displace(&base, &map, DisplacementStrength::new(100.0));
        assert_eq!(output.pixel(0, 0), [9, 9, 9, 7]);
        assert_eq!(output.pixel(1, 0)[3], 255);
    }

    #[test]
    fn test_vertical_offset_uses_green() {
        let base = gradient(2, 4);
        // (192 - 128) * 4 / 128 = 2 rows down
        let map = PixelBuffer::filled(2, 4, [128, 192, 0, 255]).unwrap();

        let output = displace(&base, &map, DisplacementStrength::new(4.0));
        assert_eq!(output.pixel(0, 0), base.pixel(0, 2));
        assert_eq!(output.pixel(1, 1), base.pixel(1, 3));
        assert_eq!(output.pixel(1, 3), base.pixel(1, 3));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let base = gradient(31, 17);
        let mut map = PixelBuffer::new(31, 17).unwrap();
        for y in 0..17 {
            for x in 0..31 {
                map.set_pixel(x, y, [(x * 8) as u8, (255 - y * 15) as u8, 0, 255]);
            }
        }
        let strength = DisplacementStrength::new(37.5);
        assert_eq!(displace(&base, &map, strength), displace_parallel(&base, &map, strength));
    }
}
