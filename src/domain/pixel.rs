//! RGBA pixel buffers
//!
//! Every buffer the engine touches is a tightly packed width x height grid of
//! 8-bit R,G,B,A samples in row-major order (stride = width * 4).

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use thiserror::Error;

/// Bytes per pixel (R, G, B, A)
pub const CHANNELS: usize = 4;

/// Pixel buffer construction errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PixelError {
    #[error("Buffer dimensions must be non-zero, got {width}x{height}")]
    ZeroSized { width: u32, height: u32 },
    #[error("Buffer length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// A decoded RGBA8 image of fixed size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Create a fully transparent buffer
    pub fn new(width: u32, height: u32) -> Result<Self, PixelError> {
        if width == 0 || height == 0 {
            return Err(PixelError::ZeroSized { width, height });
        }
        Ok(PixelBuffer {
            image: RgbaImage::new(width, height),
        })
    }

    /// Create a buffer with every pixel set to `pixel`
    pub fn filled(width: u32, height: u32, pixel: [u8; 4]) -> Result<Self, PixelError> {
        if width == 0 || height == 0 {
            return Err(PixelError::ZeroSized { width, height });
        }
        Ok(PixelBuffer {
            image: RgbaImage::from_pixel(width, height, Rgba(pixel)),
        })
    }

    /// Wrap raw row-major RGBA bytes
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PixelError> {
        if width == 0 || height == 0 {
            return Err(PixelError::ZeroSized { width, height });
        }
        let expected = width as usize * height as usize * CHANNELS;
        let actual = data.len();
        if actual != expected {
            return Err(PixelError::LengthMismatch { expected, actual });
        }
        RgbaImage::from_raw(width, height, data)
            .map(|image| PixelBuffer { image })
            .ok_or(PixelError::LengthMismatch { expected, actual })
    }

    /// Build a buffer from a list of pixels in row-major order
    pub fn from_pixels(width: u32, height: u32, pixels: &[[u8; 4]]) -> Result<Self, PixelError> {
        let data = pixels.iter().flatten().copied().collect();
        Self::from_raw(width, height, data)
    }

    /// Resample a decoded image to exactly `width` x `height`
    ///
    /// Images already at the target size are converted without filtering.
    pub fn from_image(image: &DynamicImage, width: u32, height: u32) -> Result<Self, PixelError> {
        if width == 0 || height == 0 {
            return Err(PixelError::ZeroSized { width, height });
        }
        let rgba = if image.width() == width && image.height() == height {
            image.to_rgba8()
        } else {
            image::imageops::resize(&image.to_rgba8(), width, height, FilterType::Triangle)
        };
        Ok(PixelBuffer { image: rgba })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width() as usize * CHANNELS
    }

    /// Raw RGBA bytes, row-major
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    /// Pixel at (x, y); panics when out of bounds like `RgbaImage::get_pixel`
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: [u8; 4]) {
        self.image.put_pixel(x, y, Rgba(pixel));
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        PixelBuffer { image }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_rejects_wrong_length() {
        let err = PixelBuffer::from_raw(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(err, PixelError::LengthMismatch { expected: 16, actual: 15 });

        let err = PixelBuffer::from_raw(2, 2, vec![0; 20]).unwrap_err();
        assert_eq!(err, PixelError::LengthMismatch { expected: 16, actual: 20 });
    }

    #[test]
    fn test_zero_sized_rejected() {
        assert!(matches!(
            PixelBuffer::new(0, 4),
            Err(PixelError::ZeroSized { width: 0, height: 4 })
        ));
    }

    #[test]
    fn test_row_major_layout() {
        let buffer = PixelBuffer::from_pixels(
            2,
            2,
            &[[1, 0, 0, 255], [2, 0, 0, 255], [3, 0, 0, 255], [4, 0, 0, 255]],
        )
        .unwrap();

        assert_eq!(buffer.stride(), 8);
        assert_eq!(buffer.pixel(1, 0), [2, 0, 0, 255]);
        assert_eq!(buffer.pixel(0, 1), [3, 0, 0, 255]);
        assert_eq!(buffer.as_bytes()[12], 4);
    }

    #[test]
    fn test_from_image_resamples_to_target() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, Rgba([10, 20, 30, 255])));
        let buffer = PixelBuffer::from_image(&source, 4, 3).unwrap();

        assert_eq!(buffer.dimensions(), (4, 3));
        assert_eq!(buffer.pixel(3, 2), [10, 20, 30, 255]);
    }
}
