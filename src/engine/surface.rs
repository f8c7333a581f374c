//! Output and preview surfaces
//!
//! The engine renders into a bound [`FrameSink`] and mirrors the current
//! displacement map into an optional [`PreviewSink`].

use std::path::Path;
use image::imageops::FilterType;
use image::{ImageResult, RgbaImage};
use parking_lot::Mutex;

use crate::domain::PixelBuffer;

/// Surface that receives rendered frames
pub trait FrameSink: Send + Sync {
    /// Fixed output size; a zero dimension means the surface is unusable
    fn size(&self) -> (u32, u32);

    /// Take ownership of a freshly rendered frame
    fn present(&self, frame: PixelBuffer);
}

/// Secondary surface that shows the displacement map for inspection
pub trait PreviewSink: Send + Sync {
    fn viewport(&self) -> (u32, u32);

    /// Blit `map` into the surface, scaled to the viewport
    fn show(&self, map: &PixelBuffer);
}

/// In-memory output surface holding the most recent frame
pub struct Canvas {
    width: u32,
    height: u32,
    frame: Mutex<Option<PixelBuffer>>,
    presented: Mutex<u64>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Canvas {
            width,
            height,
            frame: Mutex::new(None),
            presented: Mutex::new(0),
        }
    }

    /// Copy of the last presented frame
    pub fn snapshot(&self) -> Option<PixelBuffer> {
        self.frame.lock().clone()
    }

    /// Remove and return the last presented frame
    pub fn take_frame(&self) -> Option<PixelBuffer> {
        self.frame.lock().take()
    }

    /// Number of frames presented so far
    pub fn frames_presented(&self) -> u64 {
        *self.presented.lock()
    }

    /// Encode the last frame as PNG; returns false when nothing was presented yet
    pub fn save_png(&self, path: &Path) -> ImageResult<bool> {
        match self.frame.lock().as_ref() {
            Some(frame) => {
                frame.as_image().save_with_format(path, image::ImageFormat::Png)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl FrameSink for Canvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn present(&self, frame: PixelBuffer) {
        *self.frame.lock() = Some(frame);
        *self.presented.lock() += 1;
    }
}

/// In-memory preview surface with its own viewport
pub struct PreviewSurface {
    image: Mutex<RgbaImage>,
}

impl PreviewSurface {
    pub fn new(width: u32, height: u32) -> Self {
        PreviewSurface {
            image: Mutex::new(RgbaImage::new(width, height)),
        }
    }

    pub fn snapshot(&self) -> RgbaImage {
        self.image.lock().clone()
    }

    pub fn save_png(&self, path: &Path) -> ImageResult<()> {
        self.image.lock().save_with_format(path, image::ImageFormat::Png)
    }
}

impl PreviewSink for PreviewSurface {
    fn viewport(&self) -> (u32, u32) {
        self.image.lock().dimensions()
    }

    fn show(&self, map: &PixelBuffer) {
        let mut image = self.image.lock();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        *image = if map.dimensions() == (width, height) {
            map.as_image().clone()
        } else {
            image::imageops::resize(map.as_image(), width, height, FilterType::Nearest)
        };
    }
}
