//! Asset loader contract
//!
//! The engine never decodes image formats itself. A loader turns a reference
//! (URL, data URL, file path) into a pixel buffer resampled to the size the
//! engine asks for.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{PixelBuffer, PixelError};

// ============================================================================
// Error Types
// ============================================================================

/// Decode failures reported through the engine's error channel
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("HTTP {status} fetching {url}")]
    Http { status: u16, url: String },

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid pixel buffer: {0}")]
    Pixels(#[from] PixelError),

    #[error("Unsupported reference: {0}")]
    Unsupported(String),

    #[error("Decode task failed: {0}")]
    Join(String),
}

/// Result type for loader operations
pub type DecodeResult<T> = Result<T, DecodeError>;

// ============================================================================
// Loader Trait
// ============================================================================

/// Decodes image references for the engine
#[async_trait]
pub trait AssetLoader: Send + Sync {
    /// Short loader name for logs
    fn name(&self) -> &'static str;

    /// Decode `reference` and resample it to exactly `width` x `height`
    async fn load(&self, reference: &str, width: u32, height: u32) -> DecodeResult<PixelBuffer>;
}
