//! Default asset loader
//!
//! Resolves `data:` URLs, `http(s)://` URLs, `file://` URLs and plain file
//! paths, decodes them with the `image` crate and resamples to the engine size.

use std::path::{Path, PathBuf};
use std::time::Duration;
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use tracing::{debug, instrument};
use url::Url;

use crate::config::LoaderSettings;
use crate::domain::PixelBuffer;
use super::traits::{AssetLoader, DecodeError, DecodeResult};

/// Where a reference points to
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Data(String),
    Remote(Url),
    File(PathBuf),
}

impl Location {
    fn parse(reference: &str) -> DecodeResult<Self> {
        let trimmed = reference.trim();
        if trimmed.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")) {
            return Ok(Location::Data(trimmed.to_string()));
        }

        match Url::parse(trimmed) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Location::Remote(url)),
                "file" => url
                    .to_file_path()
                    .map(Location::File)
                    .map_err(|_| DecodeError::Unsupported(trimmed.to_string())),
                // Drive letters parse as one-character schemes
                scheme if scheme.len() == 1 => Ok(Location::File(PathBuf::from(trimmed))),
                _ => Err(DecodeError::Unsupported(trimmed.to_string())),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Location::File(PathBuf::from(trimmed))),
            Err(_) => Err(DecodeError::Unsupported(trimmed.to_string())),
        }
    }
}

/// Decode the payload of a `data:` URL
fn decode_data_url(reference: &str) -> DecodeResult<Vec<u8>> {
    let body = &reference[5..];
    let (meta, payload) = body
        .split_once(',')
        .ok_or_else(|| DecodeError::InvalidDataUrl("missing ',' separator".to_string()))?;

    if meta.to_ascii_lowercase().ends_with(";base64") {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| DecodeError::InvalidDataUrl(e.to_string()))
    } else {
        Ok(percent_decode_str(payload).collect())
    }
}

/// Loader backed by reqwest and the local filesystem
pub struct ReferenceLoader {
    http_client: reqwest::Client,
}

impl ReferenceLoader {
    /// Create a loader from settings
    pub fn new(settings: &LoaderSettings) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(ReferenceLoader { http_client })
    }

    /// Fetch encoded bytes from a remote URL
    async fn fetch(&self, url: &Url) -> DecodeResult<Bytes> {
        debug!(url = %url, "Fetching image");

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DecodeError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DecodeError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        response.bytes().await.map_err(|e| DecodeError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn read_file(path: &Path) -> DecodeResult<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|source| DecodeError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Decode and resample encoded bytes off the async executor
async fn decode_resized(bytes: Vec<u8>, width: u32, height: u32) -> DecodeResult<PixelBuffer> {
    tokio::task::spawn_blocking(move || {
        let image = image::load_from_memory(&bytes)?;
        debug!(
            source_width = image.width(),
            source_height = image.height(),
            width = width,
            height = height,
            "Decoded image"
        );
        Ok::<_, DecodeError>(PixelBuffer::from_image(&image, width, height)?)
    })
    .await
    .map_err(|e| DecodeError::Join(e.to_string()))?
}

#[async_trait]
impl AssetLoader for ReferenceLoader {
    fn name(&self) -> &'static str {
        "reference"
    }

    #[instrument(skip(self, reference), fields(reference_len = reference.len()))]
    async fn load(&self, reference: &str, width: u32, height: u32) -> DecodeResult<PixelBuffer> {
        let bytes = match Location::parse(reference)? {
            Location::Data(data_url) => decode_data_url(&data_url)?,
            Location::Remote(url) => self.fetch(&url).await?.to_vec(),
            Location::File(path) => Self::read_file(&path).await?,
        };

        decode_resized(bytes, width, height).await
    }
}
