//! Displacement engine
//!
//! Owns the current base image, displacement map and strength, renders the
//! warped frame into a bound [`FrameSink`] and notifies a single listener
//! after every render that produced output.
//!
//! Set-operations given a [`ImageSource::Reference`] decode in the background
//! through the [`AssetLoader`]. Each call issues a per-slot request token and
//! a completion is only adopted while its token is still the latest one, so
//! the buffer in effect is always the one from the most recently issued call.

use std::sync::Arc;
use image::DynamicImage;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{EngineSettings, RenderSettings};
use crate::domain::{DisplacementStrength, PixelBuffer, PixelError};
use crate::loader::{AssetLoader, DecodeError, DecodeResult};
use super::displacement::{displace, displace_parallel};
use super::notify::{ChannelListener, ErrorReporter, RenderNotice, UpdateListener};
use super::state::{EngineState, RequestTokens, Slot};
use super::surface::{FrameSink, PreviewSink};

/// Engine errors returned synchronously to the caller
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Output surface unavailable ({width}x{height})")]
    SurfaceUnavailable { width: u32, height: u32 },
    #[error("Buffer is {actual:?}, engine expects {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Engine has been closed")]
    Closed,
    #[error("Asynchronous decode requested outside a tokio runtime")]
    NoRuntime,
    #[error("Invalid pixel buffer: {0}")]
    Pixels(#[from] PixelError),
}

/// Image handed to a set-operation
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Already decoded at the engine size; adopted as-is
    Buffer(PixelBuffer),
    /// Decoded image of any size; resampled to the engine size
    Image(DynamicImage),
    /// URL, data URL or path; decoded in the background
    Reference(String),
}

impl From<PixelBuffer> for ImageSource {
    fn from(buffer: PixelBuffer) -> Self {
        ImageSource::Buffer(buffer)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        ImageSource::Image(image)
    }
}

impl From<&str> for ImageSource {
    fn from(reference: &str) -> Self {
        ImageSource::Reference(reference.to_string())
    }
}

impl From<String> for ImageSource {
    fn from(reference: String) -> Self {
        ImageSource::Reference(reference)
    }
}

/// Which branch a render took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// No base image, nothing presented
    Skipped,
    /// Base image copied through unchanged
    PassThrough,
    /// Full displacement sampling
    Displaced,
}

impl RenderOutcome {
    pub fn produced_frame(self) -> bool {
        !matches!(self, RenderOutcome::Skipped)
    }
}

/// Result of a set-operation
#[derive(Debug)]
pub enum SetOutcome {
    /// Buffer adopted before the call returned
    Adopted,
    /// Decode running in the background
    Pending(PendingDecode),
}

/// How a background decode settled
#[derive(Debug)]
pub enum DecodeOutcome {
    /// Buffer adopted and rendered
    Applied,
    /// A later set-call (or close) won; the result was discarded
    Superseded,
    /// Decode failed; previous buffer left untouched
    Failed(DecodeError),
}

/// Handle to an in-flight decode
///
/// Dropping the handle does not cancel the decode.
#[derive(Debug)]
pub struct PendingDecode {
    handle: JoinHandle<DecodeOutcome>,
}

impl PendingDecode {
    /// Wait for the decode to settle
    pub async fn wait(self) -> DecodeOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => DecodeOutcome::Failed(DecodeError::Join(e.to_string())),
        }
    }
}

/// Construction options supplied by the host
#[derive(Clone)]
pub struct EngineOptions {
    /// Initial strength; `None` means the default of 50
    pub strength: Option<f64>,
    pub preview: Option<Arc<dyn PreviewSink>>,
    pub listener: Option<Arc<dyn UpdateListener>>,
    pub error_reporter: Option<ErrorReporter>,
    /// Split rendering across the rayon pool
    pub parallel: bool,
}

impl EngineOptions {
    pub fn from_settings(engine: &EngineSettings, render: &RenderSettings) -> Self {
        EngineOptions {
            strength: Some(engine.strength),
            parallel: render.parallel,
            ..Default::default()
        }
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn with_preview(mut self, preview: Arc<dyn PreviewSink>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn UpdateListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_error_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.error_reporter = Some(reporter);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            strength: None,
            preview: None,
            listener: None,
            error_reporter: None,
            parallel: true,
        }
    }
}

/// Mutable engine state, guarded by the engine mutex
struct Inner {
    closed: bool,
    strength: DisplacementStrength,
    parallel: bool,
    base_image: Option<Arc<PixelBuffer>>,
    displacement_map: Option<Arc<PixelBuffer>>,
    tokens: RequestTokens,
    surface: Option<Arc<dyn FrameSink>>,
    preview: Option<Arc<dyn PreviewSink>>,
    listener: Option<Arc<dyn UpdateListener>>,
    error_reporter: Option<ErrorReporter>,
}

impl Inner {
    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<Arc<PixelBuffer>> {
        match slot {
            Slot::BaseImage => &mut self.base_image,
            Slot::DisplacementMap => &mut self.displacement_map,
        }
    }

    fn state(&self) -> EngineState {
        EngineState::derive(self.base_image.is_some(), self.displacement_map.is_some())
    }
}

/// Per-pixel displacement renderer bound to a fixed-size output surface
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct DisplacementEngine {
    inner: Arc<Mutex<Inner>>,
    loader: Arc<dyn AssetLoader>,
    width: u32,
    height: u32,
}

impl DisplacementEngine {
    /// Bind a new engine to `surface`
    ///
    /// Fails with [`EngineError::SurfaceUnavailable`] when the surface reports
    /// a zero dimension.
    pub fn new(
        surface: Arc<dyn FrameSink>,
        options: EngineOptions,
        loader: Arc<dyn AssetLoader>,
    ) -> Result<Self, EngineError> {
        let (width, height) = surface.size();
        if width == 0 || height == 0 {
            return Err(EngineError::SurfaceUnavailable { width, height });
        }

        let strength = options
            .strength
            .map(DisplacementStrength::new)
            .unwrap_or_default();

        info!(
            width = width,
            height = height,
            strength = strength.value(),
            loader = loader.name(),
            "Displacement engine created"
        );

        Ok(DisplacementEngine {
            inner: Arc::new(Mutex::new(Inner {
                closed: false,
                strength,
                parallel: options.parallel,
                base_image: None,
                displacement_map: None,
                tokens: RequestTokens::default(),
                surface: Some(surface),
                preview: options.preview,
                listener: options.listener,
                error_reporter: options.error_reporter,
            })),
            loader,
            width,
            height,
        })
    }

    /// Fixed output size
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn state(&self) -> Result<EngineState, EngineError> {
        let inner = self.inner.lock();
        inner.ensure_open()?;
        Ok(inner.state())
    }

    /// Current clamped strength
    pub fn strength(&self) -> Result<f64, EngineError> {
        let inner = self.inner.lock();
        inner.ensure_open()?;
        Ok(inner.strength.value())
    }

    /// Clamp and store strength; does not render
    pub fn set_strength(&self, amount: f64) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.strength = DisplacementStrength::new(amount);
        Ok(())
    }

    /// Replace the update listener
    pub fn set_listener(&self, listener: Option<Arc<dyn UpdateListener>>) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.listener = listener;
        Ok(())
    }

    /// Install a channel listener and return its receiver
    ///
    /// Replaces any previously registered listener.
    pub fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<RenderNotice>, EngineError> {
        let (listener, rx) = ChannelListener::channel();
        self.set_listener(Some(Arc::new(listener)))?;
        Ok(rx)
    }

    pub fn set_error_reporter(&self, reporter: Option<ErrorReporter>) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.error_reporter = reporter;
        Ok(())
    }

    pub fn set_preview(&self, preview: Option<Arc<dyn PreviewSink>>) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.preview = preview;
        Ok(())
    }

    /// Replace the base image
    ///
    /// Decoded sources are adopted immediately without rendering. References
    /// decode in the background and render once adopted.
    pub fn set_base_image(&self, source: impl Into<ImageSource>) -> Result<SetOutcome, EngineError> {
        self.set_slot(Slot::BaseImage, source.into())
    }

    /// Replace the displacement map
    ///
    /// The adopted map is pushed to the preview sink and a render follows,
    /// whether the map arrived synchronously or from a background decode.
    pub fn set_displacement_map(
        &self,
        source: impl Into<ImageSource>,
    ) -> Result<SetOutcome, EngineError> {
        self.set_slot(Slot::DisplacementMap, source.into())
    }

    fn set_slot(&self, slot: Slot, source: ImageSource) -> Result<SetOutcome, EngineError> {
        self.inner.lock().ensure_open()?;

        let buffer = match source {
            ImageSource::Buffer(buffer) => {
                if buffer.dimensions() != self.size() {
                    return Err(EngineError::DimensionMismatch {
                        expected: self.size(),
                        actual: buffer.dimensions(),
                    });
                }
                buffer
            }
            ImageSource::Image(image) => PixelBuffer::from_image(&image, self.width, self.height)?,
            ImageSource::Reference(reference) => {
                return self.spawn_decode(slot, reference).map(SetOutcome::Pending);
            }
        };

        {
            let mut inner = self.inner.lock();
            inner.ensure_open()?;
            inner.tokens.issue(slot);
            *inner.slot_mut(slot) = Some(Arc::new(buffer));
        }
        debug!(slot = %slot, "Adopted decoded buffer");

        if slot == Slot::DisplacementMap {
            self.show_preview();
            self.render()?;
        }

        Ok(SetOutcome::Adopted)
    }

    fn spawn_decode(&self, slot: Slot, reference: String) -> Result<PendingDecode, EngineError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let token = {
            let mut inner = self.inner.lock();
            inner.ensure_open()?;
            inner.tokens.issue(slot)
        };

        let engine = self.clone();
        let handle = runtime.spawn(async move {
            // Load in its own task so a panicking loader still settles through complete_decode
            let loader = engine.loader.clone();
            let (width, height) = engine.size();
            let result = tokio::spawn(async move { loader.load(&reference, width, height).await })
                .await
                .unwrap_or_else(|e| Err(DecodeError::Join(e.to_string())));
            engine.complete_decode(slot, token, result)
        });

        Ok(PendingDecode { handle })
    }

    #[instrument(skip_all, fields(slot = %slot, token = token))]
    fn complete_decode(&self, slot: Slot, token: u64, result: DecodeResult<PixelBuffer>) -> DecodeOutcome {
        let buffer = match result {
            Ok(buffer) => buffer,
            Err(e) => {
                let reporter = {
                    let inner = self.inner.lock();
                    if inner.closed || !inner.tokens.is_current(slot, token) {
                        debug!(error = %e, "Ignoring failure of superseded decode");
                        return DecodeOutcome::Superseded;
                    }
                    inner.error_reporter.clone()
                };
                error!(error = %e, "Decode failed, keeping previous buffer");
                if let Some(reporter) = reporter {
                    reporter(&e);
                }
                return DecodeOutcome::Failed(e);
            }
        };

        if buffer.dimensions() != self.size() {
            let e = DecodeError::Unsupported(format!(
                "loader returned {:?}, engine expects {:?}",
                buffer.dimensions(),
                self.size()
            ));
            return self.complete_decode(slot, token, Err(e));
        }

        {
            let mut inner = self.inner.lock();
            if inner.closed || !inner.tokens.is_current(slot, token) {
                warn!("Discarding stale decode result");
                return DecodeOutcome::Superseded;
            }
            *inner.slot_mut(slot) = Some(Arc::new(buffer));
        }
        info!("Adopted decoded buffer");

        if slot == Slot::DisplacementMap {
            self.show_preview();
        }
        if let Err(e) = self.render() {
            debug!(error = %e, "Render after decode skipped");
        }

        DecodeOutcome::Applied
    }

    /// Push the current map to the preview sink, if both exist
    fn show_preview(&self) {
        let (preview, map) = {
            let inner = self.inner.lock();
            (inner.preview.clone(), inner.displacement_map.clone())
        };
        if let (Some(preview), Some(map)) = (preview, map) {
            preview.show(&map);
        }
    }

    /// Render the current state into the bound surface
    ///
    /// Produces nothing and notifies nobody when no base image is set.
    pub fn render(&self) -> Result<RenderOutcome, EngineError> {
        let (base, map, strength, parallel, surface, listener) = {
            let inner = self.inner.lock();
            inner.ensure_open()?;
            (
                inner.base_image.clone(),
                inner.displacement_map.clone(),
                inner.strength,
                inner.parallel,
                inner.surface.clone(),
                inner.listener.clone(),
            )
        };

        let (outcome, frame) = match (base, map) {
            (None, _) => {
                debug!(state = %EngineState::Empty, "Nothing to render");
                return Ok(RenderOutcome::Skipped);
            }
            (Some(base), None) => (RenderOutcome::PassThrough, PixelBuffer::clone(&base)),
            (Some(base), Some(map)) => {
                let frame = if parallel {
                    displace_parallel(&base, &map, strength)
                } else {
                    displace(&base, &map, strength)
                };
                (RenderOutcome::Displaced, frame)
            }
        };

        debug!(
            outcome = ?outcome,
            width = self.width,
            height = self.height,
            strength = strength.value(),
            "Rendered frame"
        );

        if let Some(surface) = surface {
            surface.present(frame);
        }
        if let Some(listener) = listener {
            listener.on_update();
        }

        Ok(outcome)
    }

    /// Release all buffers and callbacks
    ///
    /// Idempotent. Every later operation returns [`EngineError::Closed`] and
    /// in-flight decodes settle as superseded.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.base_image = None;
        inner.displacement_map = None;
        inner.surface = None;
        inner.preview = None;
        inner.listener = None;
        inner.error_reporter = None;
        info!("Displacement engine closed");
    }
}
