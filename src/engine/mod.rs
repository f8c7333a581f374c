//! Displacement rendering engine
//!
//! This module contains the core rendering logic including:
//! - Engine state and the decode race guard
//! - Displacement sampling algorithm
//! - Output/preview surfaces and update notification

mod displacement;
mod effect;
mod notify;
mod state;
mod surface;

pub use displacement::{displace, displace_parallel};
pub use effect::{
    DecodeOutcome, DisplacementEngine, EngineError, EngineOptions, ImageSource, PendingDecode,
    RenderOutcome, SetOutcome,
};
pub use notify::{ChannelListener, ErrorReporter, RenderNotice, UpdateListener};
pub use state::{EngineState, Slot};
pub use surface::{Canvas, FrameSink, PreviewSink, PreviewSurface};
