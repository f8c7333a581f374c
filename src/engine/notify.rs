//! Update notification and error reporting side channels

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::loader::DecodeError;

/// Marker delivered to channel subscribers after each successful render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderNotice;

/// Single subscriber notified after every render that produced output
///
/// The notice carries no payload; listeners re-read whatever state they need.
pub trait UpdateListener: Send + Sync {
    fn on_update(&self);
}

impl<F> UpdateListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_update(&self) {
        self()
    }
}

/// Listener that forwards notices into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<RenderNotice>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RenderNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelListener { tx }, rx)
    }
}

impl UpdateListener for ChannelListener {
    fn on_update(&self) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.tx.send(RenderNotice);
    }
}

/// Receives decode failures from background set-operations
pub type ErrorReporter = Arc<dyn Fn(&DecodeError) + Send + Sync>;
