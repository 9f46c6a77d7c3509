//! The transport seam.
//!
//! Leader, master, and follower never call each other.  They publish and
//! receive [`Frame`]s through these two traits, so the in-process
//! [`FrameBus`][crate::bus::FrameBus] and the WebSocket transport in
//! [`ws`][crate::ws] are interchangeable.
//!
//! # Contract
//!
//! * Delivery is at most once.  A frame may be dropped (slow subscriber,
//!   nobody connected, reconnect in progress) and is never redelivered.
//! * No ordering guarantee holds across reconnects.

use async_trait::async_trait;
use telerelay_types::RelayError;

use crate::frame::Frame;

/// Sending half of a transport.
#[async_trait]
pub trait FramePublisher: Send + Sync {
    /// Publish `frame` to its topic.
    ///
    /// Returns the number of receivers the frame was handed to.  `Ok(0)`
    /// means nobody is listening, which is a normal condition.
    async fn publish(&self, frame: Frame) -> Result<usize, RelayError>;
}

/// Receiving half of a transport, bound to one topic.
#[async_trait]
pub trait FrameSubscriber: Send {
    /// The topic this subscriber yields.
    fn topic(&self) -> &str;

    /// Wait for the next frame.  Returns `None` once the transport is closed
    /// for good.
    async fn recv(&mut self) -> Option<Frame>;
}
