//! In-process, topic-based frame bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood, one per topic, so
//! every subscriber receives every frame without any single subscriber
//! blocking the others.  A slow subscriber loses the oldest frames instead of
//! stalling the publisher, which is the delivery semantics the relay wants
//! for a control stream.
//!
//! Used by `telerelay demo` and the integration tests to wire leader, master,
//! and follower together inside one process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use telerelay_types::RelayError;
use tokio::sync::broadcast;
use tracing::warn;

use crate::frame::Frame;
use crate::transport::{FramePublisher, FrameSubscriber};

/// Default channel capacity (number of buffered frames before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared frame bus.  Clone it cheaply; all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct FrameBus {
    capacity: usize,
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Frame>>>>,
}

impl FrameBus {
    /// Create a new bus with the given per-topic channel capacity.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to `topic`.  Frames published before this call are not
    /// delivered.
    pub fn subscribe(&self, topic: impl Into<String>) -> BusSubscriber {
        let topic = topic.into();
        let receiver = self.sender(&topic).subscribe();
        BusSubscriber { topic, receiver }
    }

    /// Publish without going through the async trait.
    ///
    /// Returns the number of subscribers handed the frame; `0` when nobody
    /// listens on the topic.
    pub fn send(&self, frame: Frame) -> usize {
        let sender = self.sender(&frame.topic);
        sender.send(frame).unwrap_or(0)
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Frame> {
        let mut topics = self.lock();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<Frame>>> {
        self.topics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for FrameBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl FramePublisher for FrameBus {
    async fn publish(&self, frame: Frame) -> Result<usize, RelayError> {
        Ok(self.send(frame))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Subscriber
// ────────────────────────────────────────────────────────────────────────────

/// An async receiver bound to a single topic of a [`FrameBus`].
pub struct BusSubscriber {
    topic: String,
    receiver: broadcast::Receiver<Frame>,
}

#[async_trait]
impl FrameSubscriber for BusSubscriber {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn recv(&mut self) -> Option<Frame> {
        loop {
            match self.receiver.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Subscriber fell behind; log and continue.
                    warn!(topic = %self.topic, lagged_by = n, "bus subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
