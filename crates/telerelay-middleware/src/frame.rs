//! Topic-prefixed text frames.
//!
//! Every message on the wire is a single text line `"<topic> <payload>"`,
//! where the payload is JSON.  Subscribers filter on the exact topic before
//! the space, the way PUB/SUB topic filtering works.

use serde::Serialize;
use serde::de::DeserializeOwned;
use telerelay_types::{DropReason, RelayError};

/// Topic carrying [`LeaderMessage`][telerelay_types::LeaderMessage]s.
pub const LEADER_JOINTS_TOPIC: &str = "leader_joints";

/// Topic carrying [`FollowerCommand`][telerelay_types::FollowerCommand]s.
pub const FOLLOWER_COMMANDS_TOPIC: &str = "follower_commands";

/// Maximum byte length of an encoded frame.
///
/// Longer frames are dropped before any JSON parsing takes place.
pub const MAX_FRAME_BYTES: usize = 64 * 1024; // 64 KiB

/// One message on one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub topic: String,
    pub payload: String,
}

impl Frame {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Serialise `value` as the JSON payload of a frame on `topic`.
    pub fn json<T: Serialize>(topic: impl Into<String>, value: &T) -> Result<Self, RelayError> {
        let payload =
            serde_json::to_string(value).map_err(|e| RelayError::Serialization(e.to_string()))?;
        Ok(Self::new(topic, payload))
    }

    /// Parse the payload as JSON.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, DropReason> {
        if self.payload.len() > MAX_FRAME_BYTES {
            return Err(DropReason::Malformed(format!(
                "payload of {} bytes exceeds {MAX_FRAME_BYTES}",
                self.payload.len()
            )));
        }
        serde_json::from_str(&self.payload).map_err(|e| DropReason::Malformed(e.to_string()))
    }

    /// Wire encoding: `"<topic> <payload>"`.
    pub fn encode(&self) -> String {
        format!("{} {}", self.topic, self.payload)
    }

    /// Decode `text` if it belongs to `topic`.
    ///
    /// Returns `None` for frames on other topics, including topics that
    /// merely share a prefix with `topic`.
    pub fn decode_for(topic: &str, text: &str) -> Option<Self> {
        let rest = text.strip_prefix(topic)?;
        let payload = match rest.chars().next() {
            None => "",
            Some(c) if c.is_whitespace() => rest.trim_start(),
            Some(_) => return None,
        };
        Some(Self::new(topic, payload))
    }
}
