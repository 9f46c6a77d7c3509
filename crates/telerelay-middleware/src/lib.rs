//! `telerelay-middleware` – Frame Transport
//!
//! Moves topic-prefixed JSON frames between the leader, master, and follower
//! processes without caring about the frames' meaning.
//!
//! # Modules
//!
//! - [`frame`] – [`Frame`]: the `"<topic> <payload>"` wire unit and the two
//!   well-known topics.
//! - [`transport`] – [`FramePublisher`] / [`FrameSubscriber`]: the seam every
//!   component talks through.
//! - [`bus`] – [`FrameBus`]: in-process topic bus built on Tokio broadcast
//!   channels.
//! - [`ws`] – [`WsFramePublisher`] / [`WsFrameSubscriber`]: WebSocket
//!   transport between processes, with automatic reconnect.

pub mod bus;
pub mod frame;
pub mod transport;
pub mod ws;

pub use bus::{BusSubscriber, FrameBus};
pub use frame::{FOLLOWER_COMMANDS_TOPIC, Frame, LEADER_JOINTS_TOPIC, MAX_FRAME_BYTES};
pub use transport::{FramePublisher, FrameSubscriber};
pub use ws::{DEFAULT_RECONNECT_BACKOFF, WsFramePublisher, WsFrameSubscriber};
