//! `telerelay-runtime` – Relay Processes
//!
//! The async loops that run on each machine of a teleoperation setup.
//!
//! # Modules
//!
//! - [`relay_loop`] – [`MasterRelay`]: subscribes to leader joints, runs
//!   every message through the [`RelayGate`][telerelay_kernel::RelayGate],
//!   and publishes allowed commands for the follower.
//! - [`leader`] – [`LeaderSource`]: polls a
//!   [`JointReader`][telerelay_hal::JointReader] at a fixed rate and
//!   publishes stamped leader messages.
//! - [`follower`] – [`FollowerSink`]: keeps the newest follower command and
//!   optionally drives a [`JointWriter`][telerelay_hal::JointWriter].
//! - [`telemetry`] – [`init_tracing`]: `tracing` subscriber with optional
//!   OTLP span export.
//!
//! Every `run` loop takes a `tokio::sync::watch::Receiver<bool>` and exits
//! once it reads `true`.

pub mod follower;
pub mod leader;
pub mod relay_loop;
pub mod telemetry;

pub use follower::FollowerSink;
pub use leader::{DEFAULT_RATE_HZ, LeaderSource};
pub use relay_loop::{MasterRelay, RelayOutcome, STATS_LOG_INTERVAL};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
