//! `telerelay-kernel` – Transform & Safety Core
//!
//! The part of the relay with real invariants.  It does no I/O; it turns a
//! leader joint vector into a follower command or a blocked verdict.
//!
//! # Modules
//!
//! - [`config`] – [`RelayConfig`]: the pre-parsed configuration the gate is
//!   built from.
//! - [`limits`] – [`LimitTable`]: immutable per-joint `[min, max]` bounds.
//! - [`mapper`] – [`JointMapper`]: source-slot to destination-slot remapping.
//! - [`transform`] – [`LinearTransform`]: `matrix · mapped + offsets`, plus
//!   the gripper scale/offset/clamp.
//! - [`validator`] – [`SafetyValidator`]: fail-closed limit check reporting
//!   every violating joint.
//! - [`staleness`] – [`StalenessGuard`]: rejects messages older than the
//!   configured threshold.
//! - [`statistics`] – [`RelayStatistics`]: internally synchronised counters
//!   with consistent snapshots.
//! - [`relay_gate`] – [`RelayGate`]: mapper → transform → validator, resolved
//!   once from a [`RelayConfig`].

pub mod config;
pub mod limits;
pub mod mapper;
pub mod relay_gate;
pub mod staleness;
pub mod statistics;
pub mod transform;
pub mod validator;

pub use config::{GripperConfig, MappingPair, RelayConfig, UnmappedPolicy};
pub use limits::LimitTable;
pub use mapper::JointMapper;
pub use relay_gate::{GateOutcome, RelayGate};
pub use staleness::StalenessGuard;
pub use statistics::{RelayStatistics, StatisticsSnapshot, ViolationRecord};
pub use transform::{GripperTransform, LinearTransform};
pub use validator::{LimitMode, SafetyValidator, ValidationVerdict};
