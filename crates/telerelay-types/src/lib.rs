//! `telerelay-types` – shared data model for the teleoperation relay.
//!
//! Every crate in the workspace speaks in these types: the joint vectors that
//! flow from leader to follower, the limit entries that gate them, the wire
//! messages exchanged over the transport, and the error taxonomy.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Clock
// ────────────────────────────────────────────────────────────────────────────

/// Current wall-clock time as fractional seconds since the Unix epoch.
///
/// Leader, master, and follower all stamp messages with this clock, so the
/// staleness check compares values from the same clock domain.
pub fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

// ────────────────────────────────────────────────────────────────────────────
// Joint data
// ────────────────────────────────────────────────────────────────────────────

/// An ordered vector of joint positions as received from the leader.
#[derive(Debug, Clone, PartialEq)]
pub struct JointVector {
    /// Joint positions in source-robot order (radians).
    pub values: Vec<f64>,
    /// Optional gripper opening (0.0 = closed, 1.0 = open).
    pub gripper: Option<f64>,
    /// Source timestamp in seconds since the Unix epoch.
    pub timestamp: f64,
    /// Optional monotonically increasing sequence id assigned by the leader.
    pub seq: Option<u64>,
}

impl JointVector {
    pub fn new(values: Vec<f64>, timestamp: f64) -> Self {
        Self {
            values,
            gripper: None,
            timestamp,
            seq: None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Inclusive `[min, max]` bound for a single destination joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointLimit {
    /// Destination joint index this entry applies to.
    pub index: usize,
    /// Human-readable joint name used in violation reports.
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl JointLimit {
    pub fn new(index: usize, name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            index,
            name: name.into(),
            min,
            max,
        }
    }

    /// `true` when `value` lies inside the inclusive range. NaN is never
    /// contained.
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire messages
// ────────────────────────────────────────────────────────────────────────────

/// Message published by the leader on the `leader_joints` topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LeaderMessage {
    /// Joint positions in source order.
    pub joints: Vec<f64>,
    /// Capture time, seconds since the Unix epoch.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gripper: Option<f64>,
}

impl LeaderMessage {
    /// Convert into a [`JointVector`], checking the joint count and rejecting
    /// non-finite numbers.
    pub fn into_joint_vector(self, expected_joints: usize) -> Result<JointVector, DropReason> {
        if self.joints.len() != expected_joints {
            return Err(DropReason::WrongJointCount {
                expected: expected_joints,
                got: self.joints.len(),
            });
        }
        if !self.timestamp.is_finite() {
            return Err(DropReason::Malformed("non-finite timestamp".to_string()));
        }
        if let Some(i) = self.joints.iter().position(|v| !v.is_finite()) {
            return Err(DropReason::Malformed(format!("non-finite value at joint {i}")));
        }
        if let Some(g) = self.gripper
            && !g.is_finite()
        {
            return Err(DropReason::Malformed("non-finite gripper value".to_string()));
        }
        Ok(JointVector {
            values: self.joints,
            gripper: self.gripper,
            timestamp: self.timestamp,
            seq: self.seq,
        })
    }
}

/// Any encoding of a leader message the master accepts.
///
/// Besides the `{"joints": [...]}` form, leaders may publish one field per
/// joint (`joint_0`, `joint_1`, ...) next to `timestamp` and `gripper`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LeaderPayload {
    Vector(LeaderMessage),
    Named(NamedJointMessage),
}

impl LeaderPayload {
    /// Normalise to the vector form.
    pub fn into_message(self) -> Result<LeaderMessage, DropReason> {
        match self {
            Self::Vector(msg) => Ok(msg),
            Self::Named(named) => named.into_message(),
        }
    }
}

/// Leader message with one `joint_<n>` field per joint.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedJointMessage {
    pub timestamp: f64,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub gripper: Option<f64>,
    #[serde(flatten)]
    fields: BTreeMap<String, NamedField>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NamedField {
    Number(f64),
    Other(#[allow(dead_code)] serde::de::IgnoredAny),
}

impl NamedJointMessage {
    /// Joint fields must be numbered contiguously from `joint_0`.  Keys that
    /// are not `joint_<n>` are ignored.
    pub fn into_message(self) -> Result<LeaderMessage, DropReason> {
        let mut joints = BTreeMap::new();
        for (key, field) in self.fields {
            let Some(index) = key
                .strip_prefix("joint_")
                .and_then(|i| i.parse::<usize>().ok())
            else {
                continue;
            };
            let NamedField::Number(value) = field else {
                return Err(DropReason::Malformed(format!("{key} is not a number")));
            };
            joints.insert(index, value);
        }
        if joints.is_empty() {
            return Err(DropReason::Malformed("no joint_<n> fields".to_string()));
        }
        if joints.keys().copied().ne(0..joints.len()) {
            return Err(DropReason::Malformed(
                "joint fields are not numbered from joint_0 without gaps".to_string(),
            ));
        }
        Ok(LeaderMessage {
            joints: joints.into_values().collect(),
            timestamp: self.timestamp,
            seq: self.seq,
            gripper: self.gripper,
        })
    }
}

/// Validated command published by the master on the `follower_commands` topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FollowerCommand {
    /// Joint positions in destination order.
    pub joints: Vec<f64>,
    /// Time the master forwarded this command, seconds since the Unix epoch.
    pub timestamp: f64,
    /// Timestamp of the leader message this command was derived from.
    pub source_timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gripper: Option<f64>,
}

// ────────────────────────────────────────────────────────────────────────────
// Violations
// ────────────────────────────────────────────────────────────────────────────

/// Which side of a [`JointLimit`] a value fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    BelowMin,
    AboveMax,
    /// The transformed value is NaN; reported against `max`.
    NotANumber,
}

/// One out-of-range joint within a transformed vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointViolation {
    pub joint: usize,
    pub name: String,
    pub value: f64,
    /// The bound that was crossed.
    pub bound: f64,
    pub kind: ViolationKind,
}

impl std::fmt::Display for JointViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ViolationKind::BelowMin => write!(
                f,
                "{} (joint {}): value {:.3} below min {:.3}",
                self.name, self.joint, self.value, self.bound
            ),
            ViolationKind::AboveMax => write!(
                f,
                "{} (joint {}): value {:.3} above max {:.3}",
                self.name, self.joint, self.value, self.bound
            ),
            ViolationKind::NotANumber => {
                write!(f, "{} (joint {}): value is NaN", self.name, self.joint)
            }
        }
    }
}

/// Structured record emitted for every message whose transformed vector had
/// at least one violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub id: Uuid,
    /// Time the master evaluated the message.
    pub timestamp: DateTime<Utc>,
    pub source_timestamp: f64,
    pub seq: Option<u64>,
    /// `true` when limits were disabled and the message was forwarded anyway.
    pub overridden: bool,
    pub violations: Vec<JointViolation>,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Fatal startup-time configuration errors. The relay refuses to start when
/// any of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("robot must have at least one {0} joint")]
    EmptyRobot(&'static str),

    #[error("mapping source index {index} out of range (source has {len} joints)")]
    MappingSourceOutOfRange { index: usize, len: usize },

    #[error("mapping destination index {index} out of range (mapped vector has {len} joints)")]
    MappingDestinationOutOfRange { index: usize, len: usize },

    #[error("destination index {0} is mapped more than once")]
    DuplicateDestination(usize),

    #[error("source index {0} is mapped more than once")]
    DuplicateSource(usize),

    #[error("transform matrix shape mismatch: {0}")]
    MatrixShape(String),

    #[error("transform matrix contains a non-finite entry at row {row}, column {col}")]
    NonFiniteMatrix { row: usize, col: usize },

    #[error("invalid limit for joint {index} ({name}): {reason}")]
    InvalidLimit {
        index: usize,
        name: String,
        reason: String,
    },

    #[error("no limit entry for destination joint {0}")]
    MissingLimit(usize),

    #[error("limit index {index} is outside the destination range 0..{len}")]
    LimitIndexGap { index: usize, len: usize },

    #[error("duplicate limit entry for destination joint {0}")]
    DuplicateLimit(usize),

    #[error("offset vector has {got} entries, expected {expected}")]
    OffsetLength { expected: usize, got: usize },

    #[error("offset for destination joint {0} is not finite")]
    NonFiniteOffset(usize),

    #[error("invalid staleness threshold: {0}")]
    InvalidStaleness(String),

    #[error("invalid gripper transform: {0}")]
    InvalidGripper(String),

    #[error("publish rate must be a positive, finite number of Hz, got {0}")]
    InvalidRate(f64),
}

/// Why a single inbound message was dropped before validation. Never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DropReason {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("wrong joint count: expected {expected}, got {got}")]
    WrongJointCount { expected: usize, got: usize },

    #[error("stale message: age {age_secs:.3}s exceeds {threshold_secs:.3}s")]
    Stale { age_secs: f64, threshold_secs: f64 },

    #[error("frame for unexpected topic {0:?}")]
    UnknownTopic(String),
}

impl DropReason {
    /// `true` for the staleness category, `false` for transport-level
    /// deserialisation failures.
    pub fn is_stale(&self) -> bool {
        matches!(self, DropReason::Stale { .. })
    }
}

/// Umbrella error for the relay's I/O surfaces.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("hardware fault on {component}: {message}")]
    HardwareFault { component: String, message: String },
}
