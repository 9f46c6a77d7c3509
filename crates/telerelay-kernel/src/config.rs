//! Pre-parsed relay configuration.
//!
//! [`RelayConfig`] is the value handed to
//! [`RelayGate::from_config`][crate::relay_gate::RelayGate::from_config] at
//! startup.  It derives
//! `Deserialize` so any front end (the CLI reads TOML) can produce it, but
//! none of the checks live here: resolution into concrete mapper, transform,
//! and validator instances happens exactly once in the gate.

use serde::{Deserialize, Serialize};
use telerelay_types::JointLimit;

/// One `source → destination` entry of the joint mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingPair {
    pub source: usize,
    pub destination: usize,
}

impl MappingPair {
    pub fn new(source: usize, destination: usize) -> Self {
        Self {
            source,
            destination,
        }
    }
}

/// Value given to destination joints that no mapping entry writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedPolicy {
    /// Always write [`RelayConfig::unmapped_value`].
    #[default]
    Constant,
    /// Copy the source joint with the same index when it exists, otherwise
    /// write [`RelayConfig::unmapped_value`].
    PassThrough,
}

/// Scale-then-offset transform for the gripper channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GripperConfig {
    #[serde(default = "default_gripper_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
}

impl Default for GripperConfig {
    fn default() -> Self {
        Self {
            scale: default_gripper_scale(),
            offset: 0.0,
        }
    }
}

/// Everything the master needs to build its pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Number of joints in every leader message.
    pub source_joints: usize,

    /// Explicit `source → destination` pairs.  `None` means identity over
    /// the source joints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<Vec<MappingPair>>,

    /// Row-major `M×N` matrix.  `None` means identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Vec<Vec<f64>>>,

    /// Additive per-destination offsets applied after the matrix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<Vec<f64>>,

    /// One entry per destination joint, indices contiguous from 0.
    pub limits: Vec<JointLimit>,

    /// Maximum accepted message age in milliseconds.
    #[serde(default = "default_staleness_ms")]
    pub staleness_ms: u64,

    /// Safety blocking.  Setting this to `false` is the operator override.
    #[serde(default = "default_limits_enabled")]
    pub limits_enabled: bool,

    #[serde(default)]
    pub unmapped_policy: UnmappedPolicy,

    #[serde(default)]
    pub unmapped_value: f64,

    #[serde(default)]
    pub gripper: GripperConfig,
}

impl RelayConfig {
    /// Identity mapping, identity matrix, the given limits, and defaults for
    /// everything else.  `source_joints` equals the number of limits.
    pub fn with_limits(limits: Vec<JointLimit>) -> Self {
        Self {
            source_joints: limits.len(),
            mapping: None,
            matrix: None,
            offsets: None,
            limits,
            staleness_ms: default_staleness_ms(),
            limits_enabled: default_limits_enabled(),
            unmapped_policy: UnmappedPolicy::default(),
            unmapped_value: 0.0,
            gripper: GripperConfig::default(),
        }
    }
}

fn default_staleness_ms() -> u64 {
    500
}
fn default_limits_enabled() -> bool {
    true
}
fn default_gripper_scale() -> f64 {
    1.0
}
