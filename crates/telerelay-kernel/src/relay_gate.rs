//! [`RelayGate`] – the single evaluation point between leader and follower.
//!
//! Every leader [`JointVector`] passes through [`RelayGate::check_freshness`]
//! and then [`RelayGate::evaluate`], which runs three stages in a fixed
//! order:
//!
//! 1. **Map** ([`JointMapper`]) – reorder source joints into destination
//!    slots.
//! 2. **Transform** ([`LinearTransform`]) – `matrix · mapped + offsets`.
//!    Coefficients are defined in destination-joint space, which is why the
//!    mapping always runs first.
//! 3. **Validate** ([`SafetyValidator`]) – fail-closed per-joint limit check.
//!
//! The gate is built once from a [`RelayConfig`]; [`RelayGate::from_config`]
//! performs every startup check, so evaluation itself never fails.
//!
//! # Example
//!
//! ```
//! use telerelay_kernel::{RelayConfig, RelayGate};
//! use telerelay_types::{JointLimit, JointVector};
//!
//! let config = RelayConfig::with_limits(vec![JointLimit::new(0, "joint0", -3.14, 3.14)]);
//! let gate = RelayGate::from_config(&config).unwrap();
//!
//! let ok = gate.evaluate(&JointVector::new(vec![1.0], 0.0));
//! assert!(ok.verdict.allowed);
//! assert_eq!(ok.joints, vec![1.0]);
//!
//! let unsafe_cmd = gate.evaluate(&JointVector::new(vec![4.0], 0.0));
//! assert!(!unsafe_cmd.verdict.allowed);
//! ```

use std::time::Duration;

use telerelay_types::{ConfigError, DropReason, JointVector};
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::limits::LimitTable;
use crate::mapper::JointMapper;
use crate::staleness::StalenessGuard;
use crate::transform::{GripperTransform, LinearTransform};
use crate::validator::{LimitMode, SafetyValidator, ValidationVerdict};

/// Result of running one vector through the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    /// Transformed joints in destination order.
    pub joints: Vec<f64>,
    /// Transformed gripper value, when the message carried one.
    pub gripper: Option<f64>,
    pub verdict: ValidationVerdict,
}

/// Resolved mapper → transform → validator pipeline.
#[derive(Debug, Clone)]
pub struct RelayGate {
    mapper: JointMapper,
    transform: LinearTransform,
    gripper: GripperTransform,
    validator: SafetyValidator,
    staleness: StalenessGuard,
}

impl RelayGate {
    /// Construct a gate from already-built stages.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MatrixShape`] when the stages do not chain: the
    /// transform must take `mapper.mapped_joints()` inputs and produce one
    /// output per limit-table entry.
    pub fn new(
        mapper: JointMapper,
        transform: LinearTransform,
        gripper: GripperTransform,
        validator: SafetyValidator,
        staleness: StalenessGuard,
    ) -> Result<Self, ConfigError> {
        if transform.cols() != mapper.mapped_joints() {
            return Err(ConfigError::MatrixShape(format!(
                "matrix takes {} inputs, mapper produces {}",
                transform.cols(),
                mapper.mapped_joints()
            )));
        }
        if transform.rows() != validator.table().len() {
            return Err(ConfigError::MatrixShape(format!(
                "matrix produces {} outputs, limit table has {} joints",
                transform.rows(),
                validator.table().len()
            )));
        }
        Ok(Self {
            mapper,
            transform,
            gripper,
            validator,
            staleness,
        })
    }

    /// Resolve `config` into concrete stages.
    ///
    /// Destination joint count `M` is the number of limit entries.  The
    /// mapped length `N` is the matrix column count, or `M` when no matrix is
    /// configured (identity transform).
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]: malformed mapping, dimension mismatch, bad or
    /// missing limits, zero staleness threshold.
    pub fn from_config(config: &RelayConfig) -> Result<Self, ConfigError> {
        if config.source_joints == 0 {
            return Err(ConfigError::EmptyRobot("source"));
        }
        let destination_joints = config.limits.len();
        if destination_joints == 0 {
            return Err(ConfigError::EmptyRobot("destination"));
        }

        let table = LimitTable::new(&config.limits, destination_joints)?;

        let transform = match &config.matrix {
            Some(rows) => {
                let cols = rows.first().map_or(0, Vec::len);
                if cols == 0 {
                    return Err(ConfigError::MatrixShape("matrix has no columns".to_string()));
                }
                LinearTransform::from_rows(rows, config.offsets.as_deref(), destination_joints, cols)?
            }
            None => {
                let identity = LinearTransform::identity(destination_joints);
                match &config.offsets {
                    Some(offsets) => identity.with_offsets(offsets)?,
                    None => identity,
                }
            }
        };

        let mapper = match &config.mapping {
            Some(pairs) => JointMapper::new(
                config.source_joints,
                transform.cols(),
                pairs,
                config.unmapped_policy,
                config.unmapped_value,
            )?,
            None => JointMapper::identity(
                config.source_joints,
                transform.cols(),
                config.unmapped_policy,
                config.unmapped_value,
            )?,
        };

        let gripper = GripperTransform::new(config.gripper.scale, config.gripper.offset)?;
        let staleness = StalenessGuard::new(Duration::from_millis(config.staleness_ms))?;

        let mode = LimitMode::from_enabled(config.limits_enabled);
        if mode == LimitMode::Disabled {
            error!(
                "SAFETY LIMITS DISABLED: out-of-range commands will be forwarded to the follower"
            );
        }

        let gate = Self::new(
            mapper,
            transform,
            gripper,
            SafetyValidator::new(table, mode),
            staleness,
        )?;

        info!(
            source_joints = gate.source_joints(),
            mapped_joints = gate.mapper.mapped_joints(),
            destination_joints = gate.destination_joints(),
            staleness_ms = config.staleness_ms,
            limits_enforced = gate.limits_enforced(),
            "relay gate configured"
        );
        Ok(gate)
    }

    /// Joint count every leader message must carry.
    pub fn source_joints(&self) -> usize {
        self.mapper.source_joints()
    }

    /// Joint count of every forwarded command.
    pub fn destination_joints(&self) -> usize {
        self.transform.rows()
    }

    pub fn limits_enforced(&self) -> bool {
        self.validator.mode() == LimitMode::Enforced
    }

    pub fn staleness_threshold(&self) -> Duration {
        self.staleness.threshold()
    }

    /// Reject `vector` when it is too old at `received_at`.
    pub fn check_freshness(&self, vector: &JointVector, received_at: f64) -> Result<(), DropReason> {
        self.staleness.check(vector.timestamp, received_at)
    }

    /// Map then transform, without validating.
    pub fn project(&self, values: &[f64]) -> Vec<f64> {
        let mapped = self.mapper.map(values);
        self.transform.apply(&mapped)
    }

    /// Run the full map → transform → validate pipeline.
    pub fn evaluate(&self, vector: &JointVector) -> GateOutcome {
        let joints = self.project(&vector.values);
        let verdict = self.validator.validate(&joints);
        GateOutcome {
            joints,
            gripper: vector.gripper.map(|g| self.gripper.apply(g)),
            verdict,
        }
    }
}
