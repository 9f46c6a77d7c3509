//! [`SafetyValidator`] – fail-closed per-joint limit check.
//!
//! Every destination joint is compared against its [`LimitTable`] entry with
//! inclusive bounds.  A single out-of-range joint blocks the whole message;
//! the returned [`ValidationVerdict`] lists every violating joint, in joint
//! order, so all simultaneous violations can be reported.
//!
//! [`LimitMode::Disabled`] is the operator override: the verdict is always
//! `allowed`, but `violations` still carries the would-be violations.
//!
//! # Example
//!
//! ```
//! use telerelay_kernel::limits::LimitTable;
//! use telerelay_kernel::validator::{LimitMode, SafetyValidator};
//! use telerelay_types::JointLimit;
//!
//! let table = LimitTable::new(&[JointLimit::new(0, "joint0", -3.14, 3.14)], 1).unwrap();
//! let validator = SafetyValidator::new(table, LimitMode::Enforced);
//!
//! assert!(validator.validate(&[1.0]).allowed);
//!
//! let verdict = validator.validate(&[4.0]);
//! assert!(!verdict.allowed);
//! assert_eq!(verdict.violations[0].bound, 3.14);
//! ```

use telerelay_types::{JointLimit, JointViolation, ViolationKind};

use crate::limits::LimitTable;

/// Whether violations block the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitMode {
    /// Violations block the message.  The only safe default.
    Enforced,
    /// Operator override: violations are recorded but never block.
    Disabled,
}

impl LimitMode {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            LimitMode::Enforced
        } else {
            LimitMode::Disabled
        }
    }
}

/// Outcome of validating one transformed vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationVerdict {
    /// `true` when the message may be forwarded.
    pub allowed: bool,
    /// `false` when produced under [`LimitMode::Disabled`].
    pub enforced: bool,
    /// Every out-of-range joint, ordered by joint index.
    pub violations: Vec<JointViolation>,
}

impl ValidationVerdict {
    /// `true` when the message was forwarded only because limits are
    /// disabled.
    pub fn is_overridden(&self) -> bool {
        !self.enforced && !self.violations.is_empty()
    }
}

/// Evaluates transformed vectors against a [`LimitTable`].
#[derive(Debug, Clone)]
pub struct SafetyValidator {
    table: LimitTable,
    mode: LimitMode,
}

impl SafetyValidator {
    pub fn new(table: LimitTable, mode: LimitMode) -> Self {
        Self { table, mode }
    }

    pub fn mode(&self) -> LimitMode {
        self.mode
    }

    pub fn table(&self) -> &LimitTable {
        &self.table
    }

    /// Check every joint of `values` against its limit.
    ///
    /// A joint the table covers but `values` lacks is reported as
    /// [`ViolationKind::NotANumber`].
    pub fn validate(&self, values: &[f64]) -> ValidationVerdict {
        let violations: Vec<JointViolation> = self
            .table
            .iter()
            .enumerate()
            .filter_map(|(j, limit)| {
                check_joint(j, limit, values.get(j).copied().unwrap_or(f64::NAN))
            })
            .collect();

        let enforced = self.mode == LimitMode::Enforced;
        ValidationVerdict {
            allowed: !enforced || violations.is_empty(),
            enforced,
            violations,
        }
    }
}

fn check_joint(joint: usize, limit: &JointLimit, value: f64) -> Option<JointViolation> {
    let (kind, bound) = if value.is_nan() {
        (ViolationKind::NotANumber, limit.max)
    } else if value < limit.min {
        (ViolationKind::BelowMin, limit.min)
    } else if value > limit.max {
        (ViolationKind::AboveMax, limit.max)
    } else {
        return None;
    };
    Some(JointViolation {
        joint,
        name: limit.name.clone(),
        value,
        bound,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn six_joint_table() -> LimitTable {
        let limits: Vec<JointLimit> = (0..6)
            .map(|i| JointLimit::new(i, format!("joint_{i}"), -1.0, 1.0))
            .collect();
        LimitTable::new(&limits, 6).unwrap()
    }

    fn enforced() -> SafetyValidator {
        SafetyValidator::new(six_joint_table(), LimitMode::Enforced)
    }

    #[test]
    fn within_limits_is_allowed() {
        let verdict = enforced().validate(&[0.0, 0.5, -0.5, 0.9, -0.9, 0.1]);
        assert!(verdict.allowed);
        assert!(verdict.violations.is_empty());
    }

    #[test]
    fn boundaries_are_inclusive() {
        let verdict = enforced().validate(&[1.0, -1.0, 1.0, -1.0, 1.0, -1.0]);
        assert!(verdict.allowed);
    }

    #[test]
    fn single_violation_blocks_entire_message() {
        let verdict = enforced().validate(&[0.0, 0.0, 0.0, 1.5, 0.0, 0.0]);
        assert!(!verdict.allowed);
        assert_eq!(verdict.violations.len(), 1);
        assert_eq!(verdict.violations[0].joint, 3);
        assert_eq!(verdict.violations[0].kind, ViolationKind::AboveMax);
    }

    #[test]
    fn every_violation_is_reported_in_joint_order() {
        let verdict = enforced().validate(&[2.0, 0.0, -3.0, 0.0, 0.0, 5.0]);
        assert!(!verdict.allowed);
        let joints: Vec<usize> = verdict.violations.iter().map(|v| v.joint).collect();
        assert_eq!(joints, vec![0, 2, 5]);
        assert_eq!(verdict.violations[1].kind, ViolationKind::BelowMin);
        assert_eq!(verdict.violations[1].bound, -1.0);
    }

    #[test]
    fn nan_is_a_violation() {
        let verdict = enforced().validate(&[f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(!verdict.allowed);
        assert_eq!(verdict.violations[0].kind, ViolationKind::NotANumber);
    }

    #[test]
    fn short_vector_is_blocked() {
        let verdict = enforced().validate(&[0.0, 0.0]);
        assert!(!verdict.allowed);
        assert_eq!(verdict.violations.len(), 4);
    }

    #[test]
    fn disabled_limits_allow_but_record() {
        let validator = SafetyValidator::new(six_joint_table(), LimitMode::Disabled);
        let verdict = validator.validate(&[2.0, 0.0, 0.0, 0.0, 0.0, -2.0]);
        assert!(verdict.allowed);
        assert!(!verdict.enforced);
        assert_eq!(verdict.violations.len(), 2);
        assert!(verdict.is_overridden());
    }

    #[test]
    fn disabled_limits_clean_vector_is_not_overridden() {
        let validator = SafetyValidator::new(six_joint_table(), LimitMode::Disabled);
        let verdict = validator.validate(&[0.0; 6]);
        assert!(verdict.allowed);
        assert!(!verdict.is_overridden());
    }

    #[test]
    fn pinned_joint_allows_only_exact_value() {
        let table = LimitTable::new(&[JointLimit::new(0, "locked", 0.25, 0.25)], 1).unwrap();
        let v = SafetyValidator::new(table, LimitMode::Enforced);
        assert!(v.validate(&[0.25]).allowed);
        assert!(!v.validate(&[0.2500001]).allowed);
    }

    #[test]
    fn mode_from_enabled_flag() {
        assert_eq!(LimitMode::from_enabled(true), LimitMode::Enforced);
        assert_eq!(LimitMode::from_enabled(false), LimitMode::Disabled);
    }
}
