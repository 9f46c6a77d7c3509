//! [`RelayStatistics`] – process-wide relay counters.
//!
//! One mutex guards every counter, so each `record*` call is a single atomic
//! update and [`RelayStatistics::snapshot`] always observes
//! `allowed + blocked == total`.  Share it between the relay loop and any
//! reporting task with an `Arc`.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use telerelay_types::{DropReason, JointViolation};

use crate::validator::ValidationVerdict;

/// The most recent message that had at least one violation.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationRecord {
    pub timestamp: DateTime<Utc>,
    /// `true` when the message was forwarded because limits are disabled.
    pub overridden: bool,
    pub violations: Vec<JointViolation>,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsSnapshot {
    /// Messages that reached the validator.
    pub total: u64,
    pub allowed: u64,
    pub blocked: u64,
    /// Allowed messages that only passed because limits are disabled.
    pub overridden: u64,
    /// Frames that failed to deserialise or had the wrong shape.
    pub decode_errors: u64,
    pub stale_drops: u64,
    /// Allowed messages the transport refused to publish.
    pub publish_failures: u64,
    pub last_violation: Option<ViolationRecord>,
    /// Forward timestamp of the most recently published command.
    pub last_forward_timestamp: Option<f64>,
}

impl StatisticsSnapshot {
    /// Share of validated messages that were blocked, in percent.
    pub fn block_percentage(&self) -> f64 {
        100.0 * self.blocked as f64 / self.total.max(1) as f64
    }
}

/// Internally synchronised counter object.
#[derive(Debug, Default)]
pub struct RelayStatistics {
    inner: Mutex<StatisticsSnapshot>,
}

impl RelayStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatisticsSnapshot> {
        // Counters stay meaningful even if a holder panicked mid-update.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the verdict for one validated message.  Returns the new total.
    pub fn record(&self, verdict: &ValidationVerdict) -> u64 {
        let mut s = self.lock();
        s.total += 1;
        if verdict.allowed {
            s.allowed += 1;
        } else {
            s.blocked += 1;
        }
        if verdict.is_overridden() {
            s.overridden += 1;
        }
        if !verdict.violations.is_empty() {
            s.last_violation = Some(ViolationRecord {
                timestamp: Utc::now(),
                overridden: !verdict.enforced,
                violations: verdict.violations.clone(),
            });
        }
        s.total
    }

    /// Record a message dropped before validation.
    pub fn record_drop(&self, reason: &DropReason) {
        let mut s = self.lock();
        if reason.is_stale() {
            s.stale_drops += 1;
        } else {
            s.decode_errors += 1;
        }
    }

    /// Record a successful publish to the follower.
    pub fn record_forward(&self, forward_timestamp: f64) {
        self.lock().last_forward_timestamp = Some(forward_timestamp);
    }

    pub fn record_publish_failure(&self) {
        self.lock().publish_failures += 1;
    }

    /// Consistent copy of all counters.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use telerelay_types::ViolationKind;

    fn verdict(allowed: bool, enforced: bool, violations: usize) -> ValidationVerdict {
        ValidationVerdict {
            allowed,
            enforced,
            violations: (0..violations)
                .map(|j| JointViolation {
                    joint: j,
                    name: format!("joint{j}"),
                    value: 4.0,
                    bound: 3.14,
                    kind: ViolationKind::AboveMax,
                })
                .collect(),
        }
    }

    #[test]
    fn starts_at_zero() {
        let s = RelayStatistics::new().snapshot();
        assert_eq!(s, StatisticsSnapshot::default());
        assert_eq!(s.block_percentage(), 0.0);
    }

    #[test]
    fn blocked_verdict_updates_last_violation() {
        let stats = RelayStatistics::new();
        stats.record(&verdict(false, true, 2));
        let s = stats.snapshot();
        assert_eq!((s.total, s.allowed, s.blocked), (1, 0, 1));
        let last = s.last_violation.expect("violation recorded");
        assert_eq!(last.violations.len(), 2);
        assert!(!last.overridden);
    }

    #[test]
    fn allowed_verdict_leaves_last_violation_untouched() {
        let stats = RelayStatistics::new();
        stats.record(&verdict(true, true, 0));
        let s = stats.snapshot();
        assert_eq!((s.total, s.allowed, s.blocked), (1, 1, 0));
        assert!(s.last_violation.is_none());
    }

    #[test]
    fn overridden_verdict_counts_as_allowed() {
        let stats = RelayStatistics::new();
        stats.record(&verdict(true, false, 1));
        let s = stats.snapshot();
        assert_eq!((s.total, s.allowed, s.blocked, s.overridden), (1, 1, 0, 1));
        assert!(s.last_violation.unwrap().overridden);
    }

    #[test]
    fn drops_do_not_touch_validation_counters() {
        let stats = RelayStatistics::new();
        stats.record_drop(&DropReason::Malformed("bad json".into()));
        stats.record_drop(&DropReason::Stale {
            age_secs: 2.0,
            threshold_secs: 0.5,
        });
        let s = stats.snapshot();
        assert_eq!(s.total, 0);
        assert_eq!(s.blocked, 0);
        assert_eq!(s.decode_errors, 1);
        assert_eq!(s.stale_drops, 1);
    }

    #[test]
    fn forward_and_publish_failure_are_tracked() {
        let stats = RelayStatistics::new();
        stats.record_forward(42.5);
        stats.record_publish_failure();
        let s = stats.snapshot();
        assert_eq!(s.last_forward_timestamp, Some(42.5));
        assert_eq!(s.publish_failures, 1);
    }

    #[test]
    fn record_returns_running_total() {
        let stats = RelayStatistics::new();
        assert_eq!(stats.record(&verdict(true, true, 0)), 1);
        stats.record_drop(&DropReason::Malformed("bad".to_string()));
        assert_eq!(stats.record(&verdict(false, true, 1)), 2);
    }

    #[test]
    fn block_percentage() {
        let stats = RelayStatistics::new();
        stats.record(&verdict(false, true, 1));
        stats.record(&verdict(true, true, 0));
        stats.record(&verdict(true, true, 0));
        stats.record(&verdict(true, true, 0));
        assert!((stats.snapshot().block_percentage() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn concurrent_readers_always_see_consistent_counters() {
        let stats = Arc::new(RelayStatistics::new());
        let writer = {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                for i in 0..5_000 {
                    stats.record(&verdict(i % 3 != 0, true, usize::from(i % 3 == 0)));
                }
            })
        };
        let reader = {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                for _ in 0..5_000 {
                    let s = stats.snapshot();
                    assert_eq!(s.allowed + s.blocked, s.total);
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();

        let s = stats.snapshot();
        assert_eq!(s.total, 5_000);
        assert_eq!(s.allowed + s.blocked, s.total);
    }
}
