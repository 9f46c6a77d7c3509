//! [`StalenessGuard`] – message freshness deadline.
//!
//! A leader message is current robot state only for a short while.  The
//! guard compares its source timestamp against the local receipt time and
//! rejects it once the age passes the configured threshold.  Timestamps that
//! lie further in the future than the threshold are rejected too: the source
//! clock is then too far off for the age to mean anything.

use std::time::Duration;

use telerelay_types::{ConfigError, DropReason};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StalenessGuard {
    threshold: Duration,
}

impl StalenessGuard {
    /// # Errors
    ///
    /// [`ConfigError::InvalidStaleness`] for a zero threshold, which would
    /// drop every message.
    pub fn new(threshold: Duration) -> Result<Self, ConfigError> {
        if threshold.is_zero() {
            return Err(ConfigError::InvalidStaleness(
                "threshold must be greater than zero".to_string(),
            ));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// `Ok(())` when a message stamped `source_timestamp` is still fresh at
    /// `received_at` (both in seconds since the Unix epoch).
    pub fn check(&self, source_timestamp: f64, received_at: f64) -> Result<(), DropReason> {
        let age = received_at - source_timestamp;
        let limit = self.threshold.as_secs_f64();
        if age.is_nan() || age.abs() > limit {
            return Err(DropReason::Stale {
                age_secs: age,
                threshold_secs: limit,
            });
        }
        Ok(())
    }
}
