//! Simulated arms for demos and CI without physical hardware.
//!
//! [`SineSweepLeader`] produces smooth per-joint sine sweeps; with a large
//! enough amplitude it periodically crosses the follower's limits, which is
//! what `telerelay demo` uses to exercise blocking.  [`SimFollowerArm`]
//! records every command it is driven with.
//!
//! # Example
//!
//! ```rust
//! use telerelay_hal::sim::SineSweepLeader;
//! use telerelay_hal::JointReader;
//!
//! let mut leader = SineSweepLeader::new(6)
//!     .amplitude(1.2)
//!     .frequency_hz(0.5)
//!     .with_gripper();
//!
//! let reading = leader.read().expect("sim leader always has a sample");
//! assert_eq!(reading.values.len(), 6);
//! ```

use std::f64::consts::TAU;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use telerelay_types::{FollowerCommand, RelayError};
use tracing::trace;

use crate::joint_io::{JointReader, JointReading, JointWriter};

// ────────────────────────────────────────────────────────────────────────────
// Leader
// ────────────────────────────────────────────────────────────────────────────

/// A simulated leader arm sweeping every joint along a sine wave.
///
/// Joint `i` is phase-shifted by `i / joint_count` of a period so the joints
/// do not move in lockstep.
pub struct SineSweepLeader {
    joints: usize,
    amplitude: f64,
    frequency_hz: f64,
    gripper: bool,
    started: Instant,
}

impl SineSweepLeader {
    pub fn new(joints: usize) -> Self {
        Self {
            joints,
            amplitude: 1.0,
            frequency_hz: 0.25,
            gripper: false,
            started: Instant::now(),
        }
    }

    /// Peak joint displacement in radians (default 1.0).
    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Sweep frequency (default 0.25 Hz).
    pub fn frequency_hz(mut self, frequency_hz: f64) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    /// Also sweep a gripper channel between closed and open.
    pub fn with_gripper(mut self) -> Self {
        self.gripper = true;
        self
    }

    /// The reading at `t` seconds into the sweep.
    pub fn sample_at(&self, t: f64) -> JointReading {
        let n = self.joints.max(1) as f64;
        let values = (0..self.joints)
            .map(|i| {
                let phase = TAU * (self.frequency_hz * t + i as f64 / n);
                self.amplitude * phase.sin()
            })
            .collect();
        let reading = JointReading::new(values);
        if self.gripper {
            let g = 0.5 * (1.0 + (TAU * self.frequency_hz * t).cos());
            reading.with_gripper(g)
        } else {
            reading
        }
    }
}

impl JointReader for SineSweepLeader {
    fn joint_count(&self) -> usize {
        self.joints
    }

    fn read(&mut self) -> Option<JointReading> {
        Some(self.sample_at(self.started.elapsed().as_secs_f64()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Follower
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ArmState {
    positions: Vec<f64>,
    gripper: Option<f64>,
    commands: u64,
    last_seq: Option<u64>,
}

/// A simulated follower arm that jumps straight to every commanded position.
///
/// Clones share state, so a test can keep one handle while the other is
/// moved into a sink.  Commands with the wrong joint count are rejected as a
/// hardware fault.
#[derive(Debug, Clone)]
pub struct SimFollowerArm {
    joints: usize,
    state: Arc<Mutex<ArmState>>,
}

impl SimFollowerArm {
    pub fn new(joints: usize) -> Self {
        Self {
            joints,
            state: Arc::new(Mutex::new(ArmState {
                positions: vec![0.0; joints],
                ..ArmState::default()
            })),
        }
    }

    /// Most recently commanded joint positions.
    pub fn positions(&self) -> Vec<f64> {
        self.lock().positions.clone()
    }

    pub fn gripper(&self) -> Option<f64> {
        self.lock().gripper
    }

    /// Number of commands applied so far.
    pub fn command_count(&self) -> u64 {
        self.lock().commands
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.lock().last_seq
    }

    fn lock(&self) -> MutexGuard<'_, ArmState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl JointWriter for SimFollowerArm {
    fn write(&mut self, command: &FollowerCommand) -> Result<(), RelayError> {
        if command.joints.len() != self.joints {
            return Err(RelayError::HardwareFault {
                component: "sim_follower_arm".to_string(),
                message: format!(
                    "expected {} joints, got {}",
                    self.joints,
                    command.joints.len()
                ),
            });
        }
        let mut state = self.lock();
        state.positions.clone_from(&command.joints);
        if command.gripper.is_some() {
            state.gripper = command.gripper;
        }
        state.commands += 1;
        state.last_seq = command.seq;
        trace!(seq = ?command.seq, "sim follower arm moved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(joints: Vec<f64>) -> FollowerCommand {
        FollowerCommand {
            joints,
            timestamp: 2.0,
            source_timestamp: 1.0,
            seq: Some(7),
            gripper: Some(0.25),
        }
    }

    #[test]
    fn sweep_starts_phase_shifted() {
        let leader = SineSweepLeader::new(4).amplitude(2.0);
        let reading = leader.sample_at(0.0);
        assert!(reading.values[0].abs() < 1e-12);
        // Joint 1 is a quarter period ahead: sin(pi/2) = 1.
        assert!((reading.values[1] - 2.0).abs() < 1e-12);
        assert!(reading.gripper.is_none());
    }

    #[test]
    fn sweep_stays_within_amplitude() {
        let leader = SineSweepLeader::new(6).amplitude(0.8).frequency_hz(1.3);
        for step in 0..200 {
            let reading = leader.sample_at(step as f64 * 0.01);
            assert!(reading.values.iter().all(|v| v.abs() <= 0.8 + 1e-12));
        }
    }

    #[test]
    fn gripper_sweeps_unit_range() {
        let leader = SineSweepLeader::new(2).frequency_hz(1.0).with_gripper();
        assert!((leader.sample_at(0.0).gripper.unwrap() - 1.0).abs() < 1e-12);
        assert!(leader.sample_at(0.5).gripper.unwrap().abs() < 1e-12);
    }

    #[test]
    fn follower_records_commands() {
        let arm = SimFollowerArm::new(2);
        let mut writer = arm.clone();
        writer.write(&command(vec![0.3, -0.3])).unwrap();

        assert_eq!(arm.positions(), vec![0.3, -0.3]);
        assert_eq!(arm.gripper(), Some(0.25));
        assert_eq!(arm.command_count(), 1);
        assert_eq!(arm.last_seq(), Some(7));
    }

    #[test]
    fn follower_rejects_wrong_joint_count() {
        let mut arm = SimFollowerArm::new(3);
        let result = arm.write(&command(vec![0.0]));
        assert!(matches!(result, Err(RelayError::HardwareFault { .. })));
        assert_eq!(arm.command_count(), 0);
        assert_eq!(arm.positions(), vec![0.0; 3]);
    }
}
