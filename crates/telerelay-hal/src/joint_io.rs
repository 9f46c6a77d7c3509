//! Hardware boundary traits for reading leader joints and driving a follower.
//!
//! Drivers implement these traits; the runtime only ever talks to them, so a
//! real arm and a simulated one are interchangeable.

use telerelay_types::{FollowerCommand, RelayError};

/// One sample taken from a leader arm.
#[derive(Debug, Clone, PartialEq)]
pub struct JointReading {
    /// Joint positions in the leader's own ordering.
    pub values: Vec<f64>,
    /// Gripper opening in `[0, 1]`, if the arm has one.
    pub gripper: Option<f64>,
}

impl JointReading {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            gripper: None,
        }
    }

    pub fn with_gripper(mut self, gripper: f64) -> Self {
        self.gripper = Some(gripper);
        self
    }
}

/// A source of leader joint positions (encoders, a teleop device, a sim).
pub trait JointReader: Send {
    /// Number of joints every reading carries.
    fn joint_count(&self) -> usize;

    /// Take one sample.  `None` means no sample is available this tick (e.g.
    /// the bus read timed out); the caller skips the tick.
    fn read(&mut self) -> Option<JointReading>;
}

/// A sink for follower commands (motor controllers, a sim).
pub trait JointWriter: Send {
    /// Apply `command` to the hardware.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HardwareFault`] if the command cannot be applied.
    fn write(&mut self, command: &FollowerCommand) -> Result<(), RelayError>;
}
