//! `telerelay-hal` – Hardware Boundary
//!
//! # Modules
//!
//! - [`joint_io`] – [`JointReader`] / [`JointWriter`]: the traits leader and
//!   follower drivers implement.
//! - [`sim`] – [`SineSweepLeader`] and [`SimFollowerArm`] for running the
//!   full relay without hardware.

pub mod joint_io;
pub mod sim;

pub use joint_io::{JointReader, JointReading, JointWriter};
pub use sim::{SimFollowerArm, SineSweepLeader};
