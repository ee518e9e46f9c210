//! # Swerve module library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to
//! access items defined inside the swerve executable crate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Controllers - PID, feedforward and motion profile building blocks
pub mod ctrl;

/// Executable parameters
pub mod params;

/// Simulated plant - stands in for the module hardware
pub mod sim_plant;

/// Swerve control module - closes the loop on the drive and steer axes of a module
pub mod swerve_ctrl;
