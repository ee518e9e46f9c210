//! # Swerve module control
//!
//! Closed-loop control of a single swerve module: one drive axis spinning the
//! wheel and one steer axis pointing it. Each cycle the desired module state
//! is optimised against the current heading, then the drive axis is closed
//! with a PID plus feedforward on wheel speed and the steer axis with a
//! profiled PID plus feedforward on heading.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cmd;
mod eqpt;
mod module_state;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use cmd::*;
pub use eqpt::*;
pub use module_state::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during a control cycle.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SwerveCtrlError {
    #[error("Received a desired state with a non-finite field: {0:?}")]
    InvalidDemand(ModuleState),

    #[error("Received a non-finite cycle timestamp: {0}")]
    InvalidTimestamp(f64),
}
