//! Commands passed into SwerveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::ModuleState;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A command issued to a swerve module by its coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ModuleCmd {
    /// Track the given state, starting or resuming cyclic control.
    SetDesiredState(ModuleState),

    /// Stop - zero both axis voltages, keeping the controller state.
    Stop,

    /// Reset the controllers so the next cycle starts cleanly from the
    /// current sensor readings.
    ResetControllers,
}
