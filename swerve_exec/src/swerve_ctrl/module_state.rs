//! Module state and position types, and the module state optimiser.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use util::maths::{wrap_to_range, wrapped_difference};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The velocity of a module: wheel speed along the direction the wheel is
/// pointing.
///
/// The angle may be stored in any range, it is always interpreted modulo 2pi.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    /// Signed wheel speed, negative is reversing along `angle_rad`.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Heading of the wheel.
    ///
    /// Units: radians
    pub angle_rad: f64
}

/// The position of a module, used for odometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulePosition {
    /// Distance travelled by the wheel.
    ///
    /// Units: meters
    pub distance_m: f64,

    /// Heading of the wheel.
    ///
    /// Units: radians
    pub angle_rad: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModuleState {

    pub fn new(speed_ms: f64, angle_rad: f64) -> Self {
        Self { speed_ms, angle_rad }
    }

    /// True if both fields are finite.
    pub fn is_finite(&self) -> bool {
        self.speed_ms.is_finite() && self.angle_rad.is_finite()
    }

    /// The heading mapped into (-pi, pi].
    pub fn wrapped_angle_rad(&self) -> f64 {
        wrap_to_range(self.angle_rad, -PI, PI)
    }

    /// The velocity of the wheel over the ground.
    pub fn velocity_vector(&self) -> Vector2<f64> {
        Vector2::new(
            self.speed_ms * self.angle_rad.cos(),
            self.speed_ms * self.angle_rad.sin()
        )
    }

    /// True if reaching this state from `current_angle_rad` is shorter by
    /// reversing the wheel, i.e. needs more than a quarter turn.
    pub fn should_reverse(&self, current_angle_rad: f64) -> bool {
        wrapped_difference(current_angle_rad, self.angle_rad).abs() > FRAC_PI_2
    }

    /// Optimise this state against the current heading of the wheel.
    ///
    /// If the target heading is more than a quarter turn away the wheel is
    /// reversed and steered to the opposite heading instead, so the steer
    /// axis never moves more than pi/2. The velocity over the ground is
    /// unchanged.
    ///
    /// The returned angle is expressed relative to `current_angle_rad`, i.e.
    /// it is within pi/2 of it rather than wrapped.
    pub fn optimise(&self, current_angle_rad: f64) -> ModuleState {
        let delta = wrapped_difference(current_angle_rad, self.angle_rad);

        if delta.abs() > FRAC_PI_2 {
            ModuleState {
                speed_ms: -self.speed_ms,
                angle_rad: current_angle_rad + (delta - PI * delta.signum())
            }
        }
        else {
            ModuleState {
                speed_ms: self.speed_ms,
                angle_rad: current_angle_rad + delta
            }
        }
    }
}

impl ModulePosition {

    pub fn new(distance_m: f64, angle_rad: f64) -> Self {
        Self { distance_m, angle_rad }
    }
}
