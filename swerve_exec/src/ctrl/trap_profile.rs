//! # Trapezoidal motion profile
//!
//! A velocity and acceleration limited profile between two states. The
//! profile accelerates at the maximum acceleration, cruises at the maximum
//! velocity, then decelerates onto the goal. If the distance is too short to
//! reach the maximum velocity the cruise phase is skipped and the velocity
//! trace becomes a triangle.
//!
//! The profile is stateless: it is solved from scratch on every call. To
//! follow a moving goal, feed the state returned on the previous cycle back
//! in as the initial state of the next.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{check_positive, ConfigError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Velocity and acceleration limits of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    max_velocity: f64,
    max_acceleration: f64
}

/// A point along a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileState {
    pub position: f64,
    pub velocity: f64
}

/// A trapezoidal motion profile generator.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrapezoidProfile {
    constraints: Constraints
}

/// Phase timings of a solved profile, in the profile's positive direction.
#[derive(Debug, Clone, Copy)]
struct Timing {
    end_accel_s: f64,
    end_full_speed_s: f64,
    end_decel_s: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Constraints {
    /// Create a new set of constraints. Both limits must be finite and
    /// positive.
    pub fn new(max_velocity: f64, max_acceleration: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            max_velocity: check_positive("max_velocity", max_velocity)?,
            max_acceleration: check_positive("max_acceleration", max_acceleration)?
        })
    }

    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    pub fn max_acceleration(&self) -> f64 {
        self.max_acceleration
    }
}

impl ProfileState {
    pub fn new(position: f64, velocity: f64) -> Self {
        Self { position, velocity }
    }

    /// Mirror the state onto the other direction.
    fn directed(&self, direction: f64) -> Self {
        Self {
            position: self.position * direction,
            velocity: self.velocity * direction
        }
    }
}

impl TrapezoidProfile {

    pub fn new(constraints: Constraints) -> Self {
        Self { constraints }
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Get the state `t_s` seconds into the profile running from `initial`
    /// to `goal`.
    ///
    /// Once `t_s` reaches the end of the profile the goal itself is
    /// returned.
    pub fn calculate(&self, t_s: f64, initial: ProfileState, goal: ProfileState) -> ProfileState {
        let direction = Self::direction(&initial, &goal);
        let mut initial = initial.directed(direction);
        let goal = goal.directed(direction);

        // An initial velocity beyond the limit is pulled back onto it
        if initial.velocity > self.constraints.max_velocity {
            initial.velocity = self.constraints.max_velocity;
        }

        let timing = self.timing(&initial, &goal);
        let max_a = self.constraints.max_acceleration;
        let max_v = self.constraints.max_velocity;

        let mut result = initial;

        if t_s < timing.end_accel_s {
            result.velocity += t_s * max_a;
            result.position += (initial.velocity + t_s * max_a / 2.0) * t_s;
        }
        else if t_s < timing.end_full_speed_s {
            result.velocity = max_v;
            result.position += (initial.velocity + timing.end_accel_s * max_a / 2.0)
                * timing.end_accel_s
                + max_v * (t_s - timing.end_accel_s);
        }
        else if t_s <= timing.end_decel_s {
            let time_left_s = timing.end_decel_s - t_s;
            result.velocity = goal.velocity + time_left_s * max_a;
            result.position = goal.position
                - (goal.velocity + time_left_s * max_a / 2.0) * time_left_s;
        }
        else {
            result = goal;
        }

        result.directed(direction)
    }

    /// Total duration of the profile from `initial` to `goal`.
    pub fn total_time(&self, initial: ProfileState, goal: ProfileState) -> f64 {
        let direction = Self::direction(&initial, &goal);
        let mut initial = initial.directed(direction);
        let goal = goal.directed(direction);

        if initial.velocity > self.constraints.max_velocity {
            initial.velocity = self.constraints.max_velocity;
        }

        self.timing(&initial, &goal).end_decel_s
    }

    /// The profile runs in the negative direction if the goal is behind the
    /// initial position.
    fn direction(initial: &ProfileState, goal: &ProfileState) -> f64 {
        if initial.position > goal.position {
            -1.0
        }
        else {
            1.0
        }
    }

    /// Solve the phase timings for an already directed pair of states.
    fn timing(&self, initial: &ProfileState, goal: &ProfileState) -> Timing {
        let max_a = self.constraints.max_acceleration;
        let max_v = self.constraints.max_velocity;

        // Treat the initial and goal velocities as the middle of a full
        // trapezoid running from and to rest, then cut off the parts that
        // are already behind (or beyond) us.
        let cutoff_begin_s = initial.velocity / max_a;
        let cutoff_dist_begin = cutoff_begin_s * cutoff_begin_s * max_a / 2.0;

        let cutoff_end_s = goal.velocity / max_a;
        let cutoff_dist_end = cutoff_end_s * cutoff_end_s * max_a / 2.0;

        let full_trapezoid_dist =
            cutoff_dist_begin + (goal.position - initial.position) + cutoff_dist_end;
        let mut accel_time_s = max_v / max_a;

        let mut full_speed_dist = full_trapezoid_dist - accel_time_s * accel_time_s * max_a;

        // Never reaches max velocity, triangle profile
        if full_speed_dist < 0.0 {
            accel_time_s = (full_trapezoid_dist / max_a).max(0.0).sqrt();
            full_speed_dist = 0.0;
        }

        let end_accel_s = accel_time_s - cutoff_begin_s;
        let end_full_speed_s = end_accel_s + full_speed_dist / max_v;
        let end_decel_s = end_full_speed_s + accel_time_s - cutoff_end_s;

        Timing {
            end_accel_s,
            end_full_speed_s,
            end_decel_s
        }
    }
}
