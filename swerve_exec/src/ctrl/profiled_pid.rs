//! # Profiled PID controller
//!
//! A PID controller whose setpoint follows a trapezoidal motion profile
//! towards the goal rather than jumping straight to it. Each call advances
//! the profile by one control period from the previous setpoint, so the
//! commanded motion always respects the velocity and acceleration limits
//! even when the goal moves.
//!
//! With continuous input enabled the goal and the current setpoint are both
//! unwrapped to lie within half a period of the measurement before the
//! profile is solved, so the profile always takes the short way round.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use serde::Serialize;
use util::maths::wrapped_difference_on;

use super::{
    check_positive, ConfigError,
    Constraints, PidController, PidGains, ProfileState, TrapezoidProfile
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller tracking a trapezoidal profile to its goal.
#[derive(Debug, Clone, Serialize)]
pub struct ProfiledPidController {
    pid: PidController,

    profile: TrapezoidProfile,

    /// Time the profile is advanced by on each call.
    ///
    /// Units: seconds
    period_s: f64,

    /// Latest goal, unwrapped relative to the measurement
    goal: ProfileState,

    /// Latest profile setpoint
    setpoint: ProfileState,

    prev_time_s: Option<f64>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProfiledPidController {

    /// Create a new controller.
    ///
    /// `period_s` is the fixed control period the profile is advanced by on
    /// every call.
    pub fn new(
        gains: PidGains,
        constraints: Constraints,
        period_s: f64
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            pid: PidController::new(gains)?,
            profile: TrapezoidProfile::new(constraints),
            period_s: check_positive("period_s", period_s)?,
            goal: ProfileState::default(),
            setpoint: ProfileState::default(),
            prev_time_s: None
        })
    }

    /// Treat the input as continuous over `(lo, hi)`.
    pub fn enable_continuous_input(&mut self, lo: f64, hi: f64) -> Result<(), ConfigError> {
        self.pid.enable_continuous_input(lo, hi)
    }

    /// Set the tolerances used by `at_goal` and `at_setpoint`.
    pub fn set_tolerance(&mut self, error_tolerance: f64, error_deriv_tolerance: f64) {
        self.pid.set_tolerance(error_tolerance, error_deriv_tolerance);
    }

    /// Get the output of the controller for the given measurement, moving
    /// towards `goal_position` and coming to rest there.
    pub fn calculate(&mut self, measurement: f64, goal_position: f64, now_s: f64) -> f64 {
        let mut goal = ProfileState::new(goal_position, 0.0);

        // Bring the goal and setpoint within half a period of the
        // measurement so the profile sees the shortest path
        if let Some((lo, hi)) = self.pid.continuous_range() {
            let period = hi - lo;

            goal.position = unwrap_near(measurement, goal.position, period);
            self.setpoint.position = unwrap_near(measurement, self.setpoint.position, period);
        }

        // The profile only advances if time has moved on
        let advance_s = match self.prev_time_s {
            Some(t0) if now_s <= t0 => 0.0,
            _ => self.period_s
        };
        self.prev_time_s = Some(match self.prev_time_s {
            Some(t0) if t0 > now_s => t0,
            _ => now_s
        });

        self.goal = goal;
        self.setpoint = self.profile.calculate(advance_s, self.setpoint, self.goal);

        self.pid.calculate(measurement, self.setpoint.position, now_s)
    }

    /// Undo the PID's last integral step if it pushed the output further in
    /// `direction`. See `PidController::hold_integral`.
    pub fn hold_integral(&mut self, direction: f64) {
        self.pid.hold_integral(direction);
    }

    /// Re-seed the profile at rest at `measurement` and reset the PID.
    ///
    /// Must be called after the loop has been idle, otherwise the profile
    /// resumes from a stale setpoint.
    pub fn reset(&mut self, measurement: f64) {
        self.reset_to(ProfileState::new(measurement, 0.0));
    }

    /// Re-seed the profile at the given state and reset the PID.
    pub fn reset_to(&mut self, state: ProfileState) {
        debug!("Profiled controller reset to {:?}", state);

        self.pid.reset();
        self.setpoint = state;
        self.goal = state;
        self.prev_time_s = None;
    }

    /// The latest profile setpoint. Its velocity is the feedforward
    /// velocity for the axis.
    pub fn setpoint(&self) -> ProfileState {
        self.setpoint
    }

    /// The latest goal.
    pub fn goal(&self) -> ProfileState {
        self.goal
    }

    /// True if the profile has reached the goal and the PID is at the
    /// setpoint.
    pub fn at_goal(&self) -> bool {
        self.pid.at_setpoint() && self.setpoint == self.goal
    }

    /// True if the PID is at the current profile setpoint.
    pub fn at_setpoint(&self) -> bool {
        self.pid.at_setpoint()
    }

    pub fn constraints(&self) -> &Constraints {
        self.profile.constraints()
    }

    pub fn period_s(&self) -> f64 {
        self.period_s
    }

    /// The underlying PID controller.
    pub fn pid(&self) -> &PidController {
        &self.pid
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the value congruent to `value` (mod `period`) which lies within half a
/// period of `reference`. Values already in that window are returned as is.
fn unwrap_near(reference: f64, value: f64, period: f64) -> f64 {
    let half = period / 2.0;
    let diff = value - reference;

    if diff > -half && diff <= half {
        value
    }
    else {
        reference + wrapped_difference_on(reference, value, period)
    }
}
