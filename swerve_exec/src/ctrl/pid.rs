//! # PID controller
//!
//! A time-aware PID controller. The caller passes in the current timestamp
//! on every call and the controller works out the time step itself.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::{check_gain, ConfigError, Limits};
use util::maths::wrapped_difference_on;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default error tolerance for `at_setpoint`.
pub const DEFAULT_ERROR_TOLERANCE: f64 = 0.05;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains and limits of a PID controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Limits applied to the summed output. When set the integral is not
    /// allowed to wind up while the output is saturated.
    #[serde(default)]
    pub output_limits: Option<Limits>,

    /// Limits applied to the integral accumulator.
    #[serde(default)]
    pub integral_limits: Option<Limits>
}

/// A PID controller
#[derive(Debug, Clone, Serialize)]
pub struct PidController {
    gains: PidGains,

    /// The `(lo, hi)` range over which the input wraps, if continuous input
    /// is enabled.
    continuous_range: Option<(f64, f64)>,

    /// Previous timestamp that the controller was calculated at
    prev_time_s: Option<f64>,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,

    /// The integral before the last calculation's step
    prev_integral: f64,

    /// Error and error rate of the last calculation
    error: f64,
    error_deriv: f64,

    error_tolerance: f64,
    error_deriv_tolerance: f64,

    /// True if the last output was clamped by the output limits
    saturated: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidGains {

    /// Gains with no output or integral limits.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p, k_i, k_d,
            output_limits: None,
            integral_limits: None
        }
    }

    /// Check the gains and limits are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_gain("k_p", self.k_p)?;
        check_gain("k_i", self.k_i)?;
        check_gain("k_d", self.k_d)?;

        if let Some(l) = self.output_limits {
            l.validate("output")?;
        }
        if let Some(l) = self.integral_limits {
            l.validate("integral")?;
        }

        Ok(())
    }
}

impl PidController {

    /// Create a new controller with the given gains.
    pub fn new(gains: PidGains) -> Result<Self, ConfigError> {
        gains.validate()?;

        Ok(Self {
            gains,
            continuous_range: None,
            prev_time_s: None,
            prev_error: None,
            integral: 0f64,
            prev_integral: 0f64,
            error: 0f64,
            error_deriv: 0f64,
            error_tolerance: DEFAULT_ERROR_TOLERANCE,
            error_deriv_tolerance: std::f64::INFINITY,
            saturated: false
        })
    }

    /// Treat the input as continuous over `(lo, hi)`, so that the error is
    /// always the shortest way around the range (for example angles).
    pub fn enable_continuous_input(&mut self, lo: f64, hi: f64) -> Result<(), ConfigError> {
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(ConfigError::InvalidContinuousRange { lo, hi });
        }

        self.continuous_range = Some((lo, hi));
        Ok(())
    }

    /// The continuous input range, if enabled.
    pub fn continuous_range(&self) -> Option<(f64, f64)> {
        self.continuous_range
    }

    /// Set the tolerances used by `at_setpoint`.
    pub fn set_tolerance(&mut self, error_tolerance: f64, error_deriv_tolerance: f64) {
        self.error_tolerance = error_tolerance;
        self.error_deriv_tolerance = error_deriv_tolerance;
    }

    /// Get the output of the controller for the given measurement and
    /// setpoint at time `now_s`.
    ///
    /// The time step is the time since the previous call. On the first call
    /// after construction or `reset` there is no time step and neither the
    /// integral nor the derivative contribute. A timestamp which does not
    /// advance past the previous one is treated as a zero time step.
    pub fn calculate(&mut self, measurement: f64, setpoint: f64, now_s: f64) -> f64 {

        // Calculate the error, going the short way round if continuous
        let error = match self.continuous_range {
            Some((lo, hi)) => wrapped_difference_on(measurement, setpoint, hi - lo),
            None => setpoint - measurement
        };

        // Calculate dt, never negative
        let dt = match self.prev_time_s {
            Some(t0) => (now_s - t0).max(0f64),
            None => 0f64
        };

        // Accumulate the integral term, remembering the step so it can be
        // undone if the output saturates.
        let prev_integral = self.integral;
        if dt > 0f64 {
            self.integral += error * dt;
        }
        if let Some(l) = self.gains.integral_limits {
            self.integral = l.clamp(self.integral);
        }

        // Calculate the derivative
        let deriv = match self.prev_error {
            Some(e) if dt > 0f64 => (error - e) / dt,
            _ => 0f64
        };

        // Calculate the output
        let mut out =
            self.gains.k_p * error
            + self.gains.k_i * self.integral
            + self.gains.k_d * deriv;

        // Apply output limits
        self.saturated = false;
        if let Some(l) = self.gains.output_limits {
            let step = self.integral - prev_integral;

            if out > l.max {
                out = l.max;
                self.saturated = true;

                // Don't let the integral keep pushing into the limit
                if step > 0f64 {
                    self.integral = prev_integral;
                }
            }
            else if out < l.min {
                out = l.min;
                self.saturated = true;

                if step < 0f64 {
                    self.integral = prev_integral;
                }
            }
        }

        // Remember the previous error and time. The time only ever moves
        // forward so a backwards jump doesn't produce a large step later.
        self.prev_integral = prev_integral;
        self.error = error;
        self.error_deriv = deriv;
        self.prev_error = Some(error);
        self.prev_time_s = Some(match self.prev_time_s {
            Some(t0) if t0 > now_s => t0,
            _ => now_s
        });

        out
    }

    /// Undo the integral step of the last calculation if it pushed the
    /// output further in `direction` (the sign of the clamp).
    ///
    /// For use when the output is clamped downstream of the controller, for
    /// example by a final voltage limit after feedforward has been added.
    pub fn hold_integral(&mut self, direction: f64) {
        if (self.integral - self.prev_integral) * direction > 0f64 {
            self.integral = self.prev_integral;
        }
        self.saturated = true;
    }

    /// Reset the integral and the previous error and time, so that the next
    /// call is treated as the first.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_integral = 0f64;
        self.prev_error = None;
        self.prev_time_s = None;
        self.error = 0f64;
        self.error_deriv = 0f64;
        self.saturated = false;
    }

    /// True if the error and error rate of the last calculation are within
    /// the tolerances. Always false before the first calculation.
    pub fn at_setpoint(&self) -> bool {
        self.prev_error.is_some()
            && self.error.abs() <= self.error_tolerance
            && self.error_deriv.abs() <= self.error_deriv_tolerance
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Error of the last calculation
    pub fn error(&self) -> f64 {
        self.error
    }

    /// True if the last output was clamped to the output limits.
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }
}
