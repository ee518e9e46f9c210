//! # Controllers module
//!
//! This module provides the building blocks used to close the loop on a
//! single actuated axis: a PID feedback controller, a static/velocity
//! feedforward model, a trapezoidal motion profile and a profiled PID
//! controller which composes the profile with the PID.
//!
//! Each controller is constructed separately and owns its own state, the
//! swerve module wires them together.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod feedforward;
pub mod pid;
pub mod profiled_pid;
pub mod trap_profile;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
pub use feedforward::*;
pub use pid::*;
pub use profiled_pid::*;
pub use trap_profile::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An inclusive `[min, max]` range used for output and integrator limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub min: f64,
    pub max: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised when a controller is given an unusable configuration.
///
/// These are always raised at construction time, a controller which has been
/// built successfully will not produce NaN from its configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be finite and positive, found {value}")]
    NonPositive {
        name: &'static str,
        value: f64
    },

    #[error("{name} must be finite and non-negative, found {value}")]
    InvalidGain {
        name: &'static str,
        value: f64
    },

    #[error("{name} limits must be finite with min < max, found {limits:?}")]
    InvalidLimits {
        name: &'static str,
        limits: Limits
    },

    #[error("Continuous input range must be finite with lo < hi, found ({lo}, {hi})")]
    InvalidContinuousRange {
        lo: f64,
        hi: f64
    },

    #[error("Encoder resolution must be non-zero")]
    ZeroResolution
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Limits {
    /// Check that the limits are finite and ordered.
    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.min.is_finite() && self.max.is_finite() && self.min < self.max {
            Ok(())
        }
        else {
            Err(ConfigError::InvalidLimits { name, limits: *self })
        }
    }

    /// Clamp a value into the limits.
    pub fn clamp(&self, value: f64) -> f64 {
        util::maths::clamp(&value, &self.min, &self.max)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Check that a configuration value is finite and strictly positive.
pub fn check_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    }
    else {
        Err(ConfigError::NonPositive { name, value })
    }
}

/// Check that a gain is finite and not negative.
pub fn check_gain(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    }
    else {
        Err(ConfigError::InvalidGain { name, value })
    }
}
