//! # Feedforward model
//!
//! Static plus velocity feedforward, `V = k_s * sgn(v) + k_v * v`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{check_gain, ConfigError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A feedforward model for a simple permanent-magnet motor driving an axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleFeedforward {
    /// Static gain, the effort needed to overcome static friction.
    ///
    /// Units: volts
    pub k_s: f64,

    /// Velocity gain.
    ///
    /// Units: volts per unit of axis velocity
    pub k_v: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimpleFeedforward {

    /// Create a new feedforward model, checking the gains are usable.
    pub fn new(k_s: f64, k_v: f64) -> Result<Self, ConfigError> {
        let ff = Self { k_s, k_v };
        ff.validate()?;
        Ok(ff)
    }

    /// Check that the gains are finite and non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_gain("k_s", self.k_s)?;
        check_gain("k_v", self.k_v)?;
        Ok(())
    }

    /// Get the feedforward effort for the given velocity.
    ///
    /// No static term is applied at exactly zero velocity so that a resting
    /// axis isn't chattered about by the static gain.
    pub fn calculate(&self, velocity: f64) -> f64 {
        let sign = if velocity > 0.0 {
            1.0
        }
        else if velocity < 0.0 {
            -1.0
        }
        else {
            0.0
        };

        self.k_s * sign + self.k_v * velocity
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_feedforward() {
        let ff = SimpleFeedforward::new(1.0, 3.0).unwrap();

        assert_eq!(ff.calculate(2.0), 7.0);
        assert_eq!(ff.calculate(-2.0), -7.0);
        assert_eq!(ff.calculate(0.0), 0.0);
        assert_eq!(ff.calculate(-0.0), 0.0);
    }

    #[test]
    fn test_invalid_gains() {
        assert_eq!(
            SimpleFeedforward::new(-1.0, 3.0),
            Err(ConfigError::InvalidGain { name: "k_s", value: -1.0 })
        );
        assert!(SimpleFeedforward::new(1.0, std::f64::NAN).is_err());
    }
}
