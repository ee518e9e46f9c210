//! Parameters structures for SwerveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::ctrl::{check_positive, ConfigError, PidGains, SimpleFeedforward};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Constants shared by every module on the drivetrain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrivetrainParams {

    /// Maximum angular velocity of a module's steer axis.
    ///
    /// Units: radians/second
    pub max_module_angular_velocity_rads: f64,

    /// Maximum angular acceleration of a module's steer axis.
    ///
    /// Units: radians/second^2
    pub max_module_angular_accel_radss: f64,

    /// Period of the control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64
}

/// Parameters for one swerve module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {

    // ---- GEOMETRY ----

    /// The radius of the wheel.
    ///
    /// Units: meters
    pub wheel_radius_m: f64,

    // ---- SENSORS ----

    /// Resolution of the drive axis encoder.
    ///
    /// Units: ticks/revolution
    pub drv_encoder_resolution_ticks: u32,

    /// Resolution of the steer axis encoder.
    ///
    /// Units: ticks/revolution
    pub str_encoder_resolution_ticks: u32,

    // ---- CONTROLLERS ----

    /// Drive axis PID gains, on wheel speed in meters/second.
    pub drv_pid: PidGains,

    /// Steer axis PID gains, on heading in radians.
    pub str_pid: PidGains,

    /// Drive axis feedforward, on wheel speed in meters/second.
    pub drv_ff: SimpleFeedforward,

    /// Steer axis feedforward, on heading rate in radians/second.
    pub str_ff: SimpleFeedforward,

    /// Tolerance on the steer error for the steer axis to be at its goal.
    ///
    /// Units: radians
    #[serde(default = "default_str_tolerance_rad")]
    pub str_tolerance_rad: f64,

    // ---- CAPABILITIES ----

    /// Maximum absolute voltage to apply to the drive motor, if limited.
    ///
    /// Units: volts
    #[serde(default)]
    pub drv_max_abs_voltage_v: Option<f64>,

    /// Maximum absolute voltage to apply to the steer motor, if limited.
    ///
    /// Units: volts
    #[serde(default)]
    pub str_max_abs_voltage_v: Option<f64>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DrivetrainParams {
    /// Check that all constants are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive(
            "max_module_angular_velocity_rads",
            self.max_module_angular_velocity_rads
        )?;
        check_positive(
            "max_module_angular_accel_radss",
            self.max_module_angular_accel_radss
        )?;
        check_positive("cycle_period_s", self.cycle_period_s)?;

        Ok(())
    }
}

impl Params {
    /// Check that all parameters are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("wheel_radius_m", self.wheel_radius_m)?;

        if self.drv_encoder_resolution_ticks == 0 || self.str_encoder_resolution_ticks == 0 {
            return Err(ConfigError::ZeroResolution);
        }

        self.drv_pid.validate()?;
        self.str_pid.validate()?;
        self.drv_ff.validate()?;
        self.str_ff.validate()?;

        check_positive("str_tolerance_rad", self.str_tolerance_rad)?;

        if let Some(v) = self.drv_max_abs_voltage_v {
            check_positive("drv_max_abs_voltage_v", v)?;
        }
        if let Some(v) = self.str_max_abs_voltage_v {
            check_positive("str_max_abs_voltage_v", v)?;
        }

        Ok(())
    }

    /// Distance the wheel travels per drive encoder tick.
    ///
    /// Units: meters/tick
    pub fn drv_distance_per_tick_m(&self) -> f64 {
        TAU * self.wheel_radius_m / self.drv_encoder_resolution_ticks as f64
    }

    /// Angle the wheel turns per steer encoder tick.
    ///
    /// Units: radians/tick
    pub fn str_angle_per_tick_rad(&self) -> f64 {
        TAU / self.str_encoder_resolution_ticks as f64
    }
}

fn default_str_tolerance_rad() -> f64 {
    0.02
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    fn params_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../params")
    }

    #[test]
    fn test_load_shipped_params() {
        let dt: DrivetrainParams = util::params::load_path(
            params_dir().join("drivetrain.toml")
        ).unwrap();
        dt.validate().unwrap();
        assert_eq!(dt.cycle_period_s, 0.02);

        let p: Params = util::params::load_path(
            params_dir().join("swerve_ctrl.toml")
        ).unwrap();
        p.validate().unwrap();

        assert_eq!(p.wheel_radius_m, 0.0508);
        assert_eq!(p.drv_ff, SimpleFeedforward { k_s: 1.0, k_v: 3.0 });
        assert_eq!(p.str_ff, SimpleFeedforward { k_s: 1.0, k_v: 0.5 });
        assert!((p.drv_distance_per_tick_m() - TAU * 0.0508 / 4096.0).abs() < 1e-15);
        assert!((p.str_angle_per_tick_rad() - TAU / 4096.0).abs() < 1e-15);
    }

    #[test]
    fn test_rejects_bad_params() {
        let mut p: Params = util::params::load_path(
            params_dir().join("swerve_ctrl.toml")
        ).unwrap();

        p.wheel_radius_m = 0.0;
        assert_eq!(
            p.validate(),
            Err(ConfigError::NonPositive { name: "wheel_radius_m", value: 0.0 })
        );

        p.wheel_radius_m = 0.05;
        p.str_encoder_resolution_ticks = 0;
        assert_eq!(p.validate(), Err(ConfigError::ZeroResolution));

        let dt = DrivetrainParams {
            max_module_angular_velocity_rads: -1.0,
            max_module_angular_accel_radss: 1.0,
            cycle_period_s: 0.02
        };
        assert!(dt.validate().is_err());
    }
}
