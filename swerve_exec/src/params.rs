//! # Swerve Executable Parameters
//!
//! This module provide parameters for the swerve executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Serialize, Deserialize};
use util::logger::LevelFilter;

use crate::sim_plant::SimParams;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwerveExecParams {

    /// Pace the cycles against the wall clock
    pub real_time: bool,

    /// Run length limit.
    ///
    /// Units: seconds
    pub max_duration_s: f64,

    /// Log level of the per-cycle traces of the control core, as a
    /// `log::LevelFilter` name (e.g. "Debug")
    pub cycle_log_level: String,

    /// Simulated plant parameters
    pub sim: SimParams
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwerveExecParams {
    /// Parse the cycle log level, or `None` if it isn't a valid level name.
    pub fn cycle_level_filter(&self) -> Option<LevelFilter> {
        self.cycle_log_level.parse().ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_load_shipped_params() {
        let p: SwerveExecParams = util::params::load_path(
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../params/swerve_exec.toml")
        ).unwrap();

        assert!(!p.real_time);
        assert_eq!(p.max_duration_s, 60.0);
        assert_eq!(p.cycle_level_filter(), Some(LevelFilter::Debug));
        assert_eq!(p.sim.drv_k_v_vsm, 3.0);
    }

    #[test]
    fn test_bad_level() {
        let p: SwerveExecParams = util::params::from_str(r#"
            real_time = true
            max_duration_s = 1.0
            cycle_log_level = "Loud"

            [sim]
            drv_k_s_v = 0.0
            drv_k_v_vsm = 1.0
            drv_time_const_s = 0.1
            str_k_s_v = 0.0
            str_k_v_vsrad = 1.0
            str_time_const_s = 0.1
        "#).unwrap();

        assert_eq!(p.cycle_level_filter(), None);
        assert_eq!(p.sim.str_initial_angle_rad, 0.0);
    }
}
