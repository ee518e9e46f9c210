//! # Simulated module plant
//!
//! A simple simulation of the two axes of a swerve module, used to run the
//! controller without hardware. Each axis is modelled as a first order
//! speed response to the applied voltage with a static friction deadband:
//!
//! ```text
//! target_speed = sign(V) * max(|V| - k_s, 0) / k_v
//! d(speed)/dt  = (target_speed - speed) / time_const
//! ```
//!
//! The encoders and motors handed out by the plant share the axis state with
//! it, so the plant can be stepped while the module owns the hardware.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use crate::swerve_ctrl::{Encoder, ModuleHardware, MotorController};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulated plant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    /// Voltage needed to break the drive axis away.
    ///
    /// Units: volts
    pub drv_k_s_v: f64,

    /// Drive voltage per unit of wheel speed at steady state.
    ///
    /// Units: volts/(meters/second)
    pub drv_k_v_vsm: f64,

    /// Units: seconds
    pub drv_time_const_s: f64,

    /// Units: volts
    pub str_k_s_v: f64,

    /// Units: volts/(radians/second)
    pub str_k_v_vsrad: f64,

    /// Units: seconds
    pub str_time_const_s: f64,

    /// Heading of the steer axis at the start of the simulation.
    ///
    /// Units: radians
    #[serde(default)]
    pub str_initial_angle_rad: f64
}

/// State of one simulated axis, in physical units.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SimAxis {
    pub position: f64,
    pub velocity: f64,
    pub voltage_v: f64,

    /// Makes the axis' encoder return NaN
    pub sensor_fault: bool
}

/// The simulated plant of one module.
pub struct SimPlant {
    drv: Rc<RefCell<SimAxis>>,
    str: Rc<RefCell<SimAxis>>,

    drv_model: AxisModel,
    str_model: AxisModel,

    drv_per_tick: f64,
    str_per_tick: f64,

    /// Simulated time
    ///
    /// Units: seconds
    time_s: f64
}

/// Encoder reading a simulated axis.
pub struct SimEncoder {
    axis: Rc<RefCell<SimAxis>>,

    /// Physical units per tick
    per_tick: f64
}

/// Motor driving a simulated axis.
pub struct SimMotor {
    axis: Rc<RefCell<SimAxis>>
}

#[derive(Debug, Clone, Copy)]
struct AxisModel {
    k_s: f64,
    k_v: f64,
    time_const_s: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The axes of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Drive,
    Steer
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimPlant {
    /// Create a new plant at rest.
    ///
    /// `drv_per_tick` and `str_per_tick` are the encoder scalings, in meters
    /// and radians per tick respectively.
    pub fn new(params: &SimParams, drv_per_tick: f64, str_per_tick: f64) -> Self {
        let str_axis = SimAxis {
            position: params.str_initial_angle_rad,
            ..Default::default()
        };

        Self {
            drv: Rc::new(RefCell::new(SimAxis::default())),
            str: Rc::new(RefCell::new(str_axis)),
            drv_model: AxisModel {
                k_s: params.drv_k_s_v,
                k_v: params.drv_k_v_vsm,
                time_const_s: params.drv_time_const_s
            },
            str_model: AxisModel {
                k_s: params.str_k_s_v,
                k_v: params.str_k_v_vsrad,
                time_const_s: params.str_time_const_s
            },
            drv_per_tick,
            str_per_tick,
            time_s: 0.0
        }
    }

    /// Get the module hardware connected to this plant.
    pub fn hardware(&self) -> ModuleHardware<SimEncoder, SimMotor> {
        ModuleHardware {
            drv_encoder: SimEncoder {
                axis: Rc::clone(&self.drv),
                per_tick: self.drv_per_tick
            },
            str_encoder: SimEncoder {
                axis: Rc::clone(&self.str),
                per_tick: self.str_per_tick
            },
            drv_motor: SimMotor { axis: Rc::clone(&self.drv) },
            str_motor: SimMotor { axis: Rc::clone(&self.str) }
        }
    }

    /// Advance the simulation by `dt_s` seconds.
    pub fn step(&mut self, dt_s: f64) {
        if !(dt_s > 0.0) {
            warn!("Ignoring non-positive simulation step of {} s", dt_s);
            return;
        }

        self.drv_model.step(&mut self.drv.borrow_mut(), dt_s);
        self.str_model.step(&mut self.str.borrow_mut(), dt_s);
        self.time_s += dt_s;
    }

    /// Make an axis' encoder fail, or recover.
    pub fn set_sensor_fault(&mut self, axis: Axis, fault: bool) {
        debug!("Sim {:?} sensor fault: {}", axis, fault);
        self.axis(axis).borrow_mut().sensor_fault = fault;
    }

    /// Current state of an axis.
    pub fn axis_state(&self, axis: Axis) -> SimAxis {
        *self.axis(axis).borrow()
    }

    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    fn axis(&self, axis: Axis) -> &Rc<RefCell<SimAxis>> {
        match axis {
            Axis::Drive => &self.drv,
            Axis::Steer => &self.str
        }
    }
}

impl AxisModel {
    fn step(&self, axis: &mut SimAxis, dt_s: f64) {
        let v = axis.voltage_v;
        let target = v.signum() * (v.abs() - self.k_s).max(0.0) / self.k_v;

        // Exact discretisation of the first order response, stable for any
        // step size
        let alpha = 1.0 - (-dt_s / self.time_const_s).exp();
        let new_velocity = axis.velocity + alpha * (target - axis.velocity);

        axis.position += 0.5 * (axis.velocity + new_velocity) * dt_s;
        axis.velocity = new_velocity;
    }
}

impl Encoder for SimEncoder {
    fn get_count(&self) -> f64 {
        let axis = self.axis.borrow();
        if axis.sensor_fault {
            std::f64::NAN
        }
        else {
            axis.position / self.per_tick
        }
    }

    fn get_rate(&self) -> f64 {
        let axis = self.axis.borrow();
        if axis.sensor_fault {
            std::f64::NAN
        }
        else {
            axis.velocity / self.per_tick
        }
    }
}

impl MotorController for SimMotor {
    fn set_voltage(&mut self, volts: f64) {
        self.axis.borrow_mut().voltage_v = volts;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::swerve_ctrl::{DrivetrainParams, ModuleState, Params, SwerveModule};
    use std::path::PathBuf;
    use std::f64::consts::PI;

    fn sim_params() -> SimParams {
        SimParams {
            drv_k_s_v: 1.0,
            drv_k_v_vsm: 3.0,
            drv_time_const_s: 0.1,
            str_k_s_v: 1.0,
            str_k_v_vsrad: 0.5,
            str_time_const_s: 0.05,
            str_initial_angle_rad: 0.0
        }
    }

    fn params_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../params")
    }

    #[test]
    fn test_steady_state_speed() {
        let mut plant = SimPlant::new(&sim_params(), 0.001, 0.001);
        let mut hw = plant.hardware();

        hw.drv_motor.set_voltage(7.0);
        for _ in 0..200 {
            plant.step(0.02);
        }

        // (7 - 1) / 3
        let drv = plant.axis_state(Axis::Drive);
        assert!((drv.velocity - 2.0).abs() < 1e-6);
        assert!((hw.drv_encoder.get_rate() - 2000.0).abs() < 1e-3);
        assert!((plant.time_s() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_deadband() {
        let mut plant = SimPlant::new(&sim_params(), 0.001, 0.001);
        let mut hw = plant.hardware();

        hw.str_motor.set_voltage(-0.8);
        for _ in 0..50 {
            plant.step(0.02);
        }

        assert_eq!(plant.axis_state(Axis::Steer).velocity, 0.0);
        assert_eq!(hw.str_encoder.get_count(), 0.0);
    }

    #[test]
    fn test_sensor_fault() {
        let mut plant = SimPlant::new(&sim_params(), 0.001, 0.001);
        let hw = plant.hardware();

        plant.set_sensor_fault(Axis::Steer, true);
        assert!(hw.str_encoder.get_count().is_nan());
        assert!(hw.drv_encoder.get_count().is_finite());

        plant.set_sensor_fault(Axis::Steer, false);
        assert!(hw.str_encoder.get_count().is_finite());
    }

    fn load_params() -> (DrivetrainParams, Params) {
        let dt: DrivetrainParams = util::params::load_path(
            params_dir().join("drivetrain.toml")
        ).unwrap();
        let params: Params = util::params::load_path(
            params_dir().join("swerve_ctrl.toml")
        ).unwrap();

        (dt, params)
    }

    #[test]
    fn test_steer_error_reduces() {
        let (dt, params) = load_params();

        // Start away from the demanded heading
        let mut sim = sim_params();
        sim.str_initial_angle_rad = 1.0;

        let mut plant = SimPlant::new(
            &sim,
            params.drv_distance_per_tick_m(),
            params.str_angle_per_tick_rad()
        );
        let mut module = SwerveModule::new(&dt, &params, plant.hardware()).unwrap();

        // The profile takes about 0.7 s to cover the turn, the error must
        // fall on every cycle of the approach
        let mut prev_error = 1.0;
        for i in 0..30 {
            module
                .set_desired_state(ModuleState::new(0.0, 0.0), i as f64 * dt.cycle_period_s)
                .unwrap();
            plant.step(dt.cycle_period_s);

            let error = plant.axis_state(Axis::Steer).position.abs();
            assert!(error < prev_error, "cycle {}: {} >= {}", i, error, prev_error);
            prev_error = error;
        }
        assert!(prev_error < 0.5);
    }

    #[test]
    fn test_closed_loop_tracks_demand() {
        let (dt, mut params) = load_params();

        // The plant needs 1 V to break away, so the steer loop has to be
        // stiff enough to push through that with a small error left
        params.str_pid.k_p = 10.0;

        let mut plant = SimPlant::new(
            &sim_params(),
            params.drv_distance_per_tick_m(),
            params.str_angle_per_tick_rad()
        );
        let mut module = SwerveModule::new(&dt, &params, plant.hardware()).unwrap();

        let desired = ModuleState::new(1.5, PI / 3.0);
        let mut max_str_rate: f64 = 0.0;

        for i in 0..250 {
            module.set_desired_state(desired, i as f64 * dt.cycle_period_s).unwrap();
            plant.step(dt.cycle_period_s);

            max_str_rate = max_str_rate.max(plant.axis_state(Axis::Steer).velocity.abs());
        }

        // The profile keeps the steer axis near its rate limit
        assert!(max_str_rate < 1.5 * dt.max_module_angular_velocity_rads);

        let state = module.get_state();
        assert!((state.speed_ms - 1.5).abs() < 0.05, "speed {}", state.speed_ms);
        assert!((state.angle_rad - PI / 3.0).abs() < 0.04, "angle {}", state.angle_rad);
    }
}
