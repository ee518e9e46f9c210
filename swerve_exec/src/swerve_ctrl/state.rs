//! Implementations for the SwerveModule state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use serde::Serialize;
use std::f64::consts::PI;
use util::maths::wrap_to_range;

// Internal
use super::{
    DrivetrainParams, Params, SwerveCtrlError,
    ModuleState, ModulePosition,
    Encoder, MotorController, ModuleHardware
};
use crate::ctrl::{
    ConfigError, Constraints,
    PidController, ProfiledPidController, ProfileState, SimpleFeedforward
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Closed-loop controller for one swerve module.
pub struct SwerveModule<E, M>
where
    E: Encoder,
    M: MotorController
{
    hw: ModuleHardware<E, M>,

    drv_distance_per_tick_m: f64,
    str_angle_per_tick_rad: f64,

    drv_pid: PidController,
    str_pid: ProfiledPidController,

    drv_ff: SimpleFeedforward,
    str_ff: SimpleFeedforward,

    drv_max_abs_voltage_v: Option<f64>,
    str_max_abs_voltage_v: Option<f64>,

    status: ModuleStatus,

    /// Last finite sensor readings
    last_good: SensorData,

    /// Voltages last written to the motors
    cmd_voltage_v: (f64, f64),

    output: Option<OutputData>,
    report: StatusReport
}

/// Sensor readings in physical units.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct SensorData {
    /// Units: meters/second
    pub drv_speed_ms: f64,

    /// Units: meters
    pub drv_distance_m: f64,

    /// Heading, not wrapped.
    ///
    /// Units: radians
    pub str_angle_rad: f64
}

/// The result of one control cycle.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct OutputData {
    /// The state that was tracked after optimisation.
    pub optimised: ModuleState,

    /// The sensor readings used in the cycle.
    pub sensors: SensorData,

    /// The steer profile setpoint for this cycle.
    pub str_setpoint: ProfileState,

    /// Feedforward parts of the axis voltages.
    ///
    /// Units: volts
    pub drv_ff_v: f64,
    pub str_ff_v: f64,

    /// Voltages written to the motors.
    ///
    /// Units: volts
    pub drv_voltage_v: f64,
    pub str_voltage_v: f64
}

/// Status report for one control cycle.
#[derive(Clone, Copy, Default, Serialize, Debug, PartialEq)]
pub struct StatusReport {
    /// The wheel was reversed to shorten the steer motion.
    pub reversed: bool,

    /// The drive voltage was clamped by the controller or voltage limits.
    pub drv_saturated: bool,

    /// The steer voltage was clamped by the controller or voltage limits.
    pub str_saturated: bool,

    /// A drive sensor reading was not finite and the last good value was used.
    pub drv_sensor_fault: bool,

    /// A steer sensor reading was not finite and the last good value was used.
    pub str_sensor_fault: bool,

    /// A computed voltage was not finite and was replaced with zero.
    pub output_fault: bool,

    /// The steer axis has reached its goal.
    pub str_at_goal: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Lifecycle of a module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ModuleStatus {
    /// Constructed, no cycle has run yet.
    Idle,

    /// Cycles are being run.
    Running,

    /// Stopped, motors held at zero volts until the next desired state.
    Stopped
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<E, M> SwerveModule<E, M>
where
    E: Encoder,
    M: MotorController
{
    /// Create a new module controller.
    ///
    /// All parameters are checked here, an unusable configuration is
    /// rejected rather than producing NaN demands later. The steer profile
    /// is seeded at the current heading.
    pub fn new(
        drivetrain: &DrivetrainParams,
        params: &Params,
        hw: ModuleHardware<E, M>
    ) -> Result<Self, ConfigError> {
        drivetrain.validate()?;
        params.validate()?;

        let mut str_pid = ProfiledPidController::new(
            params.str_pid,
            Constraints::new(
                drivetrain.max_module_angular_velocity_rads,
                drivetrain.max_module_angular_accel_radss
            )?,
            drivetrain.cycle_period_s
        )?;
        str_pid.enable_continuous_input(-PI, PI)?;
        str_pid.set_tolerance(params.str_tolerance_rad, std::f64::INFINITY);

        let mut module = Self {
            hw,
            drv_distance_per_tick_m: params.drv_distance_per_tick_m(),
            str_angle_per_tick_rad: params.str_angle_per_tick_rad(),
            drv_pid: PidController::new(params.drv_pid)?,
            str_pid,
            drv_ff: params.drv_ff,
            str_ff: params.str_ff,
            drv_max_abs_voltage_v: params.drv_max_abs_voltage_v,
            str_max_abs_voltage_v: params.str_max_abs_voltage_v,
            status: ModuleStatus::Idle,
            last_good: SensorData::default(),
            cmd_voltage_v: (0.0, 0.0),
            output: None,
            report: StatusReport::default()
        };

        let (sensors, _) = module.read_sensors();
        module.last_good = sensors;
        module.str_pid.reset(sensors.str_angle_rad);

        Ok(module)
    }

    /// Run one control cycle towards `desired` at time `now_s`.
    ///
    /// `now_s` must be a monotonic timestamp, the controllers derive their
    /// time steps from it. On error the motors are not written.
    pub fn set_desired_state(
        &mut self,
        desired: ModuleState,
        now_s: f64
    ) -> Result<(OutputData, StatusReport), SwerveCtrlError> {

        if !desired.is_finite() {
            warn!("Rejecting non-finite desired state {:?}", desired);
            return Err(SwerveCtrlError::InvalidDemand(desired));
        }
        if !now_s.is_finite() {
            warn!("Rejecting non-finite timestamp {}", now_s);
            return Err(SwerveCtrlError::InvalidTimestamp(now_s));
        }

        // Clear the status report
        self.report = StatusReport::default();

        // ---- SENSORS ----

        let (sensors, faults) = self.read_sensors();
        self.last_good = sensors;
        self.report.drv_sensor_fault = faults.0;
        self.report.str_sensor_fault = faults.1;

        // ---- OPTIMISE ----

        let optimised = desired.optimise(sensors.str_angle_rad);
        self.report.reversed = desired.should_reverse(sensors.str_angle_rad);
        if self.report.reversed {
            debug!(
                "Reversing wheel: {:?} -> {:?} from {:.3} rad",
                desired, optimised, sensors.str_angle_rad
            );
        }

        // ---- DRIVE AXIS ----

        let drv_fb_v = self.drv_pid.calculate(
            sensors.drv_speed_ms, optimised.speed_ms, now_s
        );
        let drv_ff_v = self.drv_ff.calculate(optimised.speed_ms);

        let (drv_voltage_v, drv_limited) = limit_voltage(
            drv_fb_v + drv_ff_v, self.drv_max_abs_voltage_v
        );
        if drv_limited {
            self.drv_pid.hold_integral(drv_voltage_v.signum());
        }
        self.report.drv_saturated = self.drv_pid.is_saturated();

        // ---- STEER AXIS ----

        let str_fb_v = self.str_pid.calculate(
            sensors.str_angle_rad, optimised.angle_rad, now_s
        );
        let str_setpoint = self.str_pid.setpoint();
        let str_ff_v = self.str_ff.calculate(str_setpoint.velocity);

        let (str_voltage_v, str_limited) = limit_voltage(
            str_fb_v + str_ff_v, self.str_max_abs_voltage_v
        );
        if str_limited {
            self.str_pid.hold_integral(str_voltage_v.signum());
        }
        self.report.str_saturated = self.str_pid.pid().is_saturated();
        self.report.str_at_goal = self.str_pid.at_goal();

        // ---- OUTPUT ----

        let drv_voltage_v = self.finite_or_zero(drv_voltage_v, "drive");
        let str_voltage_v = self.finite_or_zero(str_voltage_v, "steer");

        self.write_voltages(drv_voltage_v, str_voltage_v);
        self.status = ModuleStatus::Running;

        let output = OutputData {
            optimised,
            sensors,
            str_setpoint,
            drv_ff_v,
            str_ff_v,
            drv_voltage_v,
            str_voltage_v
        };

        trace!(
            "SwerveCtrl output:\n    drv: {:.3} V\n    str: {:.3} V",
            drv_voltage_v,
            str_voltage_v
        );

        self.output = Some(output);

        Ok((output, self.report))
    }

    /// Stop the module, writing zero volts to both motors.
    ///
    /// The controller state is kept, so that tracking resumes smoothly on
    /// the next desired state. Call `reset_controllers` before resuming if
    /// the module has been stopped for a long time.
    pub fn stop(&mut self) {
        self.write_voltages(0.0, 0.0);

        if self.status != ModuleStatus::Stopped {
            debug!("Module stopped");
        }
        self.status = ModuleStatus::Stopped;
    }

    /// Reset the drive PID and re-seed the steer profile at the current
    /// heading.
    pub fn reset_controllers(&mut self) {
        let (sensors, _) = self.read_sensors();
        self.last_good = sensors;

        self.drv_pid.reset();
        self.str_pid.reset(sensors.str_angle_rad);

        debug!("Controllers reset at {:.3} rad", sensors.str_angle_rad);
    }

    /// The current state of the module as measured, with the heading wrapped
    /// into (-pi, pi].
    pub fn get_state(&self) -> ModuleState {
        let (sensors, _) = self.read_sensors();

        ModuleState {
            speed_ms: sensors.drv_speed_ms,
            angle_rad: wrap_to_range(sensors.str_angle_rad, -PI, PI)
        }
    }

    /// The current position of the module as measured, with the heading
    /// wrapped into (-pi, pi].
    pub fn get_position(&self) -> ModulePosition {
        let (sensors, _) = self.read_sensors();

        ModulePosition::new(
            sensors.drv_distance_m,
            wrap_to_range(sensors.str_angle_rad, -PI, PI)
        )
    }

    pub fn status(&self) -> ModuleStatus {
        self.status
    }

    /// Output of the last completed cycle, if any.
    pub fn last_output(&self) -> Option<&OutputData> {
        self.output.as_ref()
    }

    /// The `(drive, steer)` voltages last written to the motors.
    pub fn commanded_voltage_v(&self) -> (f64, f64) {
        self.cmd_voltage_v
    }

    pub fn drv_controller(&self) -> &PidController {
        &self.drv_pid
    }

    pub fn str_controller(&self) -> &ProfiledPidController {
        &self.str_pid
    }

    /// Access the module's hardware.
    pub fn hardware(&self) -> &ModuleHardware<E, M> {
        &self.hw
    }

    /// Read the sensors, falling back on the last good value of any reading
    /// which isn't finite.
    ///
    /// Returns the readings and whether the `(drive, steer)` axes had a
    /// fault.
    fn read_sensors(&self) -> (SensorData, (bool, bool)) {
        let drv_speed = self.hw.drv_encoder.get_rate() * self.drv_distance_per_tick_m;
        let drv_distance = self.hw.drv_encoder.get_count() * self.drv_distance_per_tick_m;
        let str_angle = self.hw.str_encoder.get_count() * self.str_angle_per_tick_rad;

        let mut sensors = SensorData {
            drv_speed_ms: drv_speed,
            drv_distance_m: drv_distance,
            str_angle_rad: str_angle
        };
        let mut faults = (false, false);

        if !drv_speed.is_finite() {
            sensors.drv_speed_ms = self.last_good.drv_speed_ms;
            faults.0 = true;
        }
        if !drv_distance.is_finite() {
            sensors.drv_distance_m = self.last_good.drv_distance_m;
            faults.0 = true;
        }
        if !str_angle.is_finite() {
            sensors.str_angle_rad = self.last_good.str_angle_rad;
            faults.1 = true;
        }

        if faults.0 || faults.1 {
            warn!(
                "Non-finite sensor reading (drv: {}, str: {}), holding last good value",
                faults.0, faults.1
            );
        }

        (sensors, faults)
    }

    fn finite_or_zero(&mut self, volts: f64, axis: &str) -> f64 {
        if volts.is_finite() {
            volts
        }
        else {
            warn!("Non-finite {} voltage computed, commanding 0 V", axis);
            self.report.output_fault = true;
            0.0
        }
    }

    fn write_voltages(&mut self, drv_voltage_v: f64, str_voltage_v: f64) {
        self.hw.drv_motor.set_voltage(drv_voltage_v);
        self.hw.str_motor.set_voltage(str_voltage_v);
        self.cmd_voltage_v = (drv_voltage_v, str_voltage_v);
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Limit a voltage to `[-max, max]`, returning the limited voltage and
/// whether it was clamped.
fn limit_voltage(volts: f64, max_abs_v: Option<f64>) -> (f64, bool) {
    match max_abs_v {
        Some(max) if volts.abs() > max => (max * volts.signum(), true),
        _ => (volts, false)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl::PidGains;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Encoder returning fixed readings that the test can change.
    #[derive(Clone, Default)]
    struct MockEncoder {
        count: Rc<Cell<f64>>,
        rate: Rc<Cell<f64>>
    }

    /// Motor remembering every voltage written to it.
    #[derive(Clone, Default)]
    struct MockMotor {
        volts: Rc<RefCell<Vec<f64>>>
    }

    impl Encoder for MockEncoder {
        fn get_count(&self) -> f64 {
            self.count.get()
        }

        fn get_rate(&self) -> f64 {
            self.rate.get()
        }
    }

    impl MotorController for MockMotor {
        fn set_voltage(&mut self, volts: f64) {
            self.volts.borrow_mut().push(volts);
        }
    }

    impl MockMotor {
        fn last(&self) -> Option<f64> {
            self.volts.borrow().last().copied()
        }
    }

    struct Rig {
        drv_enc: MockEncoder,
        str_enc: MockEncoder,
        drv_mot: MockMotor,
        str_mot: MockMotor
    }

    fn drivetrain() -> DrivetrainParams {
        DrivetrainParams {
            max_module_angular_velocity_rads: PI,
            max_module_angular_accel_radss: 2.0 * PI,
            cycle_period_s: 0.02
        }
    }

    fn params() -> Params {
        Params {
            wheel_radius_m: 0.0508,
            drv_encoder_resolution_ticks: 4096,
            str_encoder_resolution_ticks: 4096,
            drv_pid: PidGains::new(1.0, 0.5, 0.0),
            str_pid: PidGains::new(1.0, 0.0, 0.0),
            drv_ff: SimpleFeedforward { k_s: 1.0, k_v: 3.0 },
            str_ff: SimpleFeedforward { k_s: 1.0, k_v: 0.5 },
            str_tolerance_rad: 0.02,
            drv_max_abs_voltage_v: None,
            str_max_abs_voltage_v: None
        }
    }

    fn build(params: &Params) -> (SwerveModule<MockEncoder, MockMotor>, Rig) {
        let rig = Rig {
            drv_enc: MockEncoder::default(),
            str_enc: MockEncoder::default(),
            drv_mot: MockMotor::default(),
            str_mot: MockMotor::default()
        };

        let module = SwerveModule::new(
            &drivetrain(),
            params,
            ModuleHardware {
                drv_encoder: rig.drv_enc.clone(),
                str_encoder: rig.str_enc.clone(),
                drv_motor: rig.drv_mot.clone(),
                str_motor: rig.str_mot.clone()
            }
        ).unwrap();

        (module, rig)
    }

    #[test]
    fn test_rejects_bad_config() {
        let mut p = params();
        p.drv_encoder_resolution_ticks = 0;

        let hw = ModuleHardware {
            drv_encoder: MockEncoder::default(),
            str_encoder: MockEncoder::default(),
            drv_motor: MockMotor::default(),
            str_motor: MockMotor::default()
        };
        assert_eq!(
            SwerveModule::new(&drivetrain(), &p, hw).err(),
            Some(ConfigError::ZeroResolution)
        );

        let mut dt = drivetrain();
        dt.max_module_angular_accel_radss = 0.0;
        let hw = ModuleHardware {
            drv_encoder: MockEncoder::default(),
            str_encoder: MockEncoder::default(),
            drv_motor: MockMotor::default(),
            str_motor: MockMotor::default()
        };
        assert!(SwerveModule::new(&dt, &params(), hw).is_err());
    }

    #[test]
    fn test_drive_straight_from_rest() {
        let (mut module, rig) = build(&params());
        assert_eq!(module.status(), ModuleStatus::Idle);

        let desired = ModuleState::new(2.0, 0.0);
        let (out, rpt) = module.set_desired_state(desired, 0.0).unwrap();

        assert_eq!(out.optimised, desired);
        assert!(!rpt.reversed);

        // P on 2 m/s error plus 1 V static and 3 V/(m/s) feedforward
        assert_eq!(out.drv_voltage_v, 9.0);
        assert_eq!(rig.drv_mot.last(), Some(9.0));

        // Already pointing the right way, no steering effort
        assert_eq!(out.str_voltage_v, 0.0);
        assert_eq!(rig.str_mot.last(), Some(0.0));
        assert_eq!(module.status(), ModuleStatus::Running);
    }

    #[test]
    fn test_reverse_instead_of_long_turn() {
        let (mut module, _rig) = build(&params());

        let (out, rpt) = module
            .set_desired_state(ModuleState::new(2.0, 170f64.to_radians()), 0.0)
            .unwrap();

        assert!(rpt.reversed);
        assert_eq!(out.optimised.speed_ms, -2.0);
        assert!((out.optimised.angle_rad - (-10f64).to_radians()).abs() < 1e-12);

        // Drive pushes backwards, steer turns negative
        assert!(out.drv_voltage_v < 0.0);
        assert!(out.str_voltage_v < 0.0);
        assert!(out.str_setpoint.velocity < 0.0);
    }

    #[test]
    fn test_stop_keeps_integral() {
        let (mut module, rig) = build(&params());
        let desired = ModuleState::new(1.0, 0.3);

        for i in 0..10 {
            module.set_desired_state(desired, i as f64 * 0.02).unwrap();
        }
        let integral = module.drv_controller().integral();
        assert!(integral > 0.0);
        assert!(rig.drv_mot.last().unwrap() != 0.0);

        module.stop();
        assert_eq!(rig.drv_mot.last(), Some(0.0));
        assert_eq!(rig.str_mot.last(), Some(0.0));
        assert_eq!(module.commanded_voltage_v(), (0.0, 0.0));
        assert_eq!(module.status(), ModuleStatus::Stopped);
        assert_eq!(module.drv_controller().integral(), integral);

        // Resuming continues from the same integral
        let (out, _) = module.set_desired_state(desired, 10.0 * 0.02).unwrap();
        assert!((module.drv_controller().integral() - (integral + 1.0 * 0.02)).abs() < 1e-12);
        assert!(out.drv_voltage_v > 0.0);
        assert_eq!(module.status(), ModuleStatus::Running);
    }

    #[test]
    fn test_reset_controllers() {
        let (mut module, rig) = build(&params());

        for i in 0..10 {
            module.set_desired_state(ModuleState::new(1.0, 1.0), i as f64 * 0.02).unwrap();
        }
        assert!(module.drv_controller().integral() > 0.0);

        rig.str_enc.count.set(512.0);
        module.reset_controllers();

        assert_eq!(module.drv_controller().integral(), 0.0);
        assert_eq!(
            module.str_controller().setpoint(),
            ProfileState::new(PI / 4.0, 0.0)
        );
    }

    #[test]
    fn test_sensor_fault_holds_last_good() {
        let (mut module, rig) = build(&params());

        rig.str_enc.count.set(1024.0);
        rig.drv_enc.rate.set(100.0);
        module.set_desired_state(ModuleState::new(1.0, PI / 2.0), 0.0).unwrap();

        rig.str_enc.count.set(std::f64::NAN);
        rig.drv_enc.rate.set(std::f64::INFINITY);
        let (out, rpt) = module.set_desired_state(ModuleState::new(1.0, PI / 2.0), 0.02).unwrap();

        assert!(rpt.drv_sensor_fault);
        assert!(rpt.str_sensor_fault);
        assert!(!rpt.output_fault);
        assert!((out.sensors.str_angle_rad - PI / 2.0).abs() < 1e-12);
        assert!((out.sensors.drv_speed_ms - 100.0 * params().drv_distance_per_tick_m()).abs() < 1e-12);
        assert!(out.drv_voltage_v.is_finite());
        assert!(out.str_voltage_v.is_finite());
    }

    #[test]
    fn test_rejects_non_finite_demand() {
        let (mut module, rig) = build(&params());

        let bad = ModuleState::new(std::f64::NAN, 0.0);
        assert!(matches!(
            module.set_desired_state(bad, 0.0),
            Err(SwerveCtrlError::InvalidDemand(s)) if s.speed_ms.is_nan()
        ));
        assert!(module
            .set_desired_state(ModuleState::new(1.0, 0.0), std::f64::NAN)
            .is_err());

        // Nothing written, still idle
        assert_eq!(rig.drv_mot.last(), None);
        assert_eq!(module.status(), ModuleStatus::Idle);
    }

    #[test]
    fn test_voltage_limits() {
        let mut p = params();
        p.drv_max_abs_voltage_v = Some(6.0);
        let (mut module, _rig) = build(&p);

        let (out, rpt) = module.set_desired_state(ModuleState::new(2.0, 0.0), 0.0).unwrap();
        assert_eq!(out.drv_voltage_v, 6.0);
        assert!(rpt.drv_saturated);
        assert!(!rpt.str_saturated);
    }

    #[test]
    fn test_voltage_limit_stops_windup() {
        let mut p = params();
        p.drv_pid = PidGains::new(1.0, 1.0, 0.0);
        p.drv_max_abs_voltage_v = Some(6.0);
        let (mut module, rig) = build(&p);

        // Wheel stalled, so the drive can never reach the demand
        for i in 0..3000 {
            let (out, rpt) = module
                .set_desired_state(ModuleState::new(2.0, 0.0), i as f64 * 0.02)
                .unwrap();
            assert_eq!(out.drv_voltage_v, 6.0);
            assert!(rpt.drv_saturated);
        }
        assert_eq!(module.drv_controller().integral(), 0.0);

        // Once the wheel is over speed the drive backs off straight away
        rig.drv_enc.rate.set(3.0 / p.drv_distance_per_tick_m());
        let (out, rpt) = module
            .set_desired_state(ModuleState::new(2.0, 0.0), 3000.0 * 0.02)
            .unwrap();
        assert!(out.drv_voltage_v < 6.0);
        assert!(!rpt.drv_saturated);
    }

    #[test]
    fn test_state_and_position() {
        let (module, rig) = build(&params());

        // One and a quarter turns of steer, 4096 ticks per revolution
        rig.str_enc.count.set(4096.0 * 1.25);
        rig.drv_enc.count.set(4096.0);
        rig.drv_enc.rate.set(-2048.0);

        let circumference = 2.0 * PI * 0.0508;

        let state = module.get_state();
        assert!((state.speed_ms + circumference / 2.0).abs() < 1e-12);
        assert!((state.angle_rad - PI / 2.0).abs() < 1e-12);

        let pos = module.get_position();
        assert!((pos.distance_m - circumference).abs() < 1e-12);
        assert!((pos.angle_rad - PI / 2.0).abs() < 1e-12);
    }
}
