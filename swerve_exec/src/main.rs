//! Main swerve module executable entry point.
//!
//! # Architecture
//!
//! The executable runs a single swerve module against the simulated plant,
//! driven by a command script. The general execution methodology consists
//! of:
//!
//!     - Initialise the session, logger and parameters
//!     - Load the command script
//!     - Main loop:
//!         - Command processing
//!         - Swerve control processing
//!         - Plant simulation
//!         - Archiving
//!     - Save the run summary
//!
//! # Usage
//!
//! ```text
//! swerve_exec <script_path>
//! ```
//!
//! The `SWERVE_SW_ROOT` environment variable must point at the workspace
//! root, parameters are loaded from `$SWERVE_SW_ROOT/params` and the session
//! is written into `$SWERVE_SW_ROOT/sessions`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;
use std::env;
use std::thread;
use std::time::{Duration, Instant};
use color_eyre::{Report, eyre::{WrapErr, eyre}};

// Internal
use swerve_lib::{
    params::SwerveExecParams,
    sim_plant::{Axis, SimPlant},
    swerve_ctrl::{
        DrivetrainParams, ModuleCmd, ModulePosition, ModuleState, ModuleStatus,
        OutputData, Params, StatusReport, SwerveModule
    }
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    session::Session,
    script_interpreter::{PendingCmds, ScriptInterpreter}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One archived control cycle.
#[derive(Serialize, Default)]
struct CycleRecord {
    time_s: f64,
    status: Option<ModuleStatus>,

    des_speed_ms: Option<f64>,
    des_angle_rad: Option<f64>,

    opt_speed_ms: f64,
    opt_angle_rad: f64,

    meas_speed_ms: f64,
    meas_angle_rad: f64,
    meas_vx_ms: f64,
    meas_vy_ms: f64,

    str_sp_angle_rad: f64,
    str_sp_rate_rads: f64,

    drv_ff_v: f64,
    str_ff_v: f64,
    drv_voltage_v: f64,
    str_voltage_v: f64,

    reversed: bool,
    drv_saturated: bool,
    str_saturated: bool,
    drv_sensor_fault: bool,
    str_sensor_fault: bool,
    output_fault: bool,
    str_at_goal: bool
}

/// Summary of the run, saved into the session at exit.
#[derive(Serialize, Default)]
struct RunSummary {
    num_cycles: u64,
    num_cmds: usize,
    duration_s: f64,
    num_rejected_demands: u64,
    num_reversals: u64,
    num_saturated_cycles: u64,
    num_sensor_fault_cycles: u64,
    num_output_fault_cycles: u64,
    num_cycle_overruns: u64,
    final_state: ModuleState,
    final_position: ModulePosition
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "swerve_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Exec params are needed before the logger is up
    let exec_params: SwerveExecParams = util::params::load(
        "swerve_exec.toml"
    ).wrap_err("Could not load exec params")?;

    let cycle_level = exec_params.cycle_level_filter()
        .ok_or_else(|| eyre!(
            "Invalid cycle log level \"{}\"", exec_params.cycle_log_level
        ))?;

    // Initialise logger
    logger_init(LevelFilter::Trace, cycle_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Swerve Module Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let drivetrain_params: DrivetrainParams = util::params::load(
        "drivetrain.toml"
    ).wrap_err("Could not load drivetrain params")?;

    let swerve_params: Params = util::params::load(
        "swerve_ctrl.toml"
    ).wrap_err("Could not load swerve control params")?;

    info!("Parameters loaded");

    let cycle_period_s = drivetrain_params.cycle_period_s;

    // ---- LOAD SCRIPT ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let script_path = get_script_path(&args)?;

    info!("Loading script from \"{}\"", script_path);

    let mut script: ScriptInterpreter<ModuleCmd> = ScriptInterpreter::new(script_path)
        .wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} commands\n",
        script.get_duration(),
        script.get_num_cmds()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut plant = SimPlant::new(
        &exec_params.sim,
        swerve_params.drv_distance_per_tick_m(),
        swerve_params.str_angle_per_tick_rad()
    );

    let mut module = SwerveModule::new(
        &drivetrain_params,
        &swerve_params,
        plant.hardware()
    ).wrap_err("Failed to initialise SwerveCtrl")?;
    info!("SwerveCtrl init complete");

    let mut archiver = Archiver::from_path(&session, "swerve_ctrl/cycle.csv")
        .wrap_err("Failed to initialise the cycle archive")?;

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut summary = RunSummary {
        num_cmds: script.get_num_cmds(),
        ..Default::default()
    };
    let mut desired: Option<ModuleState> = None;

    loop {

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        let time_s = summary.num_cycles as f64 * cycle_period_s;

        // ---- COMMAND PROCESSING ----

        match script.get_pending_cmds(time_s) {
            PendingCmds::None => (),
            PendingCmds::Some(cmds) => for cmd in cmds {
                info!("Executing command at {:.02} s: {:?}", time_s, cmd);

                match cmd {
                    ModuleCmd::SetDesiredState(s) => desired = Some(s),
                    ModuleCmd::Stop => {
                        desired = None;
                        module.stop();
                    },
                    ModuleCmd::ResetControllers => module.reset_controllers()
                }
            },
            PendingCmds::EndOfScript => {
                info!("End of script reached at {:.02} s", time_s);
                break;
            }
        }

        // ---- SWERVE CONTROL PROCESSING ----

        let mut record = CycleRecord {
            time_s,
            des_speed_ms: desired.map(|d| d.speed_ms),
            des_angle_rad: desired.map(|d| d.angle_rad),
            ..Default::default()
        };

        if let Some(d) = desired {
            match module.set_desired_state(d, time_s) {
                Ok((output, report)) => {
                    fill_record(&mut record, &output, &report);
                    count_report(&mut summary, &report);
                },
                Err(e) => {
                    // Processing errors are not fatal, stop the module and
                    // wait for the next demand
                    warn!("Error during SwerveCtrl processing: {}", e);
                    summary.num_rejected_demands += 1;
                    desired = None;
                    module.stop();
                }
            }
        }

        record.status = Some(module.status());

        // ---- PLANT SIMULATION ----

        plant.step(cycle_period_s);

        // ---- ARCHIVING ----

        archiver.serialise(record)
            .wrap_err("Failed to archive the cycle")?;

        summary.num_cycles += 1;

        if plant.time_s() >= exec_params.max_duration_s {
            warn!(
                "Maximum run duration of {:.02} s reached, stopping",
                exec_params.max_duration_s
            );
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        if exec_params.real_time {
            let cycle_dur = Instant::now() - cycle_start_instant;

            // Get sleep duration
            match Duration::from_secs_f64(cycle_period_s)
                .checked_sub(cycle_dur)
            {
                Some(d) => thread::sleep(d),
                None => {
                    warn!(
                        "Cycle overran by {:.06} s",
                        cycle_dur.as_secs_f64() - cycle_period_s
                    );
                    summary.num_cycle_overruns += 1;
                }
            }
        }
    }

    // ---- SHUTDOWN ----

    module.stop();

    summary.duration_s = plant.time_s();
    summary.final_state = module.get_state();
    summary.final_position = module.get_position();

    let drv_axis = plant.axis_state(Axis::Drive);
    let str_axis = plant.axis_state(Axis::Steer);
    info!(
        "Run complete after {} cycles ({} archived)\n    drv: {:.3} m at {:.3} m/s\n    str: {:.3} rad",
        summary.num_cycles,
        archiver.num_records(),
        drv_axis.position,
        drv_axis.velocity,
        str_axis.position
    );

    session.save_json("summary.json", &summary)
        .wrap_err("Failed to save the run summary")?;

    Ok(())
}

/// Get the script path from the command line arguments, including the
/// executable name.
fn get_script_path(args: &[String]) -> Result<&str, Report> {
    match args {
        [_, path] => Ok(path.as_str()),
        _ => Err(eyre!(
            "Expected exactly one argument (the script path), found {}",
            args.len().saturating_sub(1)
        ))
    }
}

/// Copy the cycle output and report into the archive record.
fn fill_record(record: &mut CycleRecord, output: &OutputData, report: &StatusReport) {
    let meas = ModuleState::new(output.sensors.drv_speed_ms, output.sensors.str_angle_rad);
    let meas_vel = meas.velocity_vector();

    record.opt_speed_ms = output.optimised.speed_ms;
    record.opt_angle_rad = output.optimised.angle_rad;
    record.meas_speed_ms = meas.speed_ms;
    record.meas_angle_rad = meas.wrapped_angle_rad();
    record.meas_vx_ms = meas_vel[0];
    record.meas_vy_ms = meas_vel[1];
    record.str_sp_angle_rad = output.str_setpoint.position;
    record.str_sp_rate_rads = output.str_setpoint.velocity;
    record.drv_ff_v = output.drv_ff_v;
    record.str_ff_v = output.str_ff_v;
    record.drv_voltage_v = output.drv_voltage_v;
    record.str_voltage_v = output.str_voltage_v;

    record.reversed = report.reversed;
    record.drv_saturated = report.drv_saturated;
    record.str_saturated = report.str_saturated;
    record.drv_sensor_fault = report.drv_sensor_fault;
    record.str_sensor_fault = report.str_sensor_fault;
    record.output_fault = report.output_fault;
    record.str_at_goal = report.str_at_goal;
}

fn count_report(summary: &mut RunSummary, report: &StatusReport) {
    if report.reversed {
        summary.num_reversals += 1;
    }
    if report.drv_saturated || report.str_saturated {
        summary.num_saturated_cycles += 1;
    }
    if report.drv_sensor_fault || report.str_sensor_fault {
        summary.num_sensor_fault_cycles += 1;
    }
    if report.output_fault {
        summary.num_output_fault_cycles += 1;
    }
}
