//! Equipment interfaces used by a swerve module.
//!
//! The module doesn't talk to hardware directly, it reads its sensors and
//! drives its actuators through these traits.

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A quadrature encoder on one axis.
pub trait Encoder {
    /// The accumulated count since the encoder was zeroed.
    ///
    /// Units: ticks
    fn get_count(&self) -> f64;

    /// The current signed rate, consistent in sign with the count.
    ///
    /// Units: ticks/second
    fn get_rate(&self) -> f64;
}

/// A motor controller driving one axis.
pub trait MotorController {
    /// Apply the given voltage to the motor.
    ///
    /// Units: volts
    fn set_voltage(&mut self, volts: f64);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The sensors and actuators of one module.
pub struct ModuleHardware<E, M>
where
    E: Encoder,
    M: MotorController
{
    pub drv_encoder: E,
    pub str_encoder: E,
    pub drv_motor: M,
    pub str_motor: M
}
