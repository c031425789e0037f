// src/controller.rs

use crate::channel::Role;
use crate::constants::TEMP_INVALID_C;
use crate::error::{RigError, RigResult};

/// One raw telemetry frame as reported by a motor controller. RPM is
/// electrical (not divided down by pole pairs) and input current is as
/// seen from the battery, positive when drawing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurements {
    pub rpm: f64,
    pub v_in: f64,
    pub avg_input_current: f64,
    pub temp_fet: f64,
    pub temp_motor: f64,
    pub fault_code: u8,
}

/// The opaque motor-controller interface the bench drives. The serial
/// wire protocol behind it is supplied by an external device driver;
/// calls are synchronous and blocking, and transport glitches come back
/// as `RigError::Read`.
pub trait MotorController {
    fn get_measurements(&mut self) -> RigResult<Measurements>;
    fn get_rpm(&mut self) -> RigResult<f64>;
    fn set_rpm(&mut self, rpm: f64) -> RigResult<()>;
    fn set_current(&mut self, amps: f64) -> RigResult<()>;
    fn set_brake_current(&mut self, amps: f64) -> RigResult<()>;
    fn stop_heartbeat(&mut self);
    /// Motor pole pairs, used to convert electrical RPM to shaft RPM.
    fn pole_pairs(&self) -> f64;
}

/// Symbolic names for the controller's numeric fault codes.
pub fn fault_name(code: u8) -> &'static str {
    match code {
        0 => "NONE",
        1 => "OVER_VOLTAGE",
        2 => "UNDER_VOLTAGE",
        3 => "DRV",
        4 => "ABS_OVER_CURRENT",
        5 => "OVER_TEMP_FET",
        6 => "OVER_TEMP_MOTOR",
        _ => "UNKNOWN",
    }
}

/// Temperatures at or above 150 C are sensor-invalid (unplugged probe)
/// and reported as 0.
pub fn normalize_temp(raw: f64) -> f64 {
    if raw >= TEMP_INVALID_C {
        0.0
    } else {
        raw
    }
}

/// Derived instantaneous reading from one controller at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub rpm: f64,
    pub voltage: f64,
    pub amperage: f64,
    pub wattage: f64,
    pub temp_fet: f64,
    pub temp_motor: f64,
}

impl Sample {
    /// Derives a sample from a raw frame: shaft RPM from electrical RPM,
    /// invalid temperatures zeroed, and generator amperage negated so it
    /// reads as power delivered rather than drawn. A non-zero fault code
    /// aborts the owning test.
    pub fn from_measurements(
        measurements: &Measurements,
        pole_pairs: f64,
        role: Role,
    ) -> RigResult<Sample> {
        if measurements.fault_code != 0 {
            return Err(RigError::Fault {
                role,
                fault: fault_name(measurements.fault_code),
            });
        }

        let rpm = (measurements.rpm / pole_pairs).abs();
        let voltage = measurements.v_in;
        let mut amperage = measurements.avg_input_current;
        if role == Role::Generator {
            amperage = -amperage;
        }

        Ok(Sample {
            rpm,
            voltage,
            amperage,
            wattage: voltage * amperage,
            temp_fet: normalize_temp(measurements.temp_fet),
            temp_motor: normalize_temp(measurements.temp_motor),
        })
    }
}

// src/controller.rs
