// src/constants.rs

// Display tick cadence: accumulated samples are averaged, printed and
// written at this interval, then the averaging window resets.
pub const DISPLAY_INTERVAL_S: f64 = 0.25;
pub const MONITOR_DISPLAY_INTERVAL_S: f64 = 1.0;

// RPM convergence wait after issuing a spin-up setpoint.
pub const RPM_WAIT_POLL_S: f64 = 0.1;
pub const RPM_WAIT_TIMEOUT_S: f64 = 30.0;
pub const RPM_WAIT_RATIO_LOW: f64 = 0.99;
pub const RPM_WAIT_RATIO_HIGH: f64 = 1.01;

// Safety floor for the averaged driver-side battery voltage.
pub const BATTERY_VOLTAGE_FLOOR: f64 = 24.0;

// Temperature readings at or above this are sensor-invalid and reported as 0.
pub const TEMP_INVALID_C: f64 = 150.0;

// Cooldown ceiling for wait_for_motor_temp.
pub const COOLDOWN_TEMP_C: f64 = 46.0;

// Pause between consecutive tests in a bench sequence.
pub const TEST_COOLDOWN_S: f64 = 0.5;

// MPPT hill-climb tuning. A regression beyond the tolerance backs the
// brake current off by the down step and rearms the probe interval; the
// forced probe nudges it up by the up step and shortens its own interval.
pub const MPPT_REGRESSION_TOLERANCE: f64 = 0.005;
pub const MPPT_BRAKE_STEP_DOWN_A: f64 = 0.02;
pub const MPPT_BRAKE_STEP_UP_A: f64 = 0.01;
pub const MPPT_INITIAL_SEND_INTERVAL_S: f64 = 10.0;
pub const MPPT_SEND_INTERVAL_DECAY_S: f64 = 1.0;
pub const MPPT_SEND_INTERVAL_FLOOR_S: f64 = 1.0;

// Spin-up setpoint used before switching the driver to current control.
pub const SPIN_UP_RPM: f64 = 1000.0;

// src/constants.rs
