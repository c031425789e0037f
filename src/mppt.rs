// src/mppt.rs
// Maximum-power-point tracking: adaptive hill-climbing over generator
// brake current to locate peak output wattage at a fixed drive current.
// Wattage-vs-brake-current is noisy and non-convex near the system
// limits, so the search is discrete rather than closed-form.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::channel::{Channel, ChannelLayout, Metric, Role};
use crate::constants::{
    BATTERY_VOLTAGE_FLOOR, MPPT_BRAKE_STEP_DOWN_A, MPPT_BRAKE_STEP_UP_A,
    MPPT_INITIAL_SEND_INTERVAL_S, MPPT_REGRESSION_TOLERANCE, MPPT_SEND_INTERVAL_DECAY_S,
    MPPT_SEND_INTERVAL_FLOOR_S, SPIN_UP_RPM,
};
use crate::controller::MotorController;
use crate::error::RigResult;
use crate::sweep::{sample_both, wait_for_rpm, SweepOutcome, SweepReport};
use crate::telemetry::TelemetryLogger;

/// Hill-climb state, stepped once per display tick against the previous
/// accepted tick's averages.
///
/// The response is deliberately asymmetric: any regression in power or
/// speed backs the brake current off immediately, while upward movement
/// comes only from the forced probe, whose interval shrinks the longer
/// the output has been flat. Noise is never chased upward.
#[derive(Debug, Clone)]
pub struct MpptTracker {
    brake_current: f64,
    last_rpm: f64,
    last_wattage: f64,
    last_change: Instant,
    send_interval: Duration,
    initial_send_interval: Duration,
}

impl MpptTracker {
    pub fn new(initial_brake_current: f64, send_interval: Duration, now: Instant) -> Self {
        Self {
            brake_current: initial_brake_current,
            last_rpm: 0.0,
            last_wattage: 0.0,
            last_change: now,
            send_interval,
            initial_send_interval: send_interval,
        }
    }

    pub fn brake_current(&self) -> f64 {
        self.brake_current
    }

    pub fn send_interval(&self) -> Duration {
        self.send_interval
    }

    /// One hill-climbing step. Returns the new brake-current setpoint
    /// when either rule fired, `None` when the operating point is
    /// unchanged (in which case the stored comparison point is kept).
    pub fn step(&mut self, avg_wattage: f64, avg_rpm: f64, now: Instant) -> Option<f64> {
        let mut changed = false;

        // Back off quickly on any regression in output power or speed,
        // and rearm the probe interval.
        if avg_wattage < self.last_wattage * (1.0 - MPPT_REGRESSION_TOLERANCE)
            || avg_rpm < self.last_rpm * (1.0 - MPPT_REGRESSION_TOLERANCE)
        {
            self.brake_current = (self.brake_current - MPPT_BRAKE_STEP_DOWN_A).max(0.0);
            self.send_interval = self.initial_send_interval;
            changed = true;
        }

        // Forced probe, evaluated independently of the regression step:
        // the longer the output has been flat, the more aggressively it
        // probes upward.
        if now.duration_since(self.last_change) > self.send_interval {
            self.brake_current += MPPT_BRAKE_STEP_UP_A;
            self.send_interval = self
                .send_interval
                .saturating_sub(Duration::from_secs_f64(MPPT_SEND_INTERVAL_DECAY_S))
                .max(Duration::from_secs_f64(MPPT_SEND_INTERVAL_FLOOR_S));
            changed = true;
        }

        if changed {
            self.last_change = now;
            self.last_rpm = avg_rpm;
            self.last_wattage = avg_wattage;
            Some(self.brake_current)
        } else {
            None
        }
    }
}

/// Knobs for one MPPT run.
#[derive(Clone)]
pub struct MpptConfig {
    pub drive_current: f64,
    pub initial_brake_current: f64,
    pub spin_up_rpm: f64,
    pub duration: Duration,
    pub display_interval: Duration,
    pub send_interval: Duration,
    pub voltage_floor: f64,
    pub output_dir: PathBuf,
    pub stop: Option<Arc<AtomicBool>>,
}

impl Default for MpptConfig {
    fn default() -> Self {
        Self {
            drive_current: 5.0,
            initial_brake_current: 0.0,
            spin_up_rpm: SPIN_UP_RPM,
            duration: Duration::from_secs(120),
            display_interval: Duration::from_millis(500),
            send_interval: Duration::from_secs_f64(MPPT_INITIAL_SEND_INTERVAL_S),
            voltage_floor: BATTERY_VOLTAGE_FLOOR,
            output_dir: PathBuf::from("output"),
            stop: None,
        }
    }
}

impl MpptConfig {
    fn stopped(&self) -> bool {
        self.stop
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// Runs the MPPT bench: spin up, switch the driver to current control,
/// then per display tick feed the averaged generator wattage/RPM into
/// the tracker and issue any setpoint it returns. Same safety aborts and
/// unconditional shutdown as the sweeps.
pub fn track_maximum_power(
    driver: &mut dyn MotorController,
    generator: &mut dyn MotorController,
    config: &MpptConfig,
) -> RigResult<SweepReport> {
    std::fs::create_dir_all(&config.output_dir)?;
    let stem = format!(
        "mppt_drive_{:.0}A_{:.0}s",
        config.drive_current,
        config.duration.as_secs_f64()
    );
    let avg_path = config.output_dir.join(format!("{}.csv", stem));
    let raw_path = config.output_dir.join(format!("raw_{}.csv", stem));
    let mut logger = TelemetryLogger::create(ChannelLayout::FullRig, &avg_path, &raw_path)?;

    println!("MPPT at drive current: {}A", config.drive_current);

    let result: RigResult<SweepReport> = (|| {
        driver.set_rpm(config.spin_up_rpm)?;
        wait_for_rpm(driver, config.spin_up_rpm);
        driver.set_current(config.drive_current)?;
        generator.set_brake_current(config.initial_brake_current)?;

        run_mppt_loop(driver, generator, &mut logger, config)
    })();

    let _ = driver.set_current(0.0);
    let _ = driver.set_rpm(0.0);
    let _ = generator.set_brake_current(0.0);

    let report = result?;
    println!("Finished test with {} samples.", report.samples);
    Ok(report)
}

fn run_mppt_loop(
    driver: &mut dyn MotorController,
    generator: &mut dyn MotorController,
    logger: &mut TelemetryLogger,
    config: &MpptConfig,
) -> RigResult<SweepReport> {
    let start_time = Instant::now();
    let end_time = start_time + config.duration;
    let mut next_display = start_time + config.display_interval;
    let mut tracker = MpptTracker::new(
        config.initial_brake_current,
        config.send_interval,
        start_time,
    );
    let mut samples: u64 = 0;

    while Instant::now() <= end_time {
        if config.stopped() {
            println!("Interrupted.");
            return Ok(SweepReport {
                outcome: SweepOutcome::Interrupted,
                samples,
            });
        }

        logger.new_log();
        logger.log(Channel::BrakeCurrent, tracker.brake_current());

        match sample_both(logger, driver, generator) {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                eprintln!("{}", e);
                continue;
            }
            Err(e) => return Err(e),
        }
        logger.write_raw_csv()?;

        if Instant::now() > next_display {
            let avg = logger.get_averages();
            logger.print_line_vals(&avg);
            logger.write_avg_csv()?;
            logger.clear_averages();
            next_display = Instant::now() + config.display_interval;

            let elapsed = start_time.elapsed();
            if avg.get(Channel::Motor(Role::Generator, Metric::Wattage)) < 0.0
                && elapsed > config.duration / 2
            {
                println!("End of power curve.");
                return Ok(SweepReport {
                    outcome: SweepOutcome::EndOfPowerCurve,
                    samples,
                });
            }
            if avg.get(Channel::Motor(Role::Driver, Metric::Voltage)) < config.voltage_floor {
                println!("Battery voltage too low");
                return Ok(SweepReport {
                    outcome: SweepOutcome::LowBattery,
                    samples,
                });
            }

            let setpoint = tracker.step(
                avg.get(Channel::Motor(Role::Generator, Metric::Wattage)),
                avg.get(Channel::Motor(Role::Generator, Metric::Rpm)),
                Instant::now(),
            );
            if let Some(brake_current) = setpoint {
                if let Err(e) = generator.set_brake_current(brake_current) {
                    if e.is_transient() {
                        eprintln!("{}", e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        samples += 1;
    }

    Ok(SweepReport {
        outcome: SweepOutcome::Completed,
        samples,
    })
}

// src/mppt.rs
