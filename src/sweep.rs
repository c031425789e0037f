// src/sweep.rs
// Ramped characterization sweeps: one shared sampling loop driven three
// ways (brake-current ramp at fixed RPM, RPM ramp at fixed brake
// current, brake-current ramp at fixed drive current).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::channel::{Channel, ChannelLayout, Metric, Role};
use crate::constants::{
    BATTERY_VOLTAGE_FLOOR, DISPLAY_INTERVAL_S, MONITOR_DISPLAY_INTERVAL_S, RPM_WAIT_POLL_S,
    RPM_WAIT_RATIO_HIGH, RPM_WAIT_RATIO_LOW, RPM_WAIT_TIMEOUT_S, SPIN_UP_RPM,
};
use crate::controller::{normalize_temp, MotorController};
use crate::error::RigResult;
use crate::ramp::Ramp;
use crate::telemetry::TelemetryLogger;

/// How a sampling loop ended. The early terminations are designed
/// stopping conditions, not errors; they exit through the same shutdown
/// path as normal completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed,
    EndOfPowerCurve,
    LowBattery,
    Interrupted,
}

#[derive(Debug, Clone, Copy)]
pub struct SweepReport {
    pub outcome: SweepOutcome,
    pub samples: u64,
}

/// Shared knobs for the characterization sweeps.
#[derive(Clone)]
pub struct SweepConfig {
    pub duration: Duration,
    pub display_interval: Duration,
    pub voltage_floor: f64,
    pub output_dir: PathBuf,
    /// Cooperative stop flag raised by the interrupt handler; loops that
    /// see it set exit through the unconditional shutdown path.
    pub stop: Option<Arc<AtomicBool>>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
            display_interval: Duration::from_secs_f64(DISPLAY_INTERVAL_S),
            voltage_floor: BATTERY_VOLTAGE_FLOOR,
            output_dir: PathBuf::from("output"),
            stop: None,
        }
    }
}

impl SweepConfig {
    fn stopped(&self) -> bool {
        self.stop
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Averaged and raw CSV paths for a parameter-encoded file stem.
    fn csv_paths(&self, stem: &str) -> (PathBuf, PathBuf) {
        (
            self.output_dir.join(format!("{}.csv", stem)),
            self.output_dir.join(format!("raw_{}.csv", stem)),
        )
    }
}

/// Which controller the ramp target is issued to each iteration.
enum RampCommand {
    GeneratorBrake,
    DriverRpm,
}

/// Spins the driver to `test_rpm`, then ramps the generator brake current
/// from `start_current` to `end_current` over the test duration.
pub fn characterise_generator_at_rpm(
    driver: &mut dyn MotorController,
    generator: &mut dyn MotorController,
    test_rpm: f64,
    start_current: f64,
    end_current: f64,
    config: &SweepConfig,
) -> RigResult<SweepReport> {
    std::fs::create_dir_all(&config.output_dir)?;
    let stem = format!(
        "generator_rpm_{:.0}_{:.0}A_to_{:.0}A_{:.0}s",
        test_rpm,
        start_current,
        end_current,
        config.duration.as_secs_f64()
    );
    let (avg_path, raw_path) = config.csv_paths(&stem);
    let mut logger = TelemetryLogger::create(ChannelLayout::FullRig, &avg_path, &raw_path)?;

    println!("Test RPM: {}", test_rpm);

    let result: RigResult<SweepReport> = (|| {
        driver.set_rpm(test_rpm)?;
        wait_for_rpm(driver, test_rpm);

        let ramp = Ramp::new(start_current, end_current, Instant::now(), config.duration);
        run_sampling_loop(
            driver,
            generator,
            &mut logger,
            &ramp,
            RampCommand::GeneratorBrake,
            Channel::BrakeCurrent,
            config,
        )
    })();

    // Shutdown is unconditional cleanup, not best-effort.
    let _ = driver.set_rpm(0.0);
    let _ = generator.set_brake_current(0.0);

    let report = result?;
    println!("Finished test with {} samples.", report.samples);
    Ok(report)
}

/// Holds the brake current at `test_current` and ramps the driver RPM
/// from `start_rpm` to `end_rpm` over the test duration.
pub fn characterise_generator_at_brake_current(
    driver: &mut dyn MotorController,
    generator: &mut dyn MotorController,
    test_current: f64,
    start_rpm: f64,
    end_rpm: f64,
    config: &SweepConfig,
) -> RigResult<SweepReport> {
    std::fs::create_dir_all(&config.output_dir)?;
    let stem = format!(
        "generator_current_{:.0}_{:.0}RPM_to_{:.0}RPM_{:.0}s",
        test_current,
        start_rpm,
        end_rpm,
        config.duration.as_secs_f64()
    );
    let (avg_path, raw_path) = config.csv_paths(&stem);
    let mut logger = TelemetryLogger::create(ChannelLayout::FullRig, &avg_path, &raw_path)?;

    println!("Test Current: {}", test_current);

    let result: RigResult<SweepReport> = (|| {
        driver.set_rpm(start_rpm)?;
        wait_for_rpm(driver, start_rpm);
        generator.set_brake_current(test_current)?;
        // The brake load drags the driver off its setpoint; give the RPM
        // loop a second chance to settle before sampling starts.
        wait_for_rpm(driver, start_rpm);

        let ramp = Ramp::new(start_rpm, end_rpm, Instant::now(), config.duration);
        run_sampling_loop(
            driver,
            generator,
            &mut logger,
            &ramp,
            RampCommand::DriverRpm,
            Channel::TargetRpm,
            config,
        )
    })();

    let _ = driver.set_rpm(0.0);
    let _ = generator.set_brake_current(0.0);

    let report = result?;
    println!("Finished test with {} samples.", report.samples);
    Ok(report)
}

/// Spins the driver up, switches it to current control at
/// `drive_current`, then ramps the generator brake current from
/// `start_brake` to `end_brake` over the test duration.
pub fn characterise_generator_at_drive_current(
    driver: &mut dyn MotorController,
    generator: &mut dyn MotorController,
    drive_current: f64,
    start_brake: f64,
    end_brake: f64,
    config: &SweepConfig,
) -> RigResult<SweepReport> {
    std::fs::create_dir_all(&config.output_dir)?;
    let stem = format!(
        "generator_drive_current_{:.0}_{:.0}A_to_{:.0}A_{:.0}s",
        drive_current,
        start_brake,
        end_brake,
        config.duration.as_secs_f64()
    );
    let (avg_path, raw_path) = config.csv_paths(&stem);
    let mut logger = TelemetryLogger::create(ChannelLayout::FullRig, &avg_path, &raw_path)?;

    println!("Test Drive Current: {}", drive_current);

    let result: RigResult<SweepReport> = (|| {
        driver.set_rpm(SPIN_UP_RPM)?;
        wait_for_rpm(driver, SPIN_UP_RPM);
        driver.set_current(drive_current)?;
        generator.set_brake_current(start_brake)?;

        let ramp = Ramp::new(start_brake, end_brake, Instant::now(), config.duration);
        run_sampling_loop(
            driver,
            generator,
            &mut logger,
            &ramp,
            RampCommand::GeneratorBrake,
            Channel::BrakeCurrent,
            config,
        )
    })();

    let _ = driver.set_current(0.0);
    let _ = driver.set_rpm(0.0);
    let _ = generator.set_brake_current(0.0);

    let report = result?;
    println!("Finished test with {} samples.", report.samples);
    Ok(report)
}

/// The shared sampling loop: issue the ramp setpoint, log one frame,
/// write the raw row, and at each display tick average/print/write/clear
/// and apply the two early-termination checks against the averaged
/// values.
fn run_sampling_loop(
    driver: &mut dyn MotorController,
    generator: &mut dyn MotorController,
    logger: &mut TelemetryLogger,
    ramp: &Ramp,
    command: RampCommand,
    target_channel: Channel,
    config: &SweepConfig,
) -> RigResult<SweepReport> {
    let start_time = ramp.start_time();
    let end_time = ramp.end_time();
    let mut next_display = start_time + config.display_interval;
    let mut samples: u64 = 0;

    while Instant::now() <= end_time {
        if config.stopped() {
            println!("Interrupted.");
            return Ok(SweepReport {
                outcome: SweepOutcome::Interrupted,
                samples,
            });
        }

        let target = ramp.target(Instant::now());
        let issued = match command {
            RampCommand::GeneratorBrake => generator.set_brake_current(target),
            RampCommand::DriverRpm => driver.set_rpm(target),
        };
        if let Err(e) = issued {
            if e.is_transient() {
                eprintln!("{}", e);
                continue;
            }
            return Err(e);
        }

        logger.new_log();
        logger.log(target_channel, target);

        match sample_both(logger, driver, generator) {
            Ok(()) => {}
            // Transient read glitches do not terminate a multi-minute
            // sweep; retry the iteration.
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
        }

        samples += 1;
    }

    Ok(SweepReport {
        outcome: SweepOutcome::Completed,
        samples,
    })
}

/// One frame's worth of motor telemetry: generator, driver, efficiency.
pub(crate) fn sample_both(
    logger: &mut TelemetryLogger,
    driver: &mut dyn MotorController,
    generator: &mut dyn MotorController,
) -> RigResult<()> {
    logger.log_motor(generator, Role::Generator)?;
    logger.log_motor(driver, Role::Driver)?;
    logger.log_efficiency();
    Ok(())
}

/// Polls the actual RPM every 0.1 s until it is within 1% of the target.
/// Times out after 30 s with a warning; convergence failure is non-fatal
/// and the test proceeds with the best-effort setpoint.
pub fn wait_for_rpm(motor: &mut dyn MotorController, target_rpm: f64) {
    if target_rpm == 0.0 {
        return;
    }
    let deadline = Instant::now() + Duration::from_secs_f64(RPM_WAIT_TIMEOUT_S);
    loop {
        let ratio = match motor.get_rpm() {
            Ok(rpm) => rpm / target_rpm,
            // Read glitch while waiting; keep polling.
            Err(_) => 0.0,
        };
        if (RPM_WAIT_RATIO_LOW..=RPM_WAIT_RATIO_HIGH).contains(&ratio) {
            return;
        }
        thread::sleep(Duration::from_secs_f64(RPM_WAIT_POLL_S));
        if Instant::now() > deadline {
            eprintln!("Error: timeout waiting for {:.0} RPM", target_rpm);
            return;
        }
    }
}

/// Blocks until both temperatures are at or below `ceiling`, printing a
/// cooldown line once per second. Transient read glitches keep waiting.
pub fn wait_for_motor_temp(motor: &mut dyn MotorController, ceiling: f64) -> RigResult<()> {
    loop {
        match motor.get_measurements() {
            Ok(m) => {
                let temp_fet = normalize_temp(m.temp_fet);
                let temp_motor = normalize_temp(m.temp_motor);
                if temp_fet <= ceiling && temp_motor <= ceiling {
                    return Ok(());
                }
                println!(
                    "Waiting for cooldown MOS: {:4.1}C MOT: {:4.1}C",
                    temp_fet, temp_motor
                );
            }
            Err(e) if e.is_transient() => eprintln!("{}", e),
            Err(e) => return Err(e),
        }
        thread::sleep(Duration::from_secs(1));
    }
}

/// Passive generator monitor: no setpoints, generator-only channel set,
/// optional open-ended duration, 1 s display tick.
pub fn monitor_motor(
    generator: &mut dyn MotorController,
    duration: Option<Duration>,
    config: &SweepConfig,
) -> RigResult<SweepReport> {
    std::fs::create_dir_all(&config.output_dir)?;
    let (avg_path, raw_path) = config.csv_paths("monitor");
    let mut logger = TelemetryLogger::create(ChannelLayout::GeneratorOnly, &avg_path, &raw_path)?;

    let start_time = Instant::now();
    let end_time = duration.map(|d| start_time + d);
    let display_interval = Duration::from_secs_f64(MONITOR_DISPLAY_INTERVAL_S);
    let mut next_display = start_time + display_interval;
    let mut samples: u64 = 0;

    loop {
        if let Some(end) = end_time {
            if Instant::now() > end {
                break;
            }
        }
        if config.stopped() {
            println!("Interrupted.");
            return Ok(SweepReport {
                outcome: SweepOutcome::Interrupted,
                samples,
            });
        }

        logger.new_log();
        match logger.log_motor(generator, Role::Generator) {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                eprintln!("{}", e);
                continue;
            }
            Err(e) => return Err(e),
        }
        logger.write_raw_csv()?;

        if Instant::now() > next_display {
            logger.print_line();
            logger.write_avg_csv()?;
            logger.clear_averages();
            next_display = Instant::now() + display_interval;
        }

        samples += 1;
    }

    println!("Finished test with {} samples.", samples);
    Ok(SweepReport {
        outcome: SweepOutcome::Completed,
        samples,
    })
}

// src/sweep.rs
