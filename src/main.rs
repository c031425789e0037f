// src/main.rs

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use thot_rig::constants::TEST_COOLDOWN_S;
use thot_rig::controller::MotorController;
use thot_rig::mppt::{track_maximum_power, MpptConfig};
use thot_rig::shunt::ShuntLogger;
use thot_rig::sim::sim_rig;
use thot_rig::sweep::{
    characterise_generator_at_brake_current, characterise_generator_at_drive_current,
    characterise_generator_at_rpm, monitor_motor, SweepConfig,
};

/// Characterization bench for the motor-generator test rig. Runs against
/// the built-in simulated rig; the hardware serial client plugs in behind
/// the same controller interface.
#[derive(Parser)]
#[command(name = "thot-rig")]
struct Cli {
    /// Directory for CSV output
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Spawn a battery shunt logger for this serial number
    #[arg(long)]
    battery_shunt: Option<String>,

    /// Spawn a generator shunt logger for this serial number
    #[arg(long)]
    generator_shunt: Option<String>,

    /// Shunt logger command to spawn for the flags above
    #[arg(long, default_value = "smartshunt")]
    shunt_logger: PathBuf,

    #[command(subcommand)]
    command: BenchCommand,
}

#[derive(Subcommand)]
enum BenchCommand {
    /// Ramp brake current at a series of fixed driver RPMs
    RpmSweep {
        #[arg(long, default_value_t = 1000.0)]
        start_rpm: f64,
        #[arg(long, default_value_t = 3000.0)]
        end_rpm: f64,
        #[arg(long, default_value_t = 100.0)]
        step_rpm: f64,
        #[arg(long, default_value_t = 0.0)]
        start_current: f64,
        #[arg(long, default_value_t = 60.0)]
        end_current: f64,
        #[arg(long, default_value_t = 30.0)]
        duration: f64,
    },
    /// Ramp driver RPM at a series of fixed brake currents
    BrakeSweep {
        #[arg(long, default_value_t = 10.0)]
        start_current: f64,
        #[arg(long, default_value_t = 60.0)]
        end_current: f64,
        #[arg(long, default_value_t = 10.0)]
        step_current: f64,
        #[arg(long, default_value_t = 500.0)]
        start_rpm: f64,
        #[arg(long, default_value_t = 3000.0)]
        end_rpm: f64,
        #[arg(long, default_value_t = 60.0)]
        duration: f64,
    },
    /// Ramp brake current at a fixed drive current
    DriveCurrent {
        #[arg(long, default_value_t = 10.0)]
        drive_current: f64,
        #[arg(long, default_value_t = 0.0)]
        start_brake: f64,
        #[arg(long, default_value_t = 20.0)]
        end_brake: f64,
        #[arg(long, default_value_t = 60.0)]
        duration: f64,
    },
    /// Track the maximum-power brake current at a fixed drive current
    Mppt {
        #[arg(long, default_value_t = 5.0)]
        drive_current: f64,
        #[arg(long, default_value_t = 120.0)]
        duration: f64,
    },
    /// Log generator telemetry without driving the rig
    Monitor {
        /// Seconds to monitor for; runs until interrupted if omitted
        #[arg(long)]
        duration: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))?;
    }

    let mut shunts = Vec::new();
    if let Some(serial) = &cli.battery_shunt {
        shunts.push(ShuntLogger::spawn(
            &cli.shunt_logger,
            serial,
            &cli.output.join("battery-shunt.csv"),
        )?);
    }
    if let Some(serial) = &cli.generator_shunt {
        shunts.push(ShuntLogger::spawn(
            &cli.shunt_logger,
            serial,
            &cli.output.join("generator-shunt.csv"),
        )?);
    }

    let (mut driver, mut generator) = sim_rig();

    let result = run_bench(&cli, &mut driver, &mut generator, &stop);
    if let Err(e) = &result {
        eprintln!("Exception: {}", e);
    }

    // The rig is always left safe, whatever happened above.
    let _ = driver.set_current(0.0);
    let _ = driver.set_rpm(0.0);
    let _ = generator.set_brake_current(0.0);
    driver.stop_heartbeat();
    generator.stop_heartbeat();
    for shunt in &mut shunts {
        shunt.stop();
    }

    result
}

fn run_bench(
    cli: &Cli,
    driver: &mut dyn MotorController,
    generator: &mut dyn MotorController,
    stop: &Arc<AtomicBool>,
) -> Result<()> {
    let mut config = SweepConfig {
        output_dir: cli.output.clone(),
        stop: Some(stop.clone()),
        ..Default::default()
    };
    let cooldown = Duration::from_secs_f64(TEST_COOLDOWN_S);

    match &cli.command {
        BenchCommand::RpmSweep {
            start_rpm,
            end_rpm,
            step_rpm,
            start_current,
            end_current,
            duration,
        } => {
            config.duration = Duration::from_secs_f64(*duration);
            let mut rpm = *start_rpm;
            while rpm <= *end_rpm && !stop.load(Ordering::Relaxed) {
                characterise_generator_at_rpm(
                    driver,
                    generator,
                    rpm,
                    *start_current,
                    *end_current,
                    &config,
                )?;
                thread::sleep(cooldown);
                rpm += *step_rpm;
            }
        }
        BenchCommand::BrakeSweep {
            start_current,
            end_current,
            step_current,
            start_rpm,
            end_rpm,
            duration,
        } => {
            config.duration = Duration::from_secs_f64(*duration);
            let mut current = *start_current;
            while current <= *end_current && !stop.load(Ordering::Relaxed) {
                characterise_generator_at_brake_current(
                    driver, generator, current, *start_rpm, *end_rpm, &config,
                )?;
                thread::sleep(cooldown);
                current += *step_current;
            }
        }
        BenchCommand::DriveCurrent {
            drive_current,
            start_brake,
            end_brake,
            duration,
        } => {
            config.duration = Duration::from_secs_f64(*duration);
            characterise_generator_at_drive_current(
                driver,
                generator,
                *drive_current,
                *start_brake,
                *end_brake,
                &config,
            )?;
        }
        BenchCommand::Mppt {
            drive_current,
            duration,
        } => {
            let mppt_config = MpptConfig {
                drive_current: *drive_current,
                duration: Duration::from_secs_f64(*duration),
                output_dir: cli.output.clone(),
                stop: Some(stop.clone()),
                ..Default::default()
            };
            track_maximum_power(driver, generator, &mppt_config)?;
        }
        BenchCommand::Monitor { duration } => {
            monitor_motor(
                generator,
                duration.map(Duration::from_secs_f64),
                &config,
            )?;
        }
    }

    Ok(())
}

// src/main.rs
