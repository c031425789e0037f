// tests/telemetry_test.rs

use thot_rig::channel::{Channel, ChannelLayout, Metric, Role, FULL_RIG_CHANNELS};
use thot_rig::controller::{Measurements, MotorController, Sample};
use thot_rig::error::{RigError, RigResult};
use thot_rig::telemetry::TelemetryLogger;

/// Motor that replays one fixed measurement frame.
struct FixedMotor {
    measurements: Measurements,
    pole_pairs: f64,
}

impl MotorController for FixedMotor {
    fn get_measurements(&mut self) -> RigResult<Measurements> {
        Ok(self.measurements)
    }
    fn get_rpm(&mut self) -> RigResult<f64> {
        Ok(self.measurements.rpm)
    }
    fn set_rpm(&mut self, _rpm: f64) -> RigResult<()> {
        Ok(())
    }
    fn set_current(&mut self, _amps: f64) -> RigResult<()> {
        Ok(())
    }
    fn set_brake_current(&mut self, _amps: f64) -> RigResult<()> {
        Ok(())
    }
    fn stop_heartbeat(&mut self) {}
    fn pole_pairs(&self) -> f64 {
        self.pole_pairs
    }
}

fn test_logger(dir: &tempfile::TempDir) -> TelemetryLogger {
    let avg_path = dir.path().join("avg.csv");
    let raw_path = dir.path().join("raw.csv");
    TelemetryLogger::create(ChannelLayout::FullRig, &avg_path, &raw_path).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_mean_matches_logged_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut logger = test_logger(&dir);

        logger.log(Channel::BrakeCurrent, 1.0);
        logger.log(Channel::BrakeCurrent, 2.0);
        logger.log(Channel::BrakeCurrent, 3.0);

        let avg = logger.get_averages();
        assert_eq!(avg.get(Channel::BrakeCurrent), 2.0);
        // Channels with empty windows read as 0, by policy.
        assert_eq!(avg.get(Channel::TargetRpm), 0.0);
    }

    #[test]
    fn clear_averages_resets_every_channel() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut logger = test_logger(&dir);

        for channel in FULL_RIG_CHANNELS {
            logger.log(channel, 42.0);
        }
        logger.clear_averages();

        let avg = logger.get_averages();
        for channel in FULL_RIG_CHANNELS {
            assert_eq!(avg.get(channel), 0.0, "channel {:?} not cleared", channel);
        }
    }

    #[test]
    fn window_restarts_after_clear() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut logger = test_logger(&dir);

        logger.log(Channel::BrakeCurrent, 100.0);
        logger.clear_averages();
        logger.log(Channel::BrakeCurrent, 4.0);
        logger.log(Channel::BrakeCurrent, 6.0);

        // Old samples must not bleed into the new window.
        assert_eq!(logger.get_averages().get(Channel::BrakeCurrent), 5.0);
    }

    #[test]
    fn efficiency_is_zero_when_driver_wattage_is_zero() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut logger = test_logger(&dir);

        logger.new_log();
        logger.log(Channel::Motor(Role::Generator, Metric::Wattage), 55.0);
        logger.log(Channel::Motor(Role::Driver, Metric::Wattage), 0.0);
        logger.log_efficiency();

        assert_eq!(logger.frame_value(Channel::Efficiency), Some(0.0));
    }

    #[test]
    fn efficiency_is_percentage_of_driver_wattage() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut logger = test_logger(&dir);

        logger.new_log();
        logger.log(Channel::Motor(Role::Generator, Metric::Wattage), 50.0);
        logger.log(Channel::Motor(Role::Driver, Metric::Wattage), 100.0);
        logger.log_efficiency();

        assert_eq!(logger.frame_value(Channel::Efficiency), Some(50.0));
    }

    #[test]
    fn generator_amperage_sign_convention() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut logger = test_logger(&dir);
        let mut motor = FixedMotor {
            measurements: Measurements {
                rpm: 7000.0,
                v_in: 36.0,
                avg_input_current: 3.0,
                temp_fet: 40.0,
                temp_motor: 45.0,
                fault_code: 0,
            },
            pole_pairs: 7.0,
        };

        logger.new_log();
        logger.log_motor(&mut motor, Role::Generator).unwrap();
        logger.log_motor(&mut motor, Role::Driver).unwrap();

        // Generator amperage reads as power delivered, not drawn.
        assert_eq!(
            logger.frame_value(Channel::Motor(Role::Generator, Metric::Amperage)),
            Some(-3.0)
        );
        assert_eq!(
            logger.frame_value(Channel::Motor(Role::Driver, Metric::Amperage)),
            Some(3.0)
        );
        assert_eq!(
            logger.frame_value(Channel::Motor(Role::Generator, Metric::Wattage)),
            Some(36.0 * -3.0)
        );
        // Electrical RPM divided down by pole pairs.
        assert_eq!(
            logger.frame_value(Channel::Motor(Role::Driver, Metric::Rpm)),
            Some(1000.0)
        );
    }

    #[test]
    fn invalid_temperatures_are_normalized_to_zero() {
        let base = Measurements {
            rpm: 0.0,
            v_in: 36.0,
            avg_input_current: 0.0,
            temp_fet: 150.0,
            temp_motor: 200.0,
            fault_code: 0,
        };
        let sample = Sample::from_measurements(&base, 7.0, Role::Driver).unwrap();
        assert_eq!(sample.temp_fet, 0.0);
        assert_eq!(sample.temp_motor, 0.0);

        let ok = Measurements {
            temp_fet: 149.9,
            temp_motor: 80.0,
            ..base
        };
        let sample = Sample::from_measurements(&ok, 7.0, Role::Driver).unwrap();
        assert_eq!(sample.temp_fet, 149.9);
        assert_eq!(sample.temp_motor, 80.0);
    }

    #[test]
    fn negative_rpm_reports_absolute_shaft_speed() {
        let m = Measurements {
            rpm: -14000.0,
            v_in: 36.0,
            ..Default::default()
        };
        let sample = Sample::from_measurements(&m, 7.0, Role::Generator).unwrap();
        assert_eq!(sample.rpm, 2000.0);
    }

    #[test]
    fn non_zero_fault_code_aborts_with_symbolic_name() {
        let m = Measurements {
            fault_code: 5,
            ..Default::default()
        };
        let err = Sample::from_measurements(&m, 7.0, Role::Generator).unwrap_err();
        match &err {
            RigError::Fault { fault, .. } => assert_eq!(*fault, "OVER_TEMP_FET"),
            other => panic!("expected fault error, got {:?}", other),
        }
        assert_eq!(err.to_string(), "Generator fault code: OVER_TEMP_FET");
        assert!(!err.is_transient());
    }

    #[test]
    fn csv_round_trip_preserves_values_and_column_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let avg_path = dir.path().join("avg.csv");
        let raw_path = dir.path().join("raw.csv");

        {
            let mut logger =
                TelemetryLogger::create(ChannelLayout::FullRig, &avg_path, &raw_path).unwrap();
            logger.new_log();
            for (i, channel) in FULL_RIG_CHANNELS.iter().enumerate() {
                logger.log(*channel, (i as f64) * 1.5 - 3.0);
            }
            logger.write_raw_csv().unwrap();
            logger.write_avg_csv().unwrap();
        }

        for path in [&raw_path, &avg_path] {
            let mut reader = csv::Reader::from_path(path).unwrap();
            let headers = reader.headers().unwrap().clone();
            assert_eq!(headers.get(0), Some("Time"));
            for (i, channel) in FULL_RIG_CHANNELS.iter().enumerate() {
                assert_eq!(headers.get(i + 1).unwrap(), channel.display_name());
            }

            let record = reader.records().next().unwrap().unwrap();
            assert_eq!(record.len(), FULL_RIG_CHANNELS.len() + 1);
            for (i, _) in FULL_RIG_CHANNELS.iter().enumerate() {
                let expected = (i as f64) * 1.5 - 3.0;
                let parsed: f64 = record.get(i + 1).unwrap().parse().unwrap();
                assert!(
                    (parsed - expected).abs() < 1e-9,
                    "column {} round-tripped {} != {}",
                    i + 1,
                    parsed,
                    expected
                );
            }
        }
    }

    #[test]
    fn raw_csv_renders_unlogged_channels_as_empty_cells() {
        let dir = tempfile::TempDir::new().unwrap();
        let raw_path = dir.path().join("raw.csv");
        {
            let mut logger = TelemetryLogger::create(
                ChannelLayout::FullRig,
                &dir.path().join("avg.csv"),
                &raw_path,
            )
            .unwrap();
            logger.new_log();
            logger.log(Channel::BrakeCurrent, 12.5);
            logger.write_raw_csv().unwrap();
        }

        let mut reader = csv::Reader::from_path(&raw_path).unwrap();
        let record = reader.records().next().unwrap().unwrap();
        // Brake current is column 3 in the full layout; target RPM stays empty.
        assert_eq!(record.get(3), Some("12.5"));
        assert_eq!(record.get(2), Some(""));
    }
}
