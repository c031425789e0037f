// src/telemetry.rs

use std::fs::File;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::channel::{Channel, ChannelLayout, Metric, Role};
use crate::controller::{MotorController, Sample};
use crate::error::RigResult;

/// Accumulates per-sample readings and rolling averages per channel for
/// one test run, and writes the two CSV streams (raw and averaged).
///
/// The frame holds the most recent value per channel and is replaced
/// wholesale by `new_log()` at the start of each sampling iteration. The
/// averaging windows accumulate every logged value until
/// `clear_averages()`, which must run immediately after each averaged row
/// is written or old samples bleed into the next display window.
pub struct TelemetryLogger {
    layout: ChannelLayout,
    frame: Vec<Option<f64>>,
    windows: Vec<Vec<f64>>,
    avg_writer: csv::Writer<File>,
    raw_writer: csv::Writer<File>,
}

/// Channel means for one display window. Channels absent from the layout
/// (and channels whose window was empty) read as 0.
pub struct Averages {
    layout: ChannelLayout,
    values: Vec<f64>,
}

impl Averages {
    pub fn get(&self, channel: Channel) -> f64 {
        self.layout
            .index_of(channel)
            .map(|i| self.values[i])
            .unwrap_or(0.0)
    }
}

impl TelemetryLogger {
    /// Opens both CSV streams and writes the shared header
    /// (`Time` + channel display names in layout order).
    pub fn create(layout: ChannelLayout, avg_path: &Path, raw_path: &Path) -> RigResult<Self> {
        let mut avg_writer = csv::Writer::from_path(avg_path)?;
        let mut raw_writer = csv::Writer::from_path(raw_path)?;

        let mut header = vec!["Time".to_string()];
        header.extend(layout.channels().iter().map(|c| c.display_name()));
        avg_writer.write_record(&header)?;
        avg_writer.flush()?;
        raw_writer.write_record(&header)?;
        raw_writer.flush()?;

        let count = layout.channels().len();
        Ok(Self {
            layout,
            frame: vec![None; count],
            windows: vec![Vec::new(); count],
            avg_writer,
            raw_writer,
        })
    }

    /// Clears the frame. Call once per sampling iteration, before any
    /// `log()` calls.
    pub fn new_log(&mut self) {
        for slot in &mut self.frame {
            *slot = None;
        }
    }

    /// Writes `value` into the frame and appends it to the channel's
    /// averaging window. Channels outside this logger's layout are
    /// ignored.
    pub fn log(&mut self, channel: Channel, value: f64) {
        if let Some(i) = self.layout.index_of(channel) {
            self.frame[i] = Some(value);
            self.windows[i].push(value);
        }
    }

    /// Reads one sample from `motor` and logs its six channels for
    /// `role`. Fails with the controller's symbolic fault name when the
    /// fault code is non-zero.
    pub fn log_motor(&mut self, motor: &mut dyn MotorController, role: Role) -> RigResult<()> {
        let measurements = motor.get_measurements()?;
        let sample = Sample::from_measurements(&measurements, motor.pole_pairs(), role)?;

        self.log(Channel::Motor(role, Metric::Rpm), sample.rpm);
        self.log(Channel::Motor(role, Metric::Voltage), sample.voltage);
        self.log(Channel::Motor(role, Metric::Amperage), sample.amperage);
        self.log(Channel::Motor(role, Metric::Wattage), sample.wattage);
        self.log(Channel::Motor(role, Metric::FetTemp), sample.temp_fet);
        self.log(Channel::Motor(role, Metric::MotorTemp), sample.temp_motor);
        Ok(())
    }

    /// Efficiency from the just-populated frame; 0 when the driver
    /// wattage is 0 (explicit policy, not an error).
    pub fn log_efficiency(&mut self) {
        let drv = self
            .frame_value(Channel::Motor(Role::Driver, Metric::Wattage))
            .unwrap_or(0.0);
        let gen = self
            .frame_value(Channel::Motor(Role::Generator, Metric::Wattage))
            .unwrap_or(0.0);

        let efficiency = if drv != 0.0 { 100.0 * gen / drv } else { 0.0 };
        self.log(Channel::Efficiency, efficiency);
    }

    /// The frame's current value for `channel`, if one was logged this
    /// iteration.
    pub fn frame_value(&self, channel: Channel) -> Option<f64> {
        self.layout.index_of(channel).and_then(|i| self.frame[i])
    }

    /// Arithmetic mean of each channel's window; 0 for empty windows.
    pub fn get_averages(&self) -> Averages {
        let values = self
            .windows
            .iter()
            .map(|window| {
                if window.is_empty() {
                    0.0
                } else {
                    window.iter().sum::<f64>() / window.len() as f64
                }
            })
            .collect();
        Averages {
            layout: self.layout,
            values,
        }
    }

    /// Resets every window. Must run immediately after each averaged row
    /// is written.
    pub fn clear_averages(&mut self) {
        for window in &mut self.windows {
            window.clear();
        }
    }

    /// Appends one instantaneous row (timestamp + frame values in layout
    /// order, unset channels as empty cells), flushing so a killed
    /// process loses at most one row.
    pub fn write_raw_csv(&mut self) -> RigResult<()> {
        let mut row = vec![format!("{:.6}", unix_time())];
        row.extend(self.frame.iter().map(|value| match value {
            Some(v) => format!("{}", v),
            None => String::new(),
        }));
        self.raw_writer.write_record(&row)?;
        self.raw_writer.flush()?;
        Ok(())
    }

    /// Appends one averaged row (timestamp + window means in layout
    /// order), flushing per write.
    pub fn write_avg_csv(&mut self) -> RigResult<()> {
        let averages = self.get_averages();
        let mut row = vec![format!("{:.6}", unix_time())];
        row.extend(averages.values.iter().map(|v| format!("{}", v)));
        self.avg_writer.write_record(&row)?;
        self.avg_writer.flush()?;
        Ok(())
    }

    /// Renders the fixed-column status line from the current averages.
    pub fn print_line(&self) {
        self.print_line_vals(&self.get_averages());
    }

    pub fn print_line_vals(&self, vals: &Averages) {
        match self.layout {
            ChannelLayout::FullRig => {
                println!(
                    "{:13.2} | E: {:4.1}% | RPM: {:4.0} | BC: {:5.2}A | \
                     Gen: {:4.0} RPM, {:4.1}V, {:5.2}A, {:6.1}W MOS: {:4.1}C MOT: {:4.1}C | \
                     Drv: {:4.0} RPM, {:4.1}V, {:5.2}A, {:6.1}W MOS: {:4.1}C MOT: {:4.1}C",
                    unix_time(),
                    vals.get(Channel::Efficiency),
                    vals.get(Channel::TargetRpm),
                    vals.get(Channel::BrakeCurrent),
                    vals.get(Channel::Motor(Role::Generator, Metric::Rpm)),
                    vals.get(Channel::Motor(Role::Generator, Metric::Voltage)),
                    vals.get(Channel::Motor(Role::Generator, Metric::Amperage)),
                    vals.get(Channel::Motor(Role::Generator, Metric::Wattage)),
                    vals.get(Channel::Motor(Role::Generator, Metric::FetTemp)),
                    vals.get(Channel::Motor(Role::Generator, Metric::MotorTemp)),
                    vals.get(Channel::Motor(Role::Driver, Metric::Rpm)),
                    vals.get(Channel::Motor(Role::Driver, Metric::Voltage)),
                    vals.get(Channel::Motor(Role::Driver, Metric::Amperage)),
                    vals.get(Channel::Motor(Role::Driver, Metric::Wattage)),
                    vals.get(Channel::Motor(Role::Driver, Metric::FetTemp)),
                    vals.get(Channel::Motor(Role::Driver, Metric::MotorTemp)),
                );
            }
            ChannelLayout::GeneratorOnly => {
                println!(
                    "[{:13.2}] BC: {:5.2}A | \
                     Gen: {:4.0} RPM, {:5.2}V, {:5.2}A, {:6.1}W MOS: {:4.1}C MOT: {:4.1}C",
                    unix_time(),
                    vals.get(Channel::BrakeCurrent),
                    vals.get(Channel::Motor(Role::Generator, Metric::Rpm)),
                    vals.get(Channel::Motor(Role::Generator, Metric::Voltage)),
                    vals.get(Channel::Motor(Role::Generator, Metric::Amperage)),
                    vals.get(Channel::Motor(Role::Generator, Metric::Wattage)),
                    vals.get(Channel::Motor(Role::Generator, Metric::FetTemp)),
                    vals.get(Channel::Motor(Role::Generator, Metric::MotorTemp)),
                );
            }
        }
    }
}

/// Wall-clock timestamp written into CSV rows (Unix epoch, seconds).
fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// src/telemetry.rs
