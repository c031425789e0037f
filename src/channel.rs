// src/channel.rs
// Closed enumeration of the telemetry channels so the channel set of a
// test is checked at compile time instead of assembled from strings.

use std::fmt;

/// Which side of the rig a motor controller sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Spins the mechanical system (acts as a motor).
    Driver,
    /// Absorbs mechanical power and presents it as electrical brake load.
    Generator,
}

impl Role {
    /// Short column prefix used in CSV headers and status lines.
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::Driver => "Driver",
            Role::Generator => "Gen",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Driver => write!(f, "Driver"),
            Role::Generator => write!(f, "Generator"),
        }
    }
}

/// One per-motor telemetry stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Rpm,
    Voltage,
    Amperage,
    Wattage,
    FetTemp,
    MotorTemp,
}

impl Metric {
    pub fn display_name(&self) -> &'static str {
        match self {
            Metric::Rpm => "RPM",
            Metric::Voltage => "Voltage",
            Metric::Amperage => "Amperage",
            Metric::Wattage => "Wattage",
            Metric::FetTemp => "FET Temp",
            Metric::MotorTemp => "Motor Temp",
        }
    }
}

/// A named numeric telemetry stream logged during a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Efficiency,
    TargetRpm,
    BrakeCurrent,
    Motor(Role, Metric),
}

impl Channel {
    /// Column name used in the CSV header, in layout order.
    pub fn display_name(&self) -> String {
        match self {
            Channel::Efficiency => "Efficiency".to_string(),
            Channel::TargetRpm => "Target RPM".to_string(),
            Channel::BrakeCurrent => "Brake Current".to_string(),
            Channel::Motor(role, metric) => {
                format!("{} {}", role.prefix(), metric.display_name())
            }
        }
    }
}

/// Channels of a full driver+generator comparison test, in declared
/// (CSV column) order.
pub const FULL_RIG_CHANNELS: [Channel; 15] = [
    Channel::Efficiency,
    Channel::TargetRpm,
    Channel::BrakeCurrent,
    Channel::Motor(Role::Generator, Metric::Rpm),
    Channel::Motor(Role::Generator, Metric::Voltage),
    Channel::Motor(Role::Generator, Metric::Amperage),
    Channel::Motor(Role::Generator, Metric::Wattage),
    Channel::Motor(Role::Generator, Metric::FetTemp),
    Channel::Motor(Role::Generator, Metric::MotorTemp),
    Channel::Motor(Role::Driver, Metric::Rpm),
    Channel::Motor(Role::Driver, Metric::Voltage),
    Channel::Motor(Role::Driver, Metric::Amperage),
    Channel::Motor(Role::Driver, Metric::Wattage),
    Channel::Motor(Role::Driver, Metric::FetTemp),
    Channel::Motor(Role::Driver, Metric::MotorTemp),
];

/// Channels of a generator-only test (brake bench with no driver in the
/// loop), in declared order.
pub const GENERATOR_ONLY_CHANNELS: [Channel; 7] = [
    Channel::BrakeCurrent,
    Channel::Motor(Role::Generator, Metric::Rpm),
    Channel::Motor(Role::Generator, Metric::Voltage),
    Channel::Motor(Role::Generator, Metric::Amperage),
    Channel::Motor(Role::Generator, Metric::Wattage),
    Channel::Motor(Role::Generator, Metric::FetTemp),
    Channel::Motor(Role::Generator, Metric::MotorTemp),
];

/// The fixed channel set of one test type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    FullRig,
    GeneratorOnly,
}

impl ChannelLayout {
    pub fn channels(&self) -> &'static [Channel] {
        match self {
            ChannelLayout::FullRig => &FULL_RIG_CHANNELS,
            ChannelLayout::GeneratorOnly => &GENERATOR_ONLY_CHANNELS,
        }
    }

    /// Position of `channel` in this layout, or `None` when the layout
    /// does not carry it.
    pub fn index_of(&self, channel: Channel) -> Option<usize> {
        self.channels().iter().position(|c| *c == channel)
    }
}

// src/channel.rs
