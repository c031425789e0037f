// src/lib.rs - Library interface for internal module access

pub mod channel;
pub mod constants;
pub mod controller;
pub mod error;
pub mod mppt;
pub mod ramp;
pub mod shunt;
pub mod sim;
pub mod sweep;
pub mod telemetry;
