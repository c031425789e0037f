// src/error.rs

use crate::channel::Role;
use thiserror::Error;

pub type RigResult<T> = Result<T, RigError>;

/// Errors surfaced by the characterization loops.
///
/// `Fault` aborts the owning test (after the unconditional shutdown of
/// both setpoints); `Read` is a transient telemetry glitch that the
/// sampling loops retry without terminating a multi-minute sweep.
#[derive(Error, Debug)]
pub enum RigError {
    #[error("{role} fault code: {fault}")]
    Fault { role: Role, fault: &'static str },

    #[error("controller read failed: {0}")]
    Read(String),

    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RigError {
    /// Transient errors are retried in place; everything else propagates.
    pub fn is_transient(&self) -> bool {
        matches!(self, RigError::Read(_))
    }
}

// src/error.rs
