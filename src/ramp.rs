// src/ramp.rs

use std::time::{Duration, Instant};

/// Linearly time-interpolated setpoint for a fixed-duration sweep:
/// `start_value` at the start of the test, `end_value` at the end.
#[derive(Debug, Clone, Copy)]
pub struct Ramp {
    start_value: f64,
    end_value: f64,
    start_time: Instant,
    duration: Duration,
}

impl Ramp {
    pub fn new(start_value: f64, end_value: f64, start_time: Instant, duration: Duration) -> Self {
        Self {
            start_value,
            end_value,
            start_time,
            duration,
        }
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn end_time(&self) -> Instant {
        self.start_time + self.duration
    }

    /// Target at `now`. Saturating `Instant` arithmetic clamps the target
    /// at `end_value` once the duration has elapsed, so a caller polling
    /// one iteration late cannot overshoot the end of the ramp.
    pub fn target(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return self.end_value;
        }
        let range = self.end_value - self.start_value;
        let remaining = self.end_time().saturating_duration_since(now);
        self.start_value + range - range * (remaining.as_secs_f64() / self.duration.as_secs_f64())
    }
}

// src/ramp.rs
