//! Wall and CPU clock sampling

use calltap_shared::Timestamps;
use nix::time::{clock_gettime, ClockId};

fn read_clock(id: ClockId) -> Option<f64> {
    clock_gettime(id)
        .ok()
        .map(|ts| ts.tv_sec() as f64 + ts.tv_nsec() as f64 / 1_000_000_000.0)
}

/// Monotonic wall clock in seconds
pub fn wall_clock() -> Option<f64> {
    read_clock(ClockId::CLOCK_MONOTONIC)
}

/// CPU time consumed by this process in seconds
pub fn cpu_clock() -> Option<f64> {
    read_clock(ClockId::CLOCK_PROCESS_CPUTIME_ID)
}

/// Produces a non-decreasing sequence of stamps.
///
/// Both clocks are monotonic already; a failed read repeats the previous value
/// instead of producing a sentinel that would break ordering downstream.
#[derive(Debug, Default)]
pub struct Stamper {
    last: Timestamps,
}

impl Stamper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamp(&mut self) -> Timestamps {
        let now = Timestamps::new(
            wall_clock().unwrap_or(self.last.wall_clock),
            cpu_clock().unwrap_or(self.last.cpu_clock),
        );
        self.last = self.last.max(now);
        self.last
    }
}
