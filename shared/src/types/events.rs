//! Event type definitions for call tracing
//!
//! These types represent the call/return notifications stamped by the
//! publisher and decoded by the observer process.

use serde::{Deserialize, Serialize};

/// Monotonic wall clock reading in seconds
pub type WallClock = f64;

/// Process CPU time reading in seconds
pub type CpuClock = f64;

/// A wall/cpu clock pair taken at the same instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Timestamps {
    pub wall_clock: WallClock,
    pub cpu_clock: CpuClock,
}

impl Timestamps {
    pub fn new(wall_clock: WallClock, cpu_clock: CpuClock) -> Self {
        Self {
            wall_clock,
            cpu_clock,
        }
    }

    /// Component-wise maximum. Used to keep a stamp sequence non-decreasing.
    pub fn max(self, other: Timestamps) -> Timestamps {
        Timestamps {
            wall_clock: self.wall_clock.max(other.wall_clock),
            cpu_clock: self.cpu_clock.max(other.cpu_clock),
        }
    }

    /// True when neither clock is behind `earlier`
    pub fn not_before(&self, earlier: &Timestamps) -> bool {
        self.wall_clock >= earlier.wall_clock && self.cpu_clock >= earlier.cpu_clock
    }
}

/// Method invocation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Intrinsic class (type) name of the receiver
    pub class_name: String,

    /// Invoked method name
    pub method_name: String,

    /// Source file of the invocation. Encoded on the wire as `""` when absent.
    #[serde(with = "sentinel::string")]
    pub source_file: Option<String>,

    /// Source line of the invocation. Encoded on the wire as `0` when absent.
    #[serde(with = "sentinel::line")]
    pub source_line: Option<u32>,

    pub wall_clock: WallClock,
    pub cpu_clock: CpuClock,
}

impl Call {
    /// Build a call event. `Some("")` and `Some(0)` collapse to `None` since
    /// those values are the wire sentinels for an absent location.
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        source_file: Option<String>,
        source_line: Option<u32>,
        stamp: Timestamps,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            source_file: source_file.filter(|f| !f.is_empty()),
            source_line: source_line.filter(|&l| l != 0),
            wall_clock: stamp.wall_clock,
            cpu_clock: stamp.cpu_clock,
        }
    }

    pub fn timestamps(&self) -> Timestamps {
        Timestamps::new(self.wall_clock, self.cpu_clock)
    }
}

/// Method return event. Matches the most recent unmatched [`Call`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Return {
    pub wall_clock: WallClock,
    pub cpu_clock: CpuClock,
}

impl Return {
    pub fn new(stamp: Timestamps) -> Self {
        Self {
            wall_clock: stamp.wall_clock,
            cpu_clock: stamp.cpu_clock,
        }
    }

    pub fn timestamps(&self) -> Timestamps {
        Timestamps::new(self.wall_clock, self.cpu_clock)
    }
}

/// Unified trace event type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Call(Call),
    Return(Return),
}

impl Event {
    /// Get the timestamps of any event type
    pub fn timestamps(&self) -> Timestamps {
        match self {
            Event::Call(c) => c.timestamps(),
            Event::Return(r) => r.timestamps(),
        }
    }

    /// Short kind label, as used by the line format
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Call(_) => "call",
            Event::Return(_) => "return",
        }
    }
}

/// Serde adapters encoding `None` as an agreed sentinel instead of an
/// option tag, so the field layout of a call never changes.
mod sentinel {
    pub mod string {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(value.as_deref().unwrap_or(""))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
            let raw = String::deserialize(d)?;
            Ok(if raw.is_empty() { None } else { Some(raw) })
        }
    }

    pub mod line {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_u32(value.unwrap_or(0))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
            let raw = u32::deserialize(d)?;
            Ok(if raw == 0 { None } else { Some(raw) })
        }
    }
}
