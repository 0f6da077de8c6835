// DriveMonitor - Pipeline Data Types
//
// Everything that travels through a queue is defined here: raw samples,
// telemetry batches, alerts and the bidirectional command/status messages.

use std::fmt;

// ---------------------------------------------------------------------------
// Sensor data (3-axis accelerometer reading)
// ---------------------------------------------------------------------------

/// One accelerometer reading. X is lateral, Y longitudinal, Z vertical.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Sample {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// A vehicle at rest: gravity only, on the Z axis.
    pub const fn at_rest() -> Self {
        Self::new(0.0, 0.0, crate::config::GRAVITY_G)
    }

    /// Magnitude of the acceleration with gravity removed from Z.
    pub fn dynamic_magnitude(&self) -> f32 {
        let z_dynamic = self.z - crate::config::GRAVITY_G;
        (self.x * self.x + self.y * self.y + z_dynamic * z_dynamic).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Telemetry batch
// ---------------------------------------------------------------------------

/// A fixed-capacity run of raw samples queued for bulk transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Timestamp (ms since boot) of the first sample.
    pub start_timestamp: u32,
    pub sample_rate_hz: u16,
    /// Number of valid samples, written when the batch is flushed.
    pub sample_count: usize,
    pub samples: Vec<Sample>,
    capacity: usize,
}

impl Batch {
    pub fn new(capacity: usize, sample_rate_hz: u16) -> Self {
        Self {
            start_timestamp: 0,
            sample_rate_hz,
            sample_count: 0,
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdKind {
    Crash,
    Braking,
    Acceleration,
    Cornering,
}

impl ThresholdKind {
    /// Evaluation order of the detector rules.
    pub const ALL: [ThresholdKind; 4] = [
        ThresholdKind::Crash,
        ThresholdKind::Braking,
        ThresholdKind::Acceleration,
        ThresholdKind::Cornering,
    ];

    /// Name used on the wire (`"type"` field of `set_threshold`).
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Crash => "crash",
            Self::Braking => "braking",
            Self::Acceleration => "accel",
            Self::Cornering => "cornering",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "crash" => Some(Self::Crash),
            "braking" => Some(Self::Braking),
            "accel" => Some(Self::Acceleration),
            "cornering" => Some(Self::Cornering),
            _ => None,
        }
    }
}

impl fmt::Display for ThresholdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    Braking,
    Acceleration,
    Cornering,
}

impl WarningKind {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Braking => "harsh_braking",
            Self::Acceleration => "harsh_accel",
            Self::Cornering => "harsh_cornering",
        }
    }
}

/// A classified hazardous-driving event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alert {
    Crash { timestamp: u32, magnitude: f32 },
    Warning { kind: WarningKind, timestamp: u32, x: f32, y: f32 },
}

impl Alert {
    pub fn is_crash(&self) -> bool {
        matches!(self, Alert::Crash { .. })
    }

    pub fn timestamp(&self) -> u32 {
        match *self {
            Alert::Crash { timestamp, .. } | Alert::Warning { timestamp, .. } => timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands and status (bidirectional queue payloads)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetThreshold { kind: ThresholdKind, value: f32 },
    GetStatus,
}

/// Snapshot of all current detector thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusResponse {
    pub crash: f32,
    pub braking: f32,
    pub accel: f32,
    pub cornering: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Command from the dashboard.
    Inbound,
    /// Response/status to the dashboard.
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    Command(Command),
    Status(StatusResponse),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Message {
    pub direction: Direction,
    pub payload: Payload,
}

impl Message {
    pub fn inbound(command: Command) -> Self {
        Self { direction: Direction::Inbound, payload: Payload::Command(command) }
    }

    pub fn outbound(status: StatusResponse) -> Self {
        Self { direction: Direction::Outbound, payload: Payload::Status(status) }
    }
}
