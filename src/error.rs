// DriveMonitor - Error Types
//
// Nothing in the pipeline escalates these: every context logs the error and
// carries on with its next iteration.

use thiserror::Error;

use crate::events::ThresholdKind;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// Push rejected by a `DropNewest` queue at capacity.
    #[error("queue full, item discarded")]
    QueueFull,

    /// Queue lock not acquired within its bounded wait. Retry next cycle.
    #[error("queue lock timed out")]
    LockTimeout,

    #[error("sensor read failed: {0}")]
    SensorRead(String),

    #[error("serialized payload too large: {size} bytes exceeds maximum {max}")]
    SerializationOverflow { size: usize, max: usize },

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid {kind} threshold: {value}")]
    InvalidThreshold { kind: ThresholdKind, value: f32 },
}

impl MonitorError {
    /// Transient conditions that simply mean "try again next iteration".
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout | Self::QueueFull)
    }
}
