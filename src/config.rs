// DriveMonitor - System Configuration
//
// Compile-time defaults live here as constants. The runtime structs below are
// built from them and handed to the pipeline at construction time, so tests
// and alternative boards can size queues or tune thresholds without a rebuild.

use std::time::Duration;

use crate::error::{MonitorError, Result};
use crate::events::ThresholdKind;
use crate::queue::{EvictionPolicy, OverflowPolicy};

// ---------------------------------------------------------------------------
// Device identity
// ---------------------------------------------------------------------------
pub const DEVICE_NAME: &str = "DriveMonitor";

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------
pub const IMU_SAMPLE_RATE_HZ: u16 = 100;
pub const SENSOR_INTERVAL_MS: u64 = 1000 / IMU_SAMPLE_RATE_HZ as u64; // 10 ms

/// Standard gravity, subtracted from the Z axis to get dynamic acceleration.
pub const GRAVITY_G: f32 = 9.81;

// ---------------------------------------------------------------------------
// I2C / MPU6050
// ---------------------------------------------------------------------------
pub const I2C_ADDR_MPU6050: u8 = 0x68;
pub const I2C_BAUDRATE_HZ: u32 = 400_000;
pub const I2C_TIMEOUT_TICKS: u32 = 1000;
pub const PIN_I2C_SDA: i32 = 26;
pub const PIN_I2C_SCL: i32 = 25;
/// LSB per g at the ±2 g range.
pub const ACCEL_SCALE_2G: f32 = 16384.0;

// ---------------------------------------------------------------------------
// Queue sizes (items)
// ---------------------------------------------------------------------------
pub const SAMPLE_QUEUE_SIZE: usize = 10;
pub const ALERT_QUEUE_SIZE: usize = 20;
pub const BATCH_QUEUE_SIZE: usize = 3;
pub const BIDIR_QUEUE_SIZE: usize = 10;
pub const LOG_BATCH_SIZE: usize = 500;

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const QUEUE_LOCK_TIMEOUT_MS: u64 = 100;
pub const PROCESS_RECV_TIMEOUT_MS: u64 = 100;
pub const DISPATCH_BATCH_TIMEOUT_MS: u64 = 1000;
pub const DISCONNECTED_BACKOFF_MS: u64 = 1000;
pub const STATS_INTERVAL_MS: u64 = 5000;

// ---------------------------------------------------------------------------
// Detector thresholds (g)
// ---------------------------------------------------------------------------
pub const DEFAULT_CRASH_THRESHOLD_G: f32 = 8.0;
pub const DEFAULT_HARSH_BRAKING_THRESHOLD_G: f32 = 9.0;
pub const DEFAULT_HARSH_ACCEL_THRESHOLD_G: f32 = 7.0;
pub const DEFAULT_HARSH_CORNERING_THRESHOLD_G: f32 = 8.0;

// ---------------------------------------------------------------------------
// Task stack sizes (bytes) and priorities (FreeRTOS, higher runs first)
// ---------------------------------------------------------------------------
pub const STACK_PRODUCER: usize = 4096;
pub const STACK_PROCESSOR: usize = 8192;
pub const STACK_DISPATCHER: usize = 16384; // batch JSON is built on this stack

pub const PRIORITY_PRODUCER: u8 = 5;
pub const PRIORITY_PROCESSOR: u8 = 4;
pub const PRIORITY_DISPATCHER: u8 = 2;

// ---------------------------------------------------------------------------
// MQTT
// ---------------------------------------------------------------------------
pub const MQTT_BROKER_URI: &str = "mqtt://alderaan.software-engineering.ie:1883";
pub const MQTT_TOPIC_ALERTS: &str = "driving/alerts";
pub const MQTT_TOPIC_TELEMETRY: &str = "driving/telemetry";
pub const MQTT_TOPIC_COMMANDS: &str = "driving/commands";
pub const MQTT_TOPIC_STATUS: &str = "driving/status";

/// Largest accepted raw command payload (bytes).
pub const COMMAND_BUFFER_SIZE: usize = 128;
/// Serialized alert ceiling (bytes).
pub const ALERT_BUFFER_SIZE: usize = 256;

/// Serialized batch ceiling: ~50 byte header plus ~35 bytes per sample.
pub const fn batch_buffer_size(batch_capacity: usize) -> usize {
    50 + batch_capacity * 35
}

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Detector thresholds in g. All four must be positive and finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub crash: f32,
    pub braking: f32,
    pub accel: f32,
    pub cornering: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            crash: DEFAULT_CRASH_THRESHOLD_G,
            braking: DEFAULT_HARSH_BRAKING_THRESHOLD_G,
            accel: DEFAULT_HARSH_ACCEL_THRESHOLD_G,
            cornering: DEFAULT_HARSH_CORNERING_THRESHOLD_G,
        }
    }
}

impl Thresholds {
    pub fn get(&self, kind: ThresholdKind) -> f32 {
        match kind {
            ThresholdKind::Crash => self.crash,
            ThresholdKind::Braking => self.braking,
            ThresholdKind::Acceleration => self.accel,
            ThresholdKind::Cornering => self.cornering,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for kind in ThresholdKind::ALL {
            validate_threshold(kind, self.get(kind))?;
        }
        Ok(())
    }
}

/// Reject zero, negative, NaN and infinite thresholds.
pub fn validate_threshold(kind: ThresholdKind, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MonitorError::InvalidThreshold { kind, value })
    }
}

/// Queue sizing and timing for one pipeline instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub sample_queue_size: usize,
    pub alert_queue_size: usize,
    pub batch_queue_size: usize,
    pub bidir_queue_size: usize,
    pub batch_capacity: usize,
    pub sample_rate_hz: u16,

    pub sample_policy: OverflowPolicy,
    pub alert_policy: OverflowPolicy,
    pub batch_policy: OverflowPolicy,
    pub bidir_eviction: EvictionPolicy,

    pub sample_period: Duration,
    pub lock_timeout: Duration,
    pub process_recv_timeout: Duration,
    pub dispatch_batch_timeout: Duration,
    pub disconnected_backoff: Duration,
    pub stats_interval: Duration,

    pub thresholds: Thresholds,
    pub device_id: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_queue_size: SAMPLE_QUEUE_SIZE,
            alert_queue_size: ALERT_QUEUE_SIZE,
            batch_queue_size: BATCH_QUEUE_SIZE,
            bidir_queue_size: BIDIR_QUEUE_SIZE,
            batch_capacity: LOG_BATCH_SIZE,
            sample_rate_hz: IMU_SAMPLE_RATE_HZ,

            // The producer must never wait; late samples are the ones to lose.
            sample_policy: OverflowPolicy::DropNewest,
            alert_policy: OverflowPolicy::DropOldest,
            batch_policy: OverflowPolicy::DropOldest,
            bidir_eviction: EvictionPolicy::SameDirectionFirst,

            sample_period: Duration::from_millis(SENSOR_INTERVAL_MS),
            lock_timeout: Duration::from_millis(QUEUE_LOCK_TIMEOUT_MS),
            process_recv_timeout: Duration::from_millis(PROCESS_RECV_TIMEOUT_MS),
            dispatch_batch_timeout: Duration::from_millis(DISPATCH_BATCH_TIMEOUT_MS),
            disconnected_backoff: Duration::from_millis(DISCONNECTED_BACKOFF_MS),
            stats_interval: Duration::from_millis(STATS_INTERVAL_MS),

            thresholds: Thresholds::default(),
            device_id: DEVICE_NAME.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("sample_queue_size", self.sample_queue_size),
            ("alert_queue_size", self.alert_queue_size),
            ("batch_queue_size", self.batch_queue_size),
            ("bidir_queue_size", self.bidir_queue_size),
            ("batch_capacity", self.batch_capacity),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(MonitorError::InvalidConfig(format!("{name} must be non-zero")));
            }
        }
        if self.sample_rate_hz == 0 {
            return Err(MonitorError::InvalidConfig("sample_rate_hz must be non-zero".into()));
        }
        if self.device_id.is_empty() {
            return Err(MonitorError::InvalidConfig("device_id must not be empty".into()));
        }
        self.thresholds.validate()
    }
}
