// DriveMonitor - Wire Format
//
// JSON payloads for the dashboard bridge. Every message carries the device
// id. Payloads have fixed ceilings inherited from the firmware's static
// buffers; anything larger is refused with `SerializationOverflow` and the
// dispatcher drops just that message.

use serde::Serialize;

use crate::config::{batch_buffer_size, ALERT_BUFFER_SIZE};
use crate::error::{MonitorError, Result};
use crate::events::{Alert, Batch, StatusResponse};

/// Status payloads are four floats and an id.
pub const STATUS_BUFFER_SIZE: usize = 256;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum AlertJson<'a> {
    Warning {
        dev: &'a str,
        event: &'static str,
        ts: u32,
        x: f64,
        y: f64,
    },
    Crash {
        dev: &'a str,
        ts: u32,
        mag: f64,
    },
}

#[derive(Serialize)]
struct BatchJson<'a> {
    dev: &'a str,
    ts: u32,
    rate: u16,
    n: usize,
    d: Vec<[f64; 3]>,
}

#[derive(Serialize)]
struct StatusJson<'a> {
    dev: &'a str,
    crash: f64,
    braking: f64,
    accel: f64,
    cornering: f64,
}

/// Round to `places` decimals so payload sizes stay predictable.
fn round(value: f32, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value as f64 * scale).round() / scale
}

fn encode<T: Serialize>(value: &T, max: usize) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(value).map_err(|e| MonitorError::Encode(e.to_string()))?;
    if bytes.len() > max {
        return Err(MonitorError::SerializationOverflow { size: bytes.len(), max });
    }
    Ok(bytes)
}

pub fn serialize_alert(device_id: &str, alert: &Alert) -> Result<Vec<u8>> {
    let json = match *alert {
        Alert::Warning { kind, timestamp, x, y } => AlertJson::Warning {
            dev: device_id,
            event: kind.event_name(),
            ts: timestamp,
            x: round(x, 3),
            y: round(y, 3),
        },
        Alert::Crash { timestamp, magnitude } => AlertJson::Crash {
            dev: device_id,
            ts: timestamp,
            mag: round(magnitude, 3),
        },
    };
    encode(&json, ALERT_BUFFER_SIZE)
}

/// Samples go out as `[x, y, z]` triples, header first.
pub fn serialize_batch(device_id: &str, batch: &Batch) -> Result<Vec<u8>> {
    let n = batch.sample_count.min(batch.samples.len());
    let json = BatchJson {
        dev: device_id,
        ts: batch.start_timestamp,
        rate: batch.sample_rate_hz,
        n,
        d: batch.samples[..n]
            .iter()
            .map(|s| [round(s.x, 4), round(s.y, 4), round(s.z, 4)])
            .collect(),
    };
    encode(&json, batch_buffer_size(batch.capacity()))
}

pub fn serialize_status(device_id: &str, status: &StatusResponse) -> Result<Vec<u8>> {
    let json = StatusJson {
        dev: device_id,
        crash: round(status.crash, 3),
        braking: round(status.braking, 3),
        accel: round(status.accel, 3),
        cornering: round(status.cornering, 3),
    };
    encode(&json, STATUS_BUFFER_SIZE)
}
