// DriveMonitor - Logging Transport
//
// Host stand-in for the MQTT client: every publish becomes a log line.

use super::{Topic, Transport};
use crate::error::Result;

/// Always connected.
#[derive(Debug, Default)]
pub struct LogTransport;

impl LogTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for LogTransport {
    fn is_connected(&self) -> bool {
        true
    }

    fn publish(&mut self, topic: Topic, payload: &[u8]) -> Result<()> {
        match topic {
            // Batches are ~10 KB; the size is what matters on a console.
            Topic::Telemetry => {
                log::info!("[{}] qos{} {} bytes", topic, topic.qos(), payload.len())
            }
            _ => log::info!(
                "[{}] qos{} {}",
                topic,
                topic.qos(),
                String::from_utf8_lossy(payload)
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_topic() {
        let mut transport = LogTransport::new();
        assert!(transport.is_connected());
        for topic in [Topic::Alerts, Topic::Telemetry, Topic::Commands, Topic::Status] {
            assert!(transport.publish(topic, br#"{"dev":"host"}"#).is_ok());
        }
    }
}
