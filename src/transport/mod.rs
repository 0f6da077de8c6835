// DriveMonitor - Transport Boundary
//
// The dispatcher only knows this trait: a connectivity flag and a publish
// call per topic. MQTT on the device, a logger on the host.

pub mod commands;
pub mod console;
#[cfg(target_os = "espidf")]
pub mod mqtt;
pub mod wire;

use std::fmt;

use crate::config::{
    MQTT_TOPIC_ALERTS, MQTT_TOPIC_COMMANDS, MQTT_TOPIC_STATUS, MQTT_TOPIC_TELEMETRY,
};
use crate::error::Result;

pub use commands::{parse_command, CommandSink};
pub use console::LogTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Alerts,
    Telemetry,
    Commands,
    Status,
}

impl Topic {
    pub fn name(&self) -> &'static str {
        match self {
            Topic::Alerts => MQTT_TOPIC_ALERTS,
            Topic::Telemetry => MQTT_TOPIC_TELEMETRY,
            Topic::Commands => MQTT_TOPIC_COMMANDS,
            Topic::Status => MQTT_TOPIC_STATUS,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Topic::Alerts, Topic::Telemetry, Topic::Commands, Topic::Status]
            .into_iter()
            .find(|t| t.name() == name)
    }

    /// MQTT QoS level. Telemetry is fire-and-forget, everything else at
    /// least once.
    pub fn qos(&self) -> u8 {
        match self {
            Topic::Telemetry => 0,
            Topic::Alerts | Topic::Commands | Topic::Status => 1,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Transport: Send {
    /// Read at the top of every dispatcher iteration.
    fn is_connected(&self) -> bool;

    /// Hook run once on each disconnected -> connected transition.
    fn on_connected(&mut self) -> Result<()> {
        Ok(())
    }

    /// Forward one serialized payload. Failures are logged by the caller and
    /// never retried.
    fn publish(&mut self, topic: Topic, payload: &[u8]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_resolve_exactly() {
        assert_eq!(Topic::from_name("driving/commands"), Some(Topic::Commands));
        assert_eq!(Topic::from_name(MQTT_TOPIC_TELEMETRY), Some(Topic::Telemetry));
        assert_eq!(Topic::from_name("driving/commands/extra"), None);
        assert_eq!(Topic::from_name(""), None);
    }

    #[test]
    fn only_telemetry_is_fire_and_forget() {
        assert_eq!(Topic::Telemetry.qos(), 0);
        assert_eq!(Topic::Alerts.qos(), 1);
        assert_eq!(Topic::Commands.qos(), 1);
        assert_eq!(Topic::Status.qos(), 1);
    }
}
