// DriveMonitor - Dashboard Command Parsing
//
// Raw payloads from the commands topic are validated here, before anything
// reaches the bidirectional queue. Accepted forms:
//
//   {"cmd":"get_status"}
//   {"cmd":"set_threshold","type":"crash|braking|accel|cornering","value":9.5}

use std::sync::Arc;

use serde::Deserialize;

use crate::config::{validate_threshold, COMMAND_BUFFER_SIZE};
use crate::error::{MonitorError, Result};
use crate::events::{Command, ThresholdKind};
use crate::queue::BidirectionalQueue;

#[derive(Deserialize)]
struct RawCommand {
    cmd: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    value: Option<f32>,
}

fn malformed(reason: impl Into<String>) -> MonitorError {
    MonitorError::MalformedCommand(reason.into())
}

pub fn parse_command(data: &[u8]) -> Result<Command> {
    if data.len() >= COMMAND_BUFFER_SIZE {
        return Err(malformed(format!("command too large: {} bytes", data.len())));
    }

    let raw: RawCommand =
        serde_json::from_slice(data).map_err(|e| malformed(format!("bad JSON: {e}")))?;

    match raw.cmd.as_str() {
        "get_status" => Ok(Command::GetStatus),
        "set_threshold" => {
            let (Some(kind), Some(value)) = (raw.kind, raw.value) else {
                return Err(malformed("set_threshold missing type or value"));
            };
            let kind = ThresholdKind::from_wire_name(&kind)
                .ok_or_else(|| malformed(format!("unknown threshold type: {kind}")))?;
            validate_threshold(kind, value)
                .map_err(|_| malformed(format!("{kind} threshold must be positive, got {value}")))?;
            Ok(Command::SetThreshold { kind, value })
        }
        other => Err(malformed(format!("unknown command: {other}"))),
    }
}

/// Entry point for command sources: parses raw payloads and queues the
/// result on the inbound side.
#[derive(Clone)]
pub struct CommandSink {
    bidir: Arc<BidirectionalQueue>,
}

impl CommandSink {
    pub fn new(bidir: Arc<BidirectionalQueue>) -> Self {
        Self { bidir }
    }

    /// Queue an already-parsed command.
    pub fn submit(&self, command: Command) -> Result<()> {
        let was_full = self.bidir.push_command(command).into_result()?;
        if was_full {
            log::warn!("Command queue full, overwrote oldest message");
        }
        log::info!("Command queued: {:?}", command);
        Ok(())
    }

    /// Parse and queue a raw payload. Malformed input never reaches the queue.
    pub fn deliver(&self, data: &[u8]) -> Result<()> {
        parse_command(data).and_then(|command| self.submit(command)).map_err(|e| {
            if e.is_transient() {
                log::warn!("Command queue busy, command dropped: {}", e);
            } else {
                log::warn!("Rejected command: {}", e);
            }
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Direction;

    #[test]
    fn parses_both_commands() {
        assert_eq!(parse_command(br#"{"cmd":"get_status"}"#), Ok(Command::GetStatus));
        assert_eq!(
            parse_command(br#"{"cmd":"set_threshold","type":"braking","value":5.0}"#),
            Ok(Command::SetThreshold { kind: ThresholdKind::Braking, value: 5.0 })
        );
        assert_eq!(
            parse_command(br#"{"cmd":"set_threshold","type":"accel","value":3}"#),
            Ok(Command::SetThreshold { kind: ThresholdKind::Acceleration, value: 3.0 })
        );
    }

    #[test]
    fn rejects_malformed_input() {
        let cases: [&[u8]; 7] = [
            b"not json",
            br#"{"value":1.0}"#,
            br#"{"cmd":"reboot"}"#,
            br#"{"cmd":"set_threshold","type":"crash"}"#,
            br#"{"cmd":"set_threshold","type":"lateral","value":1.0}"#,
            br#"{"cmd":"set_threshold","type":"crash","value":-2.0}"#,
            br#"{"cmd":"set_threshold","type":"crash","value":0}"#,
        ];
        for case in cases {
            assert!(
                matches!(parse_command(case), Err(MonitorError::MalformedCommand(_))),
                "accepted {:?}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[test]
    fn rejects_oversized_payload() {
        let pad = "x".repeat(COMMAND_BUFFER_SIZE);
        let padded = format!(r#"{{"cmd":"get_status","pad":"{pad}"}}"#);
        assert!(matches!(
            parse_command(padded.as_bytes()),
            Err(MonitorError::MalformedCommand(_))
        ));
    }

    #[test]
    fn sink_queues_only_valid_commands() {
        let bidir = Arc::new(BidirectionalQueue::new(4));
        let sink = CommandSink::new(Arc::clone(&bidir));

        assert!(sink.deliver(br#"{"cmd":"get_status"}"#).is_ok());
        assert!(sink.deliver(b"{").is_err());
        assert_eq!(bidir.count(Direction::Inbound), 1);
        assert_eq!(bidir.pop_command(), Some(Command::GetStatus));
    }
}
