// DriveMonitor - MQTT Transport
//
// Wraps the ESP-IDF MQTT client. The client's event callback runs on the
// MQTT task: it tracks connectivity and feeds commands-topic payloads
// straight into the command sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

use super::{CommandSink, Topic, Transport};
use crate::error::{MonitorError, Result};

pub struct MqttTransport {
    client: EspMqttClient<'static>,
    connected: Arc<AtomicBool>,
}

fn qos(topic: Topic) -> QoS {
    match topic.qos() {
        0 => QoS::AtMostOnce,
        _ => QoS::AtLeastOnce,
    }
}

impl MqttTransport {
    pub fn connect(broker_uri: &str, client_id: &str, sink: CommandSink) -> anyhow::Result<Self> {
        let connected = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&connected);

        let config = MqttClientConfiguration {
            client_id: Some(client_id),
            ..Default::default()
        };

        let client = EspMqttClient::new_cb(broker_uri, &config, move |event| match event.payload() {
            EventPayload::Connected(_) => {
                log::info!("MQTT connected");
                flag.store(true, Ordering::SeqCst);
            }
            EventPayload::Disconnected => {
                log::warn!("MQTT disconnected");
                flag.store(false, Ordering::SeqCst);
            }
            // Continuation chunks carry no topic; commands always fit in one.
            EventPayload::Received { topic: Some(topic), data, .. }
                if Topic::from_name(topic) == Some(Topic::Commands) =>
            {
                // Rejections are already logged by the sink.
                let _ = sink.deliver(data);
            }
            EventPayload::Error(e) => log::error!("MQTT error: {:?}", e),
            _ => {}
        })?;

        log::info!("MQTT client started ({})", broker_uri);
        Ok(Self { client, connected })
    }
}

impl Transport for MqttTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn on_connected(&mut self) -> Result<()> {
        let topic = Topic::Commands;
        self.client
            .subscribe(topic.name(), qos(topic))
            .map_err(|e| MonitorError::Publish(format!("subscribe {}: {}", topic, e)))?;
        log::info!("Subscribed to {}", topic);
        Ok(())
    }

    fn publish(&mut self, topic: Topic, payload: &[u8]) -> Result<()> {
        self.client
            .publish(topic.name(), qos(topic), false, payload)
            .map(|_| ())
            .map_err(|e| MonitorError::Publish(e.to_string()))
    }
}
