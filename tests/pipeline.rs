// DriveMonitor - Threaded Pipeline
//
// Runs all three tasks on real threads against a scripted sensor and a
// recording transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use drivemonitor::{
    MonitorError, Pipeline, PipelineConfig, Result, Sample, SensorSource, Topic, Transport,
};

/// At rest, with one crash-level jolt on `crash_tick`.
struct JoltSensor {
    tick: u32,
    crash_tick: u32,
}

impl SensorSource for JoltSensor {
    fn read(&mut self) -> Result<Sample> {
        self.tick += 1;
        if self.tick == self.crash_tick {
            Ok(Sample::new(0.0, 0.0, 9.81 + 15.0))
        } else {
            Ok(Sample::at_rest())
        }
    }
}

type Log = Arc<Mutex<Vec<(Topic, Value)>>>;

struct RecordingTransport {
    connected: Arc<AtomicBool>,
    log: Log,
    subscribes: Arc<Mutex<usize>>,
}

impl Transport for RecordingTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn on_connected(&mut self) -> Result<()> {
        *self.subscribes.lock() += 1;
        Ok(())
    }

    fn publish(&mut self, topic: Topic, payload: &[u8]) -> Result<()> {
        let value = serde_json::from_slice(payload)
            .map_err(|e| MonitorError::Publish(e.to_string()))?;
        self.log.lock().push((topic, value));
        Ok(())
    }
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        batch_capacity: 50,
        sample_period: Duration::from_millis(1),
        process_recv_timeout: Duration::from_millis(20),
        dispatch_batch_timeout: Duration::from_millis(20),
        disconnected_backoff: Duration::from_millis(10),
        device_id: "itest".into(),
        ..Default::default()
    }
}

fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn published(log: &Log, topic: Topic) -> Vec<Value> {
    log.lock().iter().filter(|(t, _)| *t == topic).map(|(_, v)| v.clone()).collect()
}

#[test]
fn tasks_deliver_alerts_telemetry_and_status() {
    let pipeline = Pipeline::new(fast_config()).unwrap();
    let log: Log = Arc::default();
    let connected = Arc::new(AtomicBool::new(false));
    let subscribes = Arc::new(Mutex::new(0));
    let transport = RecordingTransport {
        connected: Arc::clone(&connected),
        log: Arc::clone(&log),
        subscribes: Arc::clone(&subscribes),
    };

    let tasks = pipeline.spawn(JoltSensor { tick: 0, crash_tick: 30 }, transport).unwrap();

    // Offline: the crash is detected but nothing leaves the device.
    wait_for("crash alert queued", || pipeline.queues().alerts.count() == 1);
    assert!(log.lock().is_empty());
    assert_eq!(*subscribes.lock(), 0);

    connected.store(true, Ordering::SeqCst);

    // The connect edge asks for a status so the dashboard sees thresholds.
    wait_for("initial status", || !published(&log, Topic::Status).is_empty());
    assert_eq!(*subscribes.lock(), 1);
    let status = &published(&log, Topic::Status)[0];
    assert_eq!(status["dev"], "itest");
    assert_eq!(status["crash"], 8.0);

    wait_for("crash alert", || !published(&log, Topic::Alerts).is_empty());
    let alert = &published(&log, Topic::Alerts)[0];
    assert_eq!(alert["type"], "crash");
    assert_eq!(alert["mag"], 15.0);

    wait_for("telemetry batch", || !published(&log, Topic::Telemetry).is_empty());
    let batch = &published(&log, Topic::Telemetry)[0];
    assert_eq!(batch["n"], 50);
    assert_eq!(batch["rate"], 100);
    assert_eq!(batch["d"].as_array().map(Vec::len), Some(50));

    // Remote retune round-trips through both directions of the bidir queue.
    pipeline
        .command_sink()
        .deliver(br#"{"cmd":"set_threshold","type":"cornering","value":4.5}"#)
        .unwrap();
    wait_for("threshold ack", || {
        published(&log, Topic::Status).iter().any(|s| s["cornering"] == 4.5)
    });
    assert_eq!(pipeline.engine().threshold(drivemonitor::ThresholdKind::Cornering), 4.5);

    tasks.stop();
    tasks.join().unwrap();

    let stats = pipeline.stats().snapshot();
    assert!(stats.samples_produced >= 50);
    assert_eq!(stats.alerts_raised, 1);
    assert!(stats.batches_flushed >= 1);
    assert_eq!(stats.publish_failed, 0);
}

#[test]
fn malformed_commands_never_reach_the_processor() {
    let pipeline = Pipeline::new(fast_config()).unwrap();
    let sink = pipeline.command_sink();

    assert!(matches!(
        sink.deliver(br#"{"cmd":"set_threshold","type":"crash","value":-1}"#),
        Err(MonitorError::MalformedCommand(_))
    ));
    assert!(sink.deliver(b"garbage").is_err());
    assert!(pipeline.queues().bidir.is_empty());
}
