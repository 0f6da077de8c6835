// DriveMonitor - Dispatcher Task
//
// Lowest priority. While the transport is down it sleeps without touching any
// queue. While up, each iteration forwards in strict order:
//   1. every pending status response
//   2. every pending alert
//   3. at most one telemetry batch (bounded wait)
// Publish and serialization failures are logged and the message dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::events::Command;
use crate::pipeline::Queues;
use crate::stats::PipelineStats;
use crate::transport::{wire, Topic, Transport};

/// What one connected iteration forwarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dispatched {
    pub statuses: usize,
    pub alerts: usize,
    pub batches: usize,
}

pub struct Dispatcher<T> {
    transport: T,
    queues: Arc<Queues>,
    stats: Arc<PipelineStats>,
    device_id: String,
    batch_timeout: Duration,
    backoff: Duration,
    stats_interval: Duration,
    was_connected: bool,
    last_stats: Instant,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(
        transport: T,
        queues: Arc<Queues>,
        stats: Arc<PipelineStats>,
        device_id: String,
        batch_timeout: Duration,
        backoff: Duration,
        stats_interval: Duration,
    ) -> Self {
        Self {
            transport,
            queues,
            stats,
            device_id,
            batch_timeout,
            backoff,
            stats_interval,
            was_connected: false,
            last_stats: Instant::now(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Serialize-then-publish. Either failure drops this one message.
    fn forward(&mut self, topic: Topic, payload: Result<Vec<u8>>) {
        let outcome = payload.and_then(|bytes| self.transport.publish(topic, &bytes));
        match outcome {
            Ok(()) => PipelineStats::bump(&self.stats.publish_ok),
            Err(e) => {
                PipelineStats::bump(&self.stats.publish_failed);
                log::error!("Dropping {} message: {}", topic, e);
            }
        }
    }

    /// Runs once per disconnected -> connected edge: subscribe, then ask the
    /// processor for a status so the dashboard learns the live thresholds.
    fn on_connected(&mut self) {
        log::info!("Transport connected");
        if let Err(e) = self.transport.on_connected() {
            log::error!("Connect hook failed: {}", e);
        }
        if !self.queues.bidir.push_command(Command::GetStatus).ok {
            log::warn!("Failed to queue initial status request");
        }
    }

    /// One connected iteration.
    fn dispatch(&mut self) -> Dispatched {
        let mut sent = Dispatched::default();

        while let Some(status) = self.queues.bidir.pop_status() {
            let payload = wire::serialize_status(&self.device_id, &status);
            self.forward(Topic::Status, payload);
            sent.statuses += 1;
        }

        // Alerts always go out before a batch is even considered.
        while let Some(alert) = self.queues.alerts.pop_front() {
            let payload = wire::serialize_alert(&self.device_id, &alert);
            self.forward(Topic::Alerts, payload);
            sent.alerts += 1;
        }

        if let Some(batch) = self.queues.batches.pop_front_timeout(self.batch_timeout) {
            let payload = wire::serialize_batch(&self.device_id, &batch);
            self.forward(Topic::Telemetry, payload);
            sent.batches += 1;
        }

        sent
    }

    /// One iteration. `None` when the transport was down and the task backed
    /// off instead.
    pub fn step(&mut self) -> Option<Dispatched> {
        let connected = self.transport.is_connected();

        if !connected {
            if self.was_connected {
                log::warn!("Transport disconnected, holding queues");
            }
            self.was_connected = false;
            thread::sleep(self.backoff);
            return None;
        }

        if !self.was_connected {
            self.was_connected = true;
            self.on_connected();
        }
        Some(self.dispatch())
    }

    fn maybe_log_stats(&mut self) {
        if self.last_stats.elapsed() < self.stats_interval {
            return;
        }
        self.last_stats = Instant::now();
        self.stats.log();
        log::info!(
            "Queues: samples {}/{} alerts {}/{} batches {}/{} bidir {}/{}",
            self.queues.samples.count(),
            self.queues.samples.capacity(),
            self.queues.alerts.count(),
            self.queues.alerts.capacity(),
            self.queues.batches.count(),
            self.queues.batches.capacity(),
            self.queues.bidir.len(),
            self.queues.bidir.capacity(),
        );
    }

    pub fn run(mut self, running: Arc<AtomicBool>) {
        log::info!("Dispatcher task started (device {})", self.device_id);

        while running.load(Ordering::Relaxed) {
            self.step();
            self.maybe_log_stats();
        }

        log::info!("Dispatcher task stopped");
    }
}
