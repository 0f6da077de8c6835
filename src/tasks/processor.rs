// DriveMonitor - Processor Task
//
// Each iteration drains every pending command first, so a threshold change
// applies to the very next sample, then waits a bounded time for one sample
// and runs it through the detectors and the batch aggregator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::batch::BatchAggregator;
use crate::detector::DetectorEngine;
use crate::events::Command;
use crate::pipeline::Queues;
use crate::stats::PipelineStats;

pub struct Processor {
    queues: Arc<Queues>,
    engine: Arc<DetectorEngine>,
    aggregator: BatchAggregator,
    stats: Arc<PipelineStats>,
    recv_timeout: Duration,
}

impl Processor {
    pub fn new(
        queues: Arc<Queues>,
        engine: Arc<DetectorEngine>,
        aggregator: BatchAggregator,
        stats: Arc<PipelineStats>,
        recv_timeout: Duration,
    ) -> Self {
        Self { queues, engine, aggregator, stats, recv_timeout }
    }

    /// Samples accumulated toward the next telemetry batch.
    pub fn pending_batch_samples(&self) -> usize {
        self.aggregator.pending()
    }

    fn publish_status(&self) {
        let status = self.queues.bidir.push_status(self.engine.status());
        if !status.ok {
            log::warn!("Failed to queue status response");
        } else if status.was_full {
            log::warn!("Command queue full, oldest message overwritten by status response");
        }
    }

    /// Apply one command. Every command, applied or not, is answered with
    /// the current thresholds.
    pub fn handle_command(&self, command: Command) {
        match command {
            Command::SetThreshold { kind, value } => {
                if let Err(e) = self.engine.set_threshold(kind, value) {
                    log::warn!("Command rejected: {}", e);
                } else {
                    PipelineStats::bump(&self.stats.commands_applied);
                }
            }
            Command::GetStatus => {
                log::info!("Status requested");
                PipelineStats::bump(&self.stats.commands_applied);
            }
        }
        self.publish_status();
    }

    /// Handle every inbound command currently queued. Returns how many.
    pub fn drain_commands(&self) -> usize {
        let mut handled = 0;
        while let Some(command) = self.queues.bidir.pop_command() {
            self.handle_command(command);
            handled += 1;
        }
        handled
    }

    /// One iteration. Returns whether a sample was processed.
    pub fn step(&mut self) -> bool {
        self.drain_commands();

        let Some(sample) = self.queues.samples.pop_front_timeout(self.recv_timeout) else {
            return false;
        };
        log::trace!("Sample x={:.2} y={:.2} z={:.2}", sample.x, sample.y, sample.z);

        let outcome = self.engine.evaluate(&sample, &self.queues.alerts);
        PipelineStats::add(&self.stats.alerts_raised, outcome.raised);
        PipelineStats::add(&self.stats.alerts_evicted, outcome.evicted);
        PipelineStats::add(&self.stats.alerts_dropped, outcome.dropped);

        if let Some(status) = self.aggregator.add_sample(sample, &self.queues.batches) {
            if status.ok {
                PipelineStats::bump(&self.stats.batches_flushed);
            }
            if !status.ok || status.was_full {
                PipelineStats::bump(&self.stats.batches_dropped);
            }
        }
        true
    }

    pub fn run(mut self, running: Arc<AtomicBool>) {
        log::info!("Processor task started");

        while running.load(Ordering::Relaxed) {
            self.step();
        }

        log::info!("Processor task stopped ({} samples unbatched)", self.aggregator.pending());
    }
}
