// DriveMonitor - Pipeline Statistics
//
// Lock-free counters bumped by every task and logged periodically by the
// dispatcher.

use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub samples_produced: AtomicU32,
    pub samples_dropped: AtomicU32,
    pub sensor_errors: AtomicU32,
    pub alerts_raised: AtomicU32,
    pub alerts_evicted: AtomicU32,
    pub alerts_dropped: AtomicU32,
    pub batches_flushed: AtomicU32,
    pub batches_dropped: AtomicU32,
    pub commands_applied: AtomicU32,
    pub publish_ok: AtomicU32,
    pub publish_failed: AtomicU32,
}

/// Plain copy of the counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub samples_produced: u32,
    pub samples_dropped: u32,
    pub sensor_errors: u32,
    pub alerts_raised: u32,
    pub alerts_evicted: u32,
    pub alerts_dropped: u32,
    pub batches_flushed: u32,
    pub batches_dropped: u32,
    pub commands_applied: u32,
    pub publish_ok: u32,
    pub publish_failed: u32,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU32, n: usize) {
        if n > 0 {
            counter.fetch_add(n as u32, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU32| c.load(Ordering::Relaxed);
        StatsSnapshot {
            samples_produced: get(&self.samples_produced),
            samples_dropped: get(&self.samples_dropped),
            sensor_errors: get(&self.sensor_errors),
            alerts_raised: get(&self.alerts_raised),
            alerts_evicted: get(&self.alerts_evicted),
            alerts_dropped: get(&self.alerts_dropped),
            batches_flushed: get(&self.batches_flushed),
            batches_dropped: get(&self.batches_dropped),
            commands_applied: get(&self.commands_applied),
            publish_ok: get(&self.publish_ok),
            publish_failed: get(&self.publish_failed),
        }
    }

    pub fn log(&self) {
        let s = self.snapshot();
        log::info!(
            "Stats: samples {} (dropped {}, sensor errors {}), alerts {} (evicted {}, dropped {}), \
             batches {} (dropped {}), commands {}, publish ok {} / failed {}",
            s.samples_produced,
            s.samples_dropped,
            s.sensor_errors,
            s.alerts_raised,
            s.alerts_evicted,
            s.alerts_dropped,
            s.batches_flushed,
            s.batches_dropped,
            s.commands_applied,
            s.publish_ok,
            s.publish_failed,
        );
    }
}
