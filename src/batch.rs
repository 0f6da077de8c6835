// DriveMonitor - Telemetry Batch Aggregator
//
// Accumulates raw samples into a fixed-size batch and hands the completed
// batch to the telemetry queue. There is no time-based partial flush: a batch
// still filling when the device resets is lost.

use std::sync::Arc;

use crate::clock::Clock;
use crate::events::{Batch, Sample};
use crate::queue::{PushStatus, RingBuffer};

pub struct BatchAggregator {
    current: Batch,
    capacity: usize,
    sample_rate_hz: u16,
    clock: Arc<dyn Clock>,
}

impl BatchAggregator {
    pub fn new(capacity: usize, sample_rate_hz: u16, clock: Arc<dyn Clock>) -> Self {
        Self {
            current: Batch::new(capacity, sample_rate_hz),
            capacity,
            sample_rate_hz,
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples collected since the last flush.
    pub fn pending(&self) -> usize {
        self.current.len()
    }

    /// Append one sample. When this fills the batch, it is moved onto
    /// `telemetry` and a fresh batch started; the push result is returned.
    pub fn add_sample(
        &mut self,
        sample: Sample,
        telemetry: &RingBuffer<Batch>,
    ) -> Option<PushStatus> {
        if self.current.is_empty() {
            self.current.start_timestamp = self.clock.now_ms();
        }
        self.current.samples.push(sample);

        if !self.current.is_full() {
            return None;
        }

        let mut batch = std::mem::replace(
            &mut self.current,
            Batch::new(self.capacity, self.sample_rate_hz),
        );
        batch.sample_count = batch.len();
        let start = batch.start_timestamp;

        let status = telemetry.push_back(batch);
        if !status.ok {
            log::warn!("batch queue: failed to queue telemetry batch (ts {})", start);
        } else if status.was_full {
            log::warn!("batch queue: full, oldest telemetry batch dropped");
        } else {
            log::debug!("Telemetry batch queued (ts {}, {} samples)", start, self.capacity);
        }
        Some(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::queue::OverflowPolicy;

    fn sample(i: usize) -> Sample {
        Sample::new(i as f32, 0.0, 9.81)
    }

    #[test]
    fn flushes_exactly_at_capacity() {
        let clock = Arc::new(ManualClock::new(500));
        let mut agg = BatchAggregator::new(500, 100, clock.clone());
        let telemetry = RingBuffer::new(3, OverflowPolicy::DropOldest);

        for i in 0..499 {
            assert_eq!(agg.add_sample(sample(i), &telemetry), None);
            clock.advance(10);
        }
        assert!(telemetry.is_empty());
        assert_eq!(agg.pending(), 499);

        let flushed = agg.add_sample(sample(499), &telemetry);
        assert_eq!(flushed, Some(PushStatus { ok: true, was_full: false }));
        assert_eq!(agg.pending(), 0);

        let batch = telemetry.pop_front().unwrap();
        assert_eq!(batch.sample_count, 500);
        assert_eq!(batch.start_timestamp, 500);
        assert_eq!(batch.sample_rate_hz, 100);
        assert_eq!(batch.samples[0], sample(0));
        assert_eq!(batch.samples[499], sample(499));
        assert!(telemetry.is_empty());
    }

    #[test]
    fn next_batch_restamps_on_its_first_sample() {
        let clock = Arc::new(ManualClock::new(0));
        let mut agg = BatchAggregator::new(2, 100, clock.clone());
        let telemetry = RingBuffer::new(3, OverflowPolicy::DropOldest);

        for i in 0..4 {
            clock.set(i as u32 * 100);
            let _ = agg.add_sample(sample(i), &telemetry);
        }

        let first = telemetry.pop_front().unwrap();
        let second = telemetry.pop_front().unwrap();
        assert_eq!(first.start_timestamp, 0);
        assert_eq!(second.start_timestamp, 200);
        assert_eq!(second.samples, vec![sample(2), sample(3)]);
    }

    #[test]
    fn full_telemetry_queue_reports_without_blocking() {
        let clock = Arc::new(ManualClock::new(0));
        let mut agg = BatchAggregator::new(1, 100, clock);
        let telemetry = RingBuffer::new(1, OverflowPolicy::DropNewest);

        assert!(agg.add_sample(sample(0), &telemetry).unwrap().ok);
        let rejected = agg.add_sample(sample(1), &telemetry).unwrap();
        assert_eq!(rejected, PushStatus { ok: false, was_full: true });
        assert_eq!(telemetry.pop_front().unwrap().samples, vec![sample(0)]);
        assert_eq!(agg.pending(), 0);
    }
}
