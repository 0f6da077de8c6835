// DriveMonitor - Producer Task
//
// Reads one accelerometer sample per period and pushes it onto the sample
// queue without waiting. A full queue or a lock timeout drops the sample.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::drivers::SensorSource;
use crate::events::Sample;
use crate::pipeline::Queues;
use crate::queue::PushStatus;
use crate::stats::PipelineStats;

pub struct Producer<S> {
    sensor: S,
    queues: Arc<Queues>,
    stats: Arc<PipelineStats>,
    period: Duration,
    last_good: Sample,
}

impl<S: SensorSource> Producer<S> {
    pub fn new(
        sensor: S,
        queues: Arc<Queues>,
        stats: Arc<PipelineStats>,
        period: Duration,
    ) -> Self {
        Self {
            sensor,
            queues,
            stats,
            period,
            last_good: Sample::at_rest(),
        }
    }

    /// Read the sensor, falling back to the previous good sample (or a
    /// vehicle at rest) when the read fails.
    fn read(&mut self) -> Sample {
        match self.sensor.read() {
            Ok(sample) => {
                self.last_good = sample;
                sample
            }
            Err(e) => {
                PipelineStats::bump(&self.stats.sensor_errors);
                log::warn!("IMU read error: {}, reusing last sample", e);
                self.last_good
            }
        }
    }

    /// One tick: read and enqueue.
    pub fn step(&mut self) -> PushStatus {
        let sample = self.read();
        let status = self.queues.samples.push_back(sample);

        if status.ok {
            PipelineStats::bump(&self.stats.samples_produced);
            if status.was_full {
                PipelineStats::bump(&self.stats.samples_dropped);
                log::warn!("Sensor queue full, dropped oldest sample");
            }
        } else {
            PipelineStats::bump(&self.stats.samples_dropped);
            if status.was_full {
                log::warn!("Sensor queue full, dropping sample");
            } else {
                log::warn!("Sensor queue busy, dropping sample");
            }
        }
        status
    }

    pub fn run(mut self, running: Arc<AtomicBool>) {
        log::info!("Producer task started (interval: {} ms)", self.period.as_millis());

        while running.load(Ordering::Relaxed) {
            let tick_start = Instant::now();

            let _ = self.step();

            // Sleep for the remainder of the period to hold the sample rate.
            let elapsed = tick_start.elapsed();
            if elapsed < self.period {
                thread::sleep(self.period - elapsed);
            }
        }

        log::info!("Producer task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::error::{MonitorError, Result};
    use crate::queue::OverflowPolicy;

    struct Scripted(Vec<Result<Sample>>);

    impl SensorSource for Scripted {
        fn read(&mut self) -> Result<Sample> {
            self.0.remove(0)
        }
    }

    fn producer(
        script: Vec<Result<Sample>>,
        config: &PipelineConfig,
    ) -> (Producer<Scripted>, Arc<Queues>, Arc<PipelineStats>) {
        let queues = Arc::new(Queues::new(config));
        let stats = Arc::new(PipelineStats::new());
        let p = Producer::new(
            Scripted(script),
            Arc::clone(&queues),
            Arc::clone(&stats),
            config.sample_period,
        );
        (p, queues, stats)
    }

    #[test]
    fn failed_read_reuses_last_good_sample() {
        let good = Sample::new(0.5, -0.5, 9.81);
        let script = vec![
            Err(MonitorError::SensorRead("nack".into())),
            Ok(good),
            Err(MonitorError::SensorRead("nack".into())),
        ];
        let (mut p, queues, stats) = producer(script, &PipelineConfig::default());

        for _ in 0..3 {
            assert!(p.step().ok);
        }

        assert_eq!(queues.samples.snapshot(), vec![Sample::at_rest(), good, good]);
        assert_eq!(stats.snapshot().sensor_errors, 2);
        assert_eq!(stats.snapshot().samples_produced, 3);
    }

    #[test]
    fn full_queue_drops_incoming_sample() {
        let config = PipelineConfig {
            sample_queue_size: 1,
            sample_policy: OverflowPolicy::DropNewest,
            ..Default::default()
        };
        let first = Sample::new(1.0, 0.0, 9.81);
        let second = Sample::new(2.0, 0.0, 9.81);
        let (mut p, queues, stats) = producer(vec![Ok(first), Ok(second)], &config);

        assert!(p.step().ok);
        let rejected = p.step();
        assert!(!rejected.ok && rejected.was_full);

        assert_eq!(queues.samples.pop_front(), Some(first));
        assert_eq!(stats.snapshot().samples_dropped, 1);
    }
}
