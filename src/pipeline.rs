// DriveMonitor - Pipeline Assembly
//
// Builds every queue and the detector engine once, then hands explicit
// handles to each task. Nothing is reachable through globals.
//
//   SensorSource -> samples -> Processor -> alerts / batches -> Dispatcher -> Transport
//   CommandSink  -> bidir (inbound) -> Processor -> bidir (outbound) -> Dispatcher

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::anyhow;

use crate::batch::BatchAggregator;
use crate::clock::{Clock, SystemClock};
use crate::config::*;
use crate::detector::DetectorEngine;
use crate::drivers::SensorSource;
use crate::error::Result;
use crate::events::{Alert, Batch, Sample};
use crate::queue::{BidirectionalQueue, RingBuffer};
use crate::stats::PipelineStats;
use crate::tasks::{Dispatcher, Processor, Producer};
use crate::transport::{CommandSink, Transport};

/// Host threads need more headroom than the FreeRTOS task budgets.
#[cfg(not(target_os = "espidf"))]
const HOST_MIN_STACK: usize = 64 * 1024;

/// Every queue the tasks share.
pub struct Queues {
    pub samples: RingBuffer<Sample>,
    pub alerts: RingBuffer<Alert>,
    pub batches: RingBuffer<Batch>,
    pub bidir: Arc<BidirectionalQueue>,
}

impl Queues {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            samples: RingBuffer::new(config.sample_queue_size, config.sample_policy)
                .named("sample_queue")
                .with_lock_timeout(config.lock_timeout),
            alerts: RingBuffer::new(config.alert_queue_size, config.alert_policy)
                .named("alert_queue")
                .with_lock_timeout(config.lock_timeout),
            batches: RingBuffer::new(config.batch_queue_size, config.batch_policy)
                .named("batch_queue")
                .with_lock_timeout(config.lock_timeout),
            bidir: Arc::new(
                BidirectionalQueue::new(config.bidir_queue_size)
                    .with_eviction(config.bidir_eviction)
                    .with_lock_timeout(config.lock_timeout),
            ),
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    queues: Arc<Queues>,
    engine: Arc<DetectorEngine>,
    stats: Arc<PipelineStats>,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: PipelineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let queues = Arc::new(Queues::new(&config));
        let engine = Arc::new(DetectorEngine::new(config.thresholds, Arc::clone(&clock)));
        log::info!(
            "Pipeline ready: samples {} alerts {} batches {}x{} bidir {}",
            config.sample_queue_size,
            config.alert_queue_size,
            config.batch_queue_size,
            config.batch_capacity,
            config.bidir_queue_size
        );

        Ok(Self {
            config,
            queues,
            engine,
            stats: Arc::new(PipelineStats::new()),
            clock,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn queues(&self) -> &Arc<Queues> {
        &self.queues
    }

    pub fn engine(&self) -> &Arc<DetectorEngine> {
        &self.engine
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Inbound command entry point for MQTT callbacks, consoles and tests.
    pub fn command_sink(&self) -> CommandSink {
        CommandSink::new(Arc::clone(&self.queues.bidir))
    }

    pub fn producer<S: SensorSource>(&self, sensor: S) -> Producer<S> {
        Producer::new(
            sensor,
            Arc::clone(&self.queues),
            Arc::clone(&self.stats),
            self.config.sample_period,
        )
    }

    pub fn processor(&self) -> Processor {
        let aggregator = BatchAggregator::new(
            self.config.batch_capacity,
            self.config.sample_rate_hz,
            Arc::clone(&self.clock),
        );
        Processor::new(
            Arc::clone(&self.queues),
            Arc::clone(&self.engine),
            aggregator,
            Arc::clone(&self.stats),
            self.config.process_recv_timeout,
        )
    }

    pub fn dispatcher<T: Transport>(&self, transport: T) -> Dispatcher<T> {
        Dispatcher::new(
            transport,
            Arc::clone(&self.queues),
            Arc::clone(&self.stats),
            self.config.device_id.clone(),
            self.config.dispatch_batch_timeout,
            self.config.disconnected_backoff,
            self.config.stats_interval,
        )
    }

    /// Start the three tasks, highest priority first.
    pub fn spawn<S, T>(&self, sensor: S, transport: T) -> anyhow::Result<PipelineHandle>
    where
        S: SensorSource + 'static,
        T: Transport + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let mut handle = PipelineHandle { running: Arc::clone(&running), threads: Vec::new() };

        let producer = self.producer(sensor);
        let flag = Arc::clone(&running);
        handle.push(spawn_task("producer", STACK_PRODUCER, PRIORITY_PRODUCER, move || {
            producer.run(flag)
        })?);

        let processor = self.processor();
        let flag = Arc::clone(&running);
        handle.push(spawn_task("processor", STACK_PROCESSOR, PRIORITY_PROCESSOR, move || {
            processor.run(flag)
        })?);

        let dispatcher = self.dispatcher(transport);
        let flag = Arc::clone(&running);
        handle.push(spawn_task("dispatcher", STACK_DISPATCHER, PRIORITY_DISPATCHER, move || {
            dispatcher.run(flag)
        })?);

        log::info!("All tasks started");
        Ok(handle)
    }
}

/// Spawn one named task. On the device the FreeRTOS priority is applied
/// through the thread spawn configuration, which must be reset afterwards so
/// unrelated threads keep the default.
fn spawn_task<F>(
    name: &'static str,
    stack: usize,
    priority: u8,
    body: F,
) -> anyhow::Result<(&'static str, JoinHandle<()>)>
where
    F: FnOnce() + Send + 'static,
{
    #[cfg(target_os = "espidf")]
    {
        use esp_idf_hal::task::thread::ThreadSpawnConfiguration;

        ThreadSpawnConfiguration { priority, ..Default::default() }.set()?;
        let spawned = thread::Builder::new().name(name.into()).stack_size(stack).spawn(body);
        ThreadSpawnConfiguration::default().set()?;
        Ok((name, spawned?))
    }

    #[cfg(not(target_os = "espidf"))]
    {
        log::debug!("Spawning {} (priority {} on device)", name, priority);
        let spawned = thread::Builder::new()
            .name(name.into())
            .stack_size(stack.max(HOST_MIN_STACK))
            .spawn(body)?;
        Ok((name, spawned))
    }
}

/// Running tasks. The firmware never stops them; host runs and tests do.
pub struct PipelineHandle {
    running: Arc<AtomicBool>,
    threads: Vec<(&'static str, JoinHandle<()>)>,
}

impl PipelineHandle {
    fn push(&mut self, task: (&'static str, JoinHandle<()>)) {
        self.threads.push(task);
    }

    /// Ask every task to leave its loop after the current iteration.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn join(self) -> anyhow::Result<()> {
        for (name, thread) in self.threads {
            thread.join().map_err(|_| anyhow!("{} task panicked", name))?;
        }
        Ok(())
    }
}
