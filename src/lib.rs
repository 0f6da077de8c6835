// DriveMonitor - Driving Safety Monitor Core
//
// Samples an accelerometer, flags crashes and harsh driving against tunable
// thresholds, batches raw telemetry and serves a remote threshold command
// channel. Everything here is target-independent; board bring-up lives in the
// binary.

pub mod batch;
pub mod clock;
pub mod config;
pub mod detector;
pub mod drivers;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod queue;
pub mod stats;
pub mod tasks;
pub mod transport;

pub use batch::BatchAggregator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PipelineConfig, Thresholds};
pub use detector::{DetectorEngine, Evaluation};
pub use drivers::{MockImu, SensorSource};
pub use error::{MonitorError, Result};
pub use events::{
    Alert, Batch, Command, Direction, Message, Payload, Sample, StatusResponse, ThresholdKind,
    WarningKind,
};
pub use pipeline::{Pipeline, PipelineHandle, Queues};
pub use queue::{BidirectionalQueue, EvictionPolicy, OverflowPolicy, PushStatus, RingBuffer};
pub use stats::PipelineStats;
pub use transport::{CommandSink, LogTransport, Topic, Transport};
