// DriveMonitor - Queues
//
// `RingBuffer` is the one synchronisation primitive of the pipeline; every
// inter-task channel, including the bidirectional command queue, is built on
// it.

pub mod bidir;
pub mod ring_buffer;

pub use bidir::{BidirectionalQueue, EvictionPolicy};
pub use ring_buffer::{OverflowPolicy, PushStatus, RingBuffer};
