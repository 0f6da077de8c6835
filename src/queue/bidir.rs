// DriveMonitor - Bidirectional Command/Status Queue
//
// One ring buffer carries both directions: commands coming in from the
// dashboard and status responses going back out. Consumers take only the
// messages tagged with their direction.

use std::time::Duration;

use super::ring_buffer::{OverflowPolicy, PushStatus, RingBuffer};
use crate::events::{Command, Direction, Message, Payload, StatusResponse};

/// Which message a full queue gives up to admit a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Oldest message regardless of direction.
    OldestAny,
    /// Oldest message of the incoming message's own direction, so one side's
    /// backlog only displaces the other side when it has nothing of its own
    /// left to drop.
    SameDirectionFirst,
}

pub struct BidirectionalQueue {
    buffer: RingBuffer<Message>,
    eviction: EvictionPolicy,
}

impl BidirectionalQueue {
    pub fn new(capacity: usize) -> Self {
        log::info!("Bidirectional queue initialised (size: {})", capacity);
        Self {
            buffer: RingBuffer::new(capacity, OverflowPolicy::DropOldest).named("bidir_queue"),
            eviction: EvictionPolicy::OldestAny,
        }
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.buffer = self.buffer.with_lock_timeout(timeout);
        self
    }

    pub fn eviction(&self) -> EvictionPolicy {
        self.eviction
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Insert a message of either direction. A full queue evicts according to
    /// the configured [`EvictionPolicy`]; the push itself always succeeds
    /// unless the lock times out.
    pub fn push(&self, msg: Message) -> PushStatus {
        match self.eviction {
            EvictionPolicy::OldestAny => self.buffer.push_back(msg),
            EvictionPolicy::SameDirectionFirst => {
                let direction = msg.direction;
                self.buffer.push_back_evicting(msg, |m| m.direction == direction)
            }
        }
    }

    pub fn push_command(&self, command: Command) -> PushStatus {
        self.push(Message::inbound(command))
    }

    pub fn push_status(&self, status: StatusResponse) -> PushStatus {
        self.push(Message::outbound(status))
    }

    /// Oldest message tagged with `direction`. Everything else stays in order.
    pub fn pop(&self, direction: Direction) -> Option<Message> {
        self.buffer.pop_match(|m| m.direction == direction)
    }

    /// Next inbound command, skipping (and dropping) any inbound message that
    /// does not carry one.
    pub fn pop_command(&self) -> Option<Command> {
        loop {
            match self.pop(Direction::Inbound)?.payload {
                Payload::Command(cmd) => return Some(cmd),
                Payload::Status(_) => log::warn!("bidir_queue: status tagged inbound, dropped"),
            }
        }
    }

    /// Next outbound status, skipping any outbound message that is not one.
    pub fn pop_status(&self) -> Option<StatusResponse> {
        loop {
            match self.pop(Direction::Outbound)?.payload {
                Payload::Status(status) => return Some(status),
                Payload::Command(_) => log::warn!("bidir_queue: command tagged outbound, dropped"),
            }
        }
    }

    pub fn has(&self, direction: Direction) -> bool {
        self.buffer.has_match(|m| m.direction == direction)
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.buffer.count_match(|m| m.direction == direction)
    }

    /// Total occupancy across both directions.
    pub fn len(&self) -> usize {
        self.buffer.count()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
