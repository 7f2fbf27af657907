//! Client → tick-loop command queue.
//!
//! Two lanes behind one short `parking_lot::Mutex`:
//! - **priority**: emergency stops and safe-pose requests, unbounded, never dropped;
//! - **normal**: everything else, bounded; a full lane drops its oldest event.
//!
//! Producers never block beyond the lock. Sequence numbers are stamped under
//! the lock so they reflect arrival order across both lanes.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use servo_common::engine::command::{ClientId, Command, CommandEvent};
use tracing::warn;

#[derive(Debug, Default)]
struct Lanes {
    priority: VecDeque<CommandEvent>,
    normal: VecDeque<CommandEvent>,
    next_seq: u64,
    dropped: u64,
}

#[derive(Debug)]
struct Shared {
    lanes: Mutex<Lanes>,
    capacity: usize,
}

/// Cloneable producer side.
#[derive(Debug, Clone)]
pub struct CommandSender {
    shared: Arc<Shared>,
}

/// Consumer side, owned by the tick loop.
#[derive(Debug)]
pub struct CommandReceiver {
    shared: Arc<Shared>,
}

/// Create a queue whose normal lane holds at most `capacity` events.
pub fn command_queue(capacity: usize) -> (CommandSender, CommandReceiver) {
    let shared = Arc::new(Shared {
        lanes: Mutex::new(Lanes::default()),
        capacity: capacity.max(1),
    });
    (
        CommandSender {
            shared: Arc::clone(&shared),
        },
        CommandReceiver { shared },
    )
}

impl CommandSender {
    /// Enqueue `command` from `client`. Returns the stamped sequence number.
    pub fn send(&self, client: ClientId, command: Command) -> u64 {
        let mut lanes = self.shared.lanes.lock();
        let seq = lanes.next_seq;
        lanes.next_seq += 1;
        let event = CommandEvent {
            seq,
            client,
            command,
        };
        if event.command.is_priority() {
            lanes.priority.push_back(event);
            return seq;
        }
        if lanes.normal.len() >= self.shared.capacity {
            if let Some(old) = lanes.normal.pop_front() {
                lanes.dropped += 1;
                warn!(
                    "Command queue full ({}), dropped seq {} '{}' from {}",
                    self.shared.capacity,
                    old.seq,
                    old.command.name(),
                    old.client
                );
            }
        }
        lanes.normal.push_back(event);
        seq
    }

    /// Events waiting across both lanes.
    pub fn pending(&self) -> usize {
        let lanes = self.shared.lanes.lock();
        lanes.priority.len() + lanes.normal.len()
    }
}

impl CommandReceiver {
    /// Take everything queued: priority lane first, then arrival order.
    pub fn drain(&self) -> Vec<CommandEvent> {
        let mut lanes = self.shared.lanes.lock();
        let mut out = Vec::with_capacity(lanes.priority.len() + lanes.normal.len());
        out.extend(lanes.priority.drain(..));
        out.extend(lanes.normal.drain(..));
        out
    }

    /// Total events dropped from the normal lane.
    pub fn dropped(&self) -> u64 {
        self.shared.lanes.lock().dropped
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// A new producer for the same queue.
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            shared: Arc::clone(&self.shared),
        }
    }
}
