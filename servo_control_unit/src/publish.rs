//! Outbound side of the tick loop: snapshot/outcome broadcast and the client
//! handle.
//!
//! The tick loop is the only publisher. Subscribers get a
//! `tokio::sync::broadcast` receiver; a lagging subscriber loses old events,
//! never blocks the loop. The most recent snapshot is also kept behind a
//! short lock for polling clients.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use servo_common::engine::command::{ClientId, Command, CommandOutcome};
use servo_common::engine::safety::PreflightReport;
use servo_common::engine::snapshot::StateSnapshot;
use tokio::sync::broadcast;
use tracing::trace;

use crate::command::CommandSender;
use crate::engine::TickOutput;
use crate::safety::preflight::run_preflight;

/// Events buffered per subscriber before the oldest are overwritten.
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    Snapshot(Arc<StateSnapshot>),
    Outcome(CommandOutcome),
}

type Latest = Arc<RwLock<Option<Arc<StateSnapshot>>>>;

/// Tick-loop side of the broadcast.
#[derive(Debug)]
pub struct Publisher {
    events: broadcast::Sender<EngineEvent>,
    latest: Latest,
    watchdog: Option<Duration>,
}

impl Publisher {
    /// `watchdog` is reported by [`ControlHandle::preflight`].
    pub fn new(watchdog: Option<Duration>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            events,
            latest: Arc::new(RwLock::new(None)),
            watchdog,
        }
    }

    /// Send every outcome, then the snapshot. Returns the shared snapshot.
    pub fn publish(&self, output: TickOutput) -> Arc<StateSnapshot> {
        let snapshot = Arc::new(output.snapshot);
        *self.latest.write() = Some(Arc::clone(&snapshot));
        for outcome in output.outcomes {
            // No subscribers is not an error.
            let _ = self.events.send(EngineEvent::Outcome(outcome));
        }
        let receivers = self
            .events
            .send(EngineEvent::Snapshot(Arc::clone(&snapshot)))
            .unwrap_or(0);
        trace!("Tick {} published to {receivers} subscriber(s)", snapshot.tick);
        snapshot
    }

    /// Handle for one client.
    pub fn handle(&self, sender: CommandSender, client: ClientId) -> ControlHandle {
        ControlHandle {
            client,
            sender,
            events: self.events.clone(),
            latest: Arc::clone(&self.latest),
            watchdog: self.watchdog,
        }
    }
}

/// What a client holds: enqueue commands, watch results.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    client: ClientId,
    sender: CommandSender,
    events: broadcast::Sender<EngineEvent>,
    latest: Latest,
    watchdog: Option<Duration>,
}

impl ControlHandle {
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Enqueue a command; its outcome arrives as [`EngineEvent::Outcome`]
    /// with the returned sequence number.
    pub fn send(&self, command: Command) -> u64 {
        self.sender.send(self.client, command)
    }

    pub fn heartbeat(&self) -> u64 {
        self.send(Command::Heartbeat)
    }

    pub fn emergency_stop(&self) -> u64 {
        self.send(Command::EmergencyStop)
    }

    /// Request a named pose. Served from the priority lane, ahead of every
    /// normal command of the next tick.
    pub fn go_safe_pose(&self, name: impl Into<String>) -> u64 {
        self.send(Command::SafePose { name: name.into() })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the most recent tick, if any ran.
    pub fn latest(&self) -> Option<Arc<StateSnapshot>> {
        self.latest.read().clone()
    }

    /// Preflight against the most recent snapshot. Read-only; an engine that
    /// has not ticked yet reports no servos.
    pub fn preflight(&self) -> PreflightReport {
        match self.latest() {
            Some(snapshot) => run_preflight(snapshot.servos.iter().map(|s| &s.servo), self.watchdog),
            None => run_preflight(std::iter::empty(), self.watchdog),
        }
    }
}
