//! Per-tick state snapshot published to subscribers.

use serde::Serialize;

use super::error::ServoFlags;
use super::safety::SafetyLogEntry;
use super::servo::{Servo, ServoId};
use super::state::{EmergencyMode, SafetyState, StopReason, TransportMode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServoStatus {
    #[serde(flatten)]
    pub servo: Servo,
    pub pulse_us: u16,
    pub flags: ServoFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetySnapshot {
    pub state: SafetyState,
    pub emergency_mode: EmergencyMode,
    /// Time left in RECOVERING; 0 otherwise.
    pub cooldown_remaining_ms: u64,
    pub last_reason: Option<StopReason>,
    pub trigger_count: u64,
    /// Most recent transitions, oldest first.
    pub recent: Vec<SafetyLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSnapshot {
    pub mode: TransportMode,
    pub current_time_ms: f64,
    pub rate: f64,
    pub duration_ms: f64,
    pub looping: bool,
    pub tracks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetSnapshot {
    pub name: String,
    pub kind: &'static str,
    pub targets: Vec<ServoId>,
    pub paused: bool,
    pub rate: f64,
    pub elapsed_ms: f64,
    pub generation: u64,
}

/// Everything a subscriber needs after one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub tick: u64,
    /// Registry revision; unchanged revision means unchanged servos.
    pub revision: u64,
    pub safety: SafetySnapshot,
    pub servos: Vec<ServoStatus>,
    pub timeline: TimelineSnapshot,
    pub presets: Vec<PresetSnapshot>,
    /// PWM released by a detach-mode emergency stop.
    pub outputs_detached: bool,
    /// Events dropped by the queue since start.
    pub queue_dropped: u64,
}

impl StateSnapshot {
    pub fn servo(&self, id: &str) -> Option<&ServoStatus> {
        self.servos.iter().find(|s| s.servo.id == id)
    }

    pub fn angle(&self, id: &str) -> Option<f64> {
        self.servo(id).map(|s| s.servo.current_angle)
    }
}
