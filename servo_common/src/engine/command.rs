//! Client commands and their outcomes.
//!
//! Clients never mutate engine state. They enqueue a [`Command`]; the queue
//! stamps it with a sequence number and the originating client, producing a
//! [`CommandEvent`]. The tick loop applies events in arrival order and
//! reports one [`CommandOutcome`] per event.

use serde::{Deserialize, Serialize};

use super::error::{EngineError, ErrorKind};
use super::preset::PresetSource;
use super::servo::{ServoId, ServoSpec};
use super::timeline::{Ease, Marker, Timeline};

/// Opaque identifier of a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Timeline transport control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransportCommand {
    Play,
    Pause,
    Resume,
    Stop,
    Scrub { time_ms: f64 },
    /// Capture live `set_angle` commands. `None` records every servo.
    Record {
        #[serde(default)]
        targets: Option<Vec<ServoId>>,
    },
    SetRate { rate: f64 },
    /// Scrub to a marker.
    Jump { label: String },
}

impl TransportCommand {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Scrub { .. } => "scrub",
            Self::Record { .. } => "record",
            Self::SetRate { .. } => "set_rate",
            Self::Jump { .. } => "jump",
        }
    }

    /// Commands that (re)start motion from the timeline.
    pub const fn starts_motion(&self) -> bool {
        matches!(self, Self::Play | Self::Resume | Self::Record { .. })
    }
}

/// Edits of the authored timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "edit", rename_all = "snake_case")]
pub enum TimelineEdit {
    AddKeyframe {
        servo: ServoId,
        time_ms: f64,
        angle: f64,
        #[serde(default)]
        ease: Ease,
    },
    RemoveKeyframe { servo: ServoId, time_ms: f64 },
    ClearTrack { servo: ServoId },
    SetDuration { duration_ms: f64 },
    SetLoop {
        enabled: bool,
        #[serde(default)]
        start_ms: f64,
        #[serde(default)]
        end_ms: Option<f64>,
    },
    SetQuantize { grid_ms: Option<f64> },
    AddMarker(Marker),
    Mute { servo: ServoId, muted: bool },
    Solo { servo: ServoId, solo: bool },
    /// Drop keyframes that linear interpolation already predicts.
    Simplify { servo: ServoId, tolerance: f64 },
    /// Replace the whole timeline; transport stops.
    Load(Timeline),
}

/// Everything a client may ask of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    SetAngle { id: ServoId, angle: f64 },
    Enable { id: ServoId },
    Disable { id: ServoId },
    Register(ServoSpec),
    Deregister { id: ServoId },
    /// Change a servo's canonical id; tracks, presets and poses follow.
    Rename { id: ServoId, new_id: ServoId },
    EmergencyStop,
    PresetStart {
        /// Instance name. Library name or generated when absent.
        #[serde(default)]
        name: Option<String>,
        preset: PresetSource,
        targets: Vec<ServoId>,
        #[serde(default)]
        rate: Option<f64>,
    },
    PresetStop { name: String },
    PresetPause { name: String },
    PresetResume { name: String },
    Transport(TransportCommand),
    Timeline(TimelineEdit),
    /// Move servos to a named pose at explicit priority.
    SafePose { name: String },
    AddAlias { id: ServoId, alias: String },
    SetLimits { id: ServoId, min_deg: f64, max_deg: f64 },
    Calibrate {
        id: ServoId,
        min_pulse_us: u16,
        max_pulse_us: u16,
    },
    /// Keeps the watchdog fed; no other effect.
    Heartbeat,
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetAngle { .. } => "set_angle",
            Self::Enable { .. } => "enable",
            Self::Disable { .. } => "disable",
            Self::Register(_) => "register",
            Self::Deregister { .. } => "deregister",
            Self::Rename { .. } => "rename",
            Self::EmergencyStop => "emergency_stop",
            Self::PresetStart { .. } => "preset_start",
            Self::PresetStop { .. } => "preset_stop",
            Self::PresetPause { .. } => "preset_pause",
            Self::PresetResume { .. } => "preset_resume",
            Self::Transport(_) => "transport",
            Self::Timeline(_) => "timeline",
            Self::SafePose { .. } => "safe_pose",
            Self::AddAlias { .. } => "add_alias",
            Self::SetLimits { .. } => "set_limits",
            Self::Calibrate { .. } => "calibrate",
            Self::Heartbeat => "heartbeat",
        }
    }

    /// Served from the priority lane of the queue.
    #[inline]
    pub const fn is_priority(&self) -> bool {
        matches!(self, Self::EmergencyStop | Self::SafePose { .. })
    }
}

/// A command stamped with its logical arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    pub seq: u64,
    pub client: ClientId,
    pub command: Command,
}

/// Result of applying one event, sent back to its client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    pub seq: u64,
    pub client: ClientId,
    pub command: &'static str,
    pub tick: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EngineError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl CommandOutcome {
    pub fn new(event: &CommandEvent, tick: u64, result: Result<(), EngineError>) -> Self {
        Self::from_parts(event.seq, event.client, event.command.name(), tick, result)
    }

    /// Outcome for an event whose command has already been consumed.
    pub fn from_parts(
        seq: u64,
        client: ClientId,
        command: &'static str,
        tick: u64,
        result: Result<(), EngineError>,
    ) -> Self {
        let error = result.err();
        Self {
            seq,
            client,
            command,
            tick,
            error_kind: error.as_ref().map(EngineError::kind),
            error,
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
