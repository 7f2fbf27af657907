//! State enums of the orchestration engine.
//!
//! `#[repr(u8)]` enums with `from_u8` for compact status encoding, matching
//! the snapshot representation used by subscribers.

use serde::{Deserialize, Serialize};

// ─── Safety ─────────────────────────────────────────────────────────

/// Process-wide safety overlay.
///
/// Only `Normal` permits motion. `Recovering` returns to `Normal` on its own
/// once the cooldown has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SafetyState {
    #[default]
    Normal = 0,
    /// Every enabled servo forced to its safe angle; motion rejected.
    EmergencyStop = 1,
    /// Timed cooldown after an emergency stop.
    Recovering = 2,
}

impl SafetyState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::EmergencyStop),
            2 => Some(Self::Recovering),
            _ => None,
        }
    }

    #[inline]
    pub const fn permits_motion(self) -> bool {
        matches!(self, Self::Normal)
    }
}

/// Why the safety monitor left `Normal` (or re-entered `EmergencyStop`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum StopReason {
    /// Explicit `emergency_stop` command.
    Manual = 0,
    /// No client traffic within the watchdog timeout.
    Watchdog = 1,
}

/// What an emergency stop does to the outputs. Motion stays blocked until
/// recovery in every mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EmergencyMode {
    /// Force every enabled servo to its safe angle.
    #[default]
    SafePose = 0,
    /// Freeze every servo at its last angle.
    Hold = 1,
    /// Release all PWM channels; no pulses until back in `Normal`.
    Detach = 2,
}

impl EmergencyMode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::SafePose),
            1 => Some(Self::Hold),
            2 => Some(Self::Detach),
            _ => None,
        }
    }
}

// ─── Timeline transport ─────────────────────────────────────────────

/// Timeline transport mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TransportMode {
    #[default]
    Stopped = 0,
    Playing = 1,
    Paused = 2,
    Recording = 3,
}

impl TransportMode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stopped),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Recording),
            _ => None,
        }
    }

    /// Transport clock runs in these modes.
    #[inline]
    pub const fn clock_running(self) -> bool {
        matches!(self, Self::Playing | Self::Recording)
    }
}

// ─── Per-servo ──────────────────────────────────────────────────────

/// Mounting orientation. `Reversed` flips the angle→pulse mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Orientation {
    #[default]
    Normal = 0,
    #[serde(alias = "inverted", alias = "mirrored")]
    Reversed = 1,
}

/// Which arbitration source produced a servo's angle on the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AngleSource {
    /// Nothing drove the servo; previous angle held.
    #[default]
    Hold = 0,
    /// Client command (`set_angle` or a named safe pose) in this tick.
    Explicit = 1,
    Preset = 2,
    Timeline = 3,
    /// Forced by an emergency stop.
    SafePose = 4,
}
