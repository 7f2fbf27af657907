//! Command rejection errors and servo status flags.
//!
//! Every rejected command carries an [`EngineError`] back to its client in a
//! `CommandOutcome`. A rejected command never changes engine state.

use bitflags::bitflags;
use serde::{Serialize, Serializer};
use thiserror::Error;

use super::state::{SafetyState, TransportMode};
use crate::output::HardwareError;

/// Coarse classification reported alongside every rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input. Nothing changed.
    Validation,
    /// Lost a same-tick race (first arrival wins).
    Conflict,
    /// Output backend failure.
    Hardware,
    /// Rejected by the safety interlock.
    Safety,
}

/// Reasons a command is rejected.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum EngineError {
    #[error("invalid servo identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("servo identifier '{0}' already registered")]
    DuplicateIdentifier(String),

    #[error("channel {channel} already used by '{owner}'")]
    ChannelInUse { channel: u8, owner: String },

    #[error("channel {channel} claimed by '{winner}' earlier in the same tick")]
    RegistrationConflict { channel: u8, winner: String },

    #[error("channel {0} is not a valid output channel")]
    InvalidChannel(u8),

    #[error("angle {angle} outside [{min}, {max}] for '{id}'")]
    OutOfRange {
        id: String,
        angle: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid angular range [{min}, {max}]")]
    InvalidRange { min: f64, max: f64 },

    #[error("invalid pulse range [{min_us}, {max_us}] µs")]
    InvalidPulseRange { min_us: u16, max_us: u16 },

    #[error("unknown servo '{0}'")]
    UnknownServo(String),

    #[error("servo '{0}' is disabled")]
    ServoDisabled(String),

    #[error("malformed preset parameters: {0}")]
    InvalidPresetParams(String),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("preset needs at least one target")]
    NoTargets,

    #[error("unknown safe pose '{0}'")]
    UnknownPose(String),

    #[error("unknown marker '{0}'")]
    UnknownMarker(String),

    #[error("cannot {command} while transport is {mode:?}")]
    InvalidTransport {
        command: &'static str,
        mode: TransportMode,
    },

    #[error("invalid timeline edit: {0}")]
    InvalidTimeline(String),

    #[error("invalid rate {0}")]
    InvalidRate(f64),

    #[error("motion rejected while safety state is {0:?}")]
    MotionBlocked(SafetyState),

    #[error("hardware: {0}")]
    Hardware(#[from] HardwareError),
}

impl EngineError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RegistrationConflict { .. } => ErrorKind::Conflict,
            Self::MotionBlocked(_) => ErrorKind::Safety,
            Self::Hardware(_) => ErrorKind::Hardware,
            _ => ErrorKind::Validation,
        }
    }
}

bitflags! {
    /// Per-servo status flags published in snapshots.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ServoFlags: u8 {
        /// Last output write failed; actuator may not match `current_angle`.
        const STALE       = 0x01;
        /// Servo excluded from arbitration.
        const DISABLED    = 0x02;
        /// Angle is the emergency safe pose.
        const FORCED_SAFE = 0x04;
    }
}

impl Serialize for ServoFlags {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(self.bits())
    }
}
