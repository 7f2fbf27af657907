//! Prelude module for common re-exports.
//!
//! ```rust
//! use servo_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::engine::config::{EngineConfig, OutputMode, SafetyConfig, TickConfig, TimelineConfig};

// ─── Data model ─────────────────────────────────────────────────────
pub use crate::engine::command::{
    ClientId, Command, CommandEvent, CommandOutcome, TimelineEdit, TransportCommand,
};
pub use crate::engine::error::{EngineError, ErrorKind, ServoFlags};
pub use crate::engine::preset::{PresetDefinition, PresetSource};
pub use crate::engine::safety::{CheckStatus, PreflightReport, SafePose};
pub use crate::engine::servo::{Servo, ServoId, ServoSpec};
pub use crate::engine::snapshot::StateSnapshot;
pub use crate::engine::state::{
    AngleSource, EmergencyMode, Orientation, SafetyState, StopReason, TransportMode,
};
pub use crate::engine::timeline::{Ease, Keyframe, Timeline, Track};

// ─── Output ─────────────────────────────────────────────────────────
pub use crate::output::{DriverError, HardwareError, OutputFactory, PwmOutput};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_TICK_HZ, MAX_CHANNELS};
