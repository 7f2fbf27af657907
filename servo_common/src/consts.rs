//! System-wide constants for the servo workspace.
//!
//! Single source of truth for channel limits, envelopes and timing defaults.

use static_assertions::const_assert;

/// Number of PWM channels on the output controller.
pub const MAX_CHANNELS: usize = 16;

/// PWM carrier frequency expected by hobby servos.
pub const PWM_FREQUENCY_HZ: u32 = 50;

/// Hardware-safe angular envelope, lower bound (degrees).
pub const ENVELOPE_MIN_DEG: f64 = 0.0;

/// Hardware-safe angular envelope, upper bound (degrees).
pub const ENVELOPE_MAX_DEG: f64 = 180.0;

/// Absolute pulse-width limits accepted by `register`/`calibrate` (µs).
pub const PULSE_ABS_MIN_US: u16 = 400;
/// See [`PULSE_ABS_MIN_US`].
pub const PULSE_ABS_MAX_US: u16 = 2600;

/// Typical pulse-width window; calibrations outside it produce a warning.
pub const PULSE_TYPICAL_MIN_US: u16 = 500;
/// See [`PULSE_TYPICAL_MIN_US`].
pub const PULSE_TYPICAL_MAX_US: u16 = 2500;

/// Default pulse-width range for a freshly registered servo.
pub const DEFAULT_MIN_PULSE_US: u16 = 750;
/// See [`DEFAULT_MIN_PULSE_US`].
pub const DEFAULT_MAX_PULSE_US: u16 = 2250;

/// Default tick frequency of the arbiter.
pub const DEFAULT_TICK_HZ: u32 = 50;

/// Default RECOVERING cooldown.
pub const DEFAULT_RECOVERY_COOLDOWN_MS: u64 = 3000;

/// Default client-silence watchdog timeout.
pub const DEFAULT_WATCHDOG_TIMEOUT_MS: u64 = 5000;

/// Default capacity of the normal command lane.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default authored timeline length.
pub const DEFAULT_TIMELINE_DURATION_MS: f64 = 10_000.0;

/// Entries kept in the safety transition log.
pub const SAFETY_LOG_CAPACITY: usize = 100;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/servo/servo.toml";

const_assert!(MAX_CHANNELS <= u8::MAX as usize);
const_assert!(DEFAULT_MIN_PULSE_US < DEFAULT_MAX_PULSE_US);
const_assert!(PULSE_ABS_MIN_US <= PULSE_TYPICAL_MIN_US);
const_assert!(PULSE_TYPICAL_MAX_US <= PULSE_ABS_MAX_US);
