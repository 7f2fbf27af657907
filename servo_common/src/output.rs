//! PWM output adapter contract.
//!
//! This module defines:
//! - `PwmOutput` trait - Interface for pluggable PWM backends
//! - `HardwareError` enum - Per-write failures reported by a backend
//! - `DriverError` enum - Lifecycle failures (lookup, init)
//! - `OutputFactory` type alias - Factory function type

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::MAX_CHANNELS;

/// Failure of a single output write.
///
/// Never fatal to the tick loop: the affected servo is flagged stale and
/// retried on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum HardwareError {
    /// Bus-level failure (NACK, arbitration lost, device gone).
    #[error("bus error on channel {channel}: {reason}")]
    Bus { channel: u8, reason: String },

    /// Channel index outside the controller.
    #[error("channel {0} not present on controller")]
    NoSuchChannel(u8),

    /// Write did not complete in its time budget.
    #[error("write to channel {0} timed out")]
    Timeout(u8),

    /// Backend was not initialized or already shut down.
    #[error("output backend not initialized")]
    NotInitialized,

    /// The offloaded writer could not accept the frame.
    #[error("output frame dropped: writer busy")]
    WriterBusy,
}

/// Lifecycle errors of output backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    #[error("Initialization failed: {0}")]
    InitFailed(String),
}

/// Factory function type for creating backend instances.
pub type OutputFactory = fn() -> Box<dyn PwmOutput>;

/// Counters a backend may expose for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputDiagnostics {
    pub writes: u64,
    pub failures: u64,
    pub max_write_us: u64,
}

/// Interface for PWM output backends.
///
/// # Lifecycle
///
/// 1. `init()` - Called once before the tick loop starts
/// 2. `write()` - Called once per enabled servo per tick
/// 3. `release_all()` - Called on shutdown; outputs go limp
///
/// # Timing Contracts
///
/// | Operation | Max Duration | Constraint |
/// |-----------|--------------|------------|
/// | `init()` | unbounded | before the loop |
/// | `write()` | ≪ tick period | inline mode only; slow backends run offloaded |
/// | `release_all()` | 1 second | after the loop |
pub trait PwmOutput: Send {
    /// Backend identifier (e.g. "simulation").
    fn name(&self) -> &'static str;

    /// Bring up the bus/controller.
    ///
    /// # Errors
    /// `DriverError::InitFailed` if the controller is unreachable. Startup
    /// treats this as fatal.
    fn init(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    /// Drive `channel` with a pulse of `pulse_us` microseconds.
    fn write(&mut self, channel: u8, pulse_us: u16) -> Result<(), HardwareError>;

    /// Stop pulsing every channel.
    fn release_all(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }

    fn diagnostics(&self) -> Option<OutputDiagnostics> {
        None
    }
}

/// `NoSuchChannel` unless `channel` exists on the controller.
pub fn check_channel(channel: u8) -> Result<(), HardwareError> {
    if usize::from(channel) < MAX_CHANNELS {
        Ok(())
    } else {
        Err(HardwareError::NoSuchChannel(channel))
    }
}
