//! Configuration sections of the orchestration engine.
//!
//! All sections deserialize from TOML with `#[serde(default)]` on optional
//! fields. Numeric parameters carry `MIN`/`MAX` bounds checked by
//! `validate()`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::preset::PresetDefinition;
use super::safety::SafePose;
use super::servo::ServoSpec;
use super::state::EmergencyMode;
use crate::config::SharedConfig;
use crate::consts::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_RECOVERY_COOLDOWN_MS, DEFAULT_TICK_HZ,
    DEFAULT_TIMELINE_DURATION_MS, DEFAULT_WATCHDOG_TIMEOUT_MS,
};

pub const TICK_HZ_MIN: u32 = 1;
pub const TICK_HZ_MAX: u32 = 1000;
pub const QUEUE_CAPACITY_MIN: usize = 16;
pub const QUEUE_CAPACITY_MAX: usize = 1 << 20;
pub const WATCHDOG_TIMEOUT_MIN_MS: u64 = 100;
pub const COOLDOWN_MAX_MS: u64 = 600_000;

// ─── Top-Level Config ───────────────────────────────────────────────

/// Whole configuration file of the control unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub shared: SharedConfig,
    pub engine: TickConfig,
    pub safety: SafetyConfig,
    pub timeline: TimelineConfig,
    pub servos: Vec<ServoSpec>,
    pub safe_poses: Vec<SafePose>,
    /// Preset library entries, merged over the built-ins.
    pub presets: BTreeMap<String, PresetDefinition>,
}

impl EngineConfig {
    /// Validate parameter bounds of every section.
    ///
    /// Cross-entity checks (unique ids/channels, pose references) belong to
    /// the loader.
    pub fn validate(&self) -> Result<(), String> {
        self.shared.validate().map_err(|e| e.to_string())?;
        self.engine.validate()?;
        self.safety.validate()?;
        self.timeline.validate()
    }
}

// ─── Tick loop ──────────────────────────────────────────────────────

/// How pulse writes reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Called directly from the tick loop.
    #[default]
    Inline,
    /// Dedicated writer thread; the tick never waits for the bus.
    Offloaded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    pub tick_hz: u32,
    pub queue_capacity: usize,
    pub output_mode: OutputMode,
    /// Backend name in the driver registry.
    pub driver: String,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_hz: DEFAULT_TICK_HZ,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            output_mode: OutputMode::Inline,
            driver: "simulation".to_string(),
        }
    }
}

impl TickConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(TICK_HZ_MIN..=TICK_HZ_MAX).contains(&self.tick_hz) {
            return Err(format!(
                "tick_hz {} out of range [{}, {}]",
                self.tick_hz, TICK_HZ_MIN, TICK_HZ_MAX
            ));
        }
        if !(QUEUE_CAPACITY_MIN..=QUEUE_CAPACITY_MAX).contains(&self.queue_capacity) {
            return Err(format!(
                "queue_capacity {} out of range [{}, {}]",
                self.queue_capacity, QUEUE_CAPACITY_MIN, QUEUE_CAPACITY_MAX
            ));
        }
        if self.driver.is_empty() {
            return Err("driver cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_hz.max(1)))
    }
}

// ─── Safety ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Client-silence timeout. `0` disables the watchdog.
    pub watchdog_timeout_ms: u64,
    pub recovery_cooldown_ms: u64,
    pub emergency_mode: EmergencyMode,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_ms: DEFAULT_WATCHDOG_TIMEOUT_MS,
            recovery_cooldown_ms: DEFAULT_RECOVERY_COOLDOWN_MS,
            emergency_mode: EmergencyMode::SafePose,
        }
    }
}

impl SafetyConfig {
    pub fn validate(&self) -> Result<(), String> {
        let ms = self.watchdog_timeout_ms;
        if ms != 0 && ms < WATCHDOG_TIMEOUT_MIN_MS {
            return Err(format!(
                "watchdog_timeout_ms {ms} below minimum {WATCHDOG_TIMEOUT_MIN_MS}"
            ));
        }
        if self.recovery_cooldown_ms > COOLDOWN_MAX_MS {
            return Err(format!(
                "recovery_cooldown_ms {} above maximum {COOLDOWN_MAX_MS}",
                self.recovery_cooldown_ms
            ));
        }
        Ok(())
    }

    pub fn watchdog_timeout(&self) -> Option<Duration> {
        (self.watchdog_timeout_ms > 0).then(|| Duration::from_millis(self.watchdog_timeout_ms))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.recovery_cooldown_ms)
    }
}

// ─── Timeline ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub duration_ms: f64,
    pub quantize_ms: Option<f64>,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_TIMELINE_DURATION_MS,
            quantize_ms: None,
        }
    }
}

impl TimelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.duration_ms.is_finite() && self.duration_ms > 0.0) {
            return Err(format!("timeline duration_ms {} must be > 0", self.duration_ms));
        }
        if let Some(q) = self.quantize_ms.filter(|q| !(q.is_finite() && *q > 0.0)) {
            return Err(format!("quantize_ms {q} must be > 0"));
        }
        Ok(())
    }
}
