//! Preset catalogue: closed set of parametric waveforms.
//!
//! A [`PresetDefinition`] is immutable once built. Its variant selects the
//! waveform and carries that waveform's parameters; sampling lives in the
//! control unit.
//!
//! ```toml
//! [presets.wave]
//! type = "sine"
//! center = 90.0
//! amplitude = 30.0
//! period_ms = 1500.0
//! ```

use serde::{Deserialize, Serialize};

use super::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SineParams {
    pub center: f64,
    pub amplitude: f64,
    pub period_ms: f64,
    /// Phase offset in radians.
    pub phase: f64,
}

impl Default for SineParams {
    fn default() -> Self {
        Self {
            center: 90.0,
            amplitude: 45.0,
            period_ms: 2000.0,
            phase: 0.0,
        }
    }
}

/// Shared by `pingpong` and `bounce`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepParams {
    pub min_angle: f64,
    pub max_angle: f64,
    pub period_ms: f64,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            min_angle: 45.0,
            max_angle: 135.0,
            period_ms: 2000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomWalkParams {
    /// Starting angle.
    pub center: f64,
    pub min_angle: f64,
    pub max_angle: f64,
    /// Jitter bound: largest move per tick, degrees.
    pub max_step: f64,
    pub seed: Option<u64>,
}

impl Default for RandomWalkParams {
    fn default() -> Self {
        Self {
            center: 90.0,
            min_angle: 45.0,
            max_angle: 135.0,
            max_step: 2.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathParams {
    pub center: f64,
    pub amplitude: f64,
    pub inhale_ms: f64,
    pub exhale_ms: f64,
    /// Pause at the top of each breath.
    pub hold_ms: f64,
}

impl Default for BreathParams {
    fn default() -> Self {
        Self {
            center: 90.0,
            amplitude: 30.0,
            inhale_ms: 3000.0,
            exhale_ms: 2000.0,
            hold_ms: 500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitchParams {
    pub center: f64,
    pub amplitude: f64,
    /// Expected impulses per second.
    pub rate_hz: f64,
    pub impulse_ms: f64,
    pub seed: Option<u64>,
}

impl Default for TwitchParams {
    fn default() -> Self {
        Self {
            center: 90.0,
            amplitude: 20.0,
            rate_hz: 0.5,
            impulse_ms: 150.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RippleParams {
    pub center: f64,
    pub amplitude: f64,
    pub period_ms: f64,
    /// Phase lag per target index, radians.
    pub phase_step: f64,
    /// Exponential amplitude decay per target index.
    pub decay: f64,
}

impl Default for RippleParams {
    fn default() -> Self {
        Self {
            center: 90.0,
            amplitude: 30.0,
            period_ms: 2000.0,
            phase_step: 0.5,
            decay: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmParams {
    pub center: f64,
    pub amplitude: f64,
    pub period_ms: f64,
    /// Periods fan out evenly over `[1 - spread, 1 + spread]` by target
    /// index, `[0, 1)`.
    pub spread: f64,
    /// Phase offset per target index, radians.
    pub phase_step: f64,
    /// Extra random phase in `[-jitter, jitter]` radians per target.
    pub jitter: f64,
    pub seed: Option<u64>,
}

impl Default for SwarmParams {
    fn default() -> Self {
        Self {
            center: 90.0,
            amplitude: 30.0,
            period_ms: 3000.0,
            spread: 0.2,
            phase_step: 0.5,
            jitter: 0.0,
            seed: None,
        }
    }
}

/// One waveform from the closed catalogue with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresetDefinition {
    Sine(SineParams),
    #[serde(alias = "ping_pong")]
    Pingpong(SweepParams),
    Bounce(SweepParams),
    RandomWalk(RandomWalkParams),
    Breath(BreathParams),
    Twitch(TwitchParams),
    Ripple(RippleParams),
    Swarm(SwarmParams),
}

impl PresetDefinition {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Sine(_) => "sine",
            Self::Pingpong(_) => "pingpong",
            Self::Bounce(_) => "bounce",
            Self::RandomWalk(_) => "random_walk",
            Self::Breath(_) => "breath",
            Self::Twitch(_) => "twitch",
            Self::Ripple(_) => "ripple",
            Self::Swarm(_) => "swarm",
        }
    }

    /// `InvalidPresetParams` on any malformed parameter.
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            Self::Sine(p) => {
                finite(&[p.center, p.amplitude, p.period_ms, p.phase])?;
                positive("period_ms", p.period_ms)?;
                non_negative("amplitude", p.amplitude)
            }
            Self::Pingpong(p) | Self::Bounce(p) => {
                finite(&[p.min_angle, p.max_angle, p.period_ms])?;
                positive("period_ms", p.period_ms)?;
                ordered(p.min_angle, p.max_angle)
            }
            Self::RandomWalk(p) => {
                finite(&[p.center, p.min_angle, p.max_angle, p.max_step])?;
                ordered(p.min_angle, p.max_angle)?;
                non_negative("max_step", p.max_step)
            }
            Self::Breath(p) => {
                finite(&[p.center, p.amplitude, p.inhale_ms, p.exhale_ms, p.hold_ms])?;
                non_negative("amplitude", p.amplitude)?;
                positive("inhale_ms", p.inhale_ms)?;
                positive("exhale_ms", p.exhale_ms)?;
                non_negative("hold_ms", p.hold_ms)
            }
            Self::Twitch(p) => {
                finite(&[p.center, p.amplitude, p.rate_hz, p.impulse_ms])?;
                non_negative("amplitude", p.amplitude)?;
                non_negative("rate_hz", p.rate_hz)?;
                positive("impulse_ms", p.impulse_ms)
            }
            Self::Ripple(p) => {
                finite(&[p.center, p.amplitude, p.period_ms, p.phase_step, p.decay])?;
                positive("period_ms", p.period_ms)?;
                non_negative("amplitude", p.amplitude)?;
                non_negative("decay", p.decay)
            }
            Self::Swarm(p) => {
                finite(&[p.center, p.amplitude, p.period_ms, p.spread, p.phase_step, p.jitter])?;
                positive("period_ms", p.period_ms)?;
                non_negative("amplitude", p.amplitude)?;
                non_negative("jitter", p.jitter)?;
                if !(0.0..1.0).contains(&p.spread) {
                    return Err(invalid(format!("spread {} outside [0, 1)", p.spread)));
                }
                Ok(())
            }
        }
    }
}

fn invalid(msg: String) -> EngineError {
    EngineError::InvalidPresetParams(msg)
}

fn finite(values: &[f64]) -> Result<(), EngineError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(invalid("non-finite parameter".to_string()))
    }
}

fn positive(name: &str, value: f64) -> Result<(), EngineError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be > 0, got {value}")))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), EngineError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be >= 0, got {value}")))
    }
}

fn ordered(min: f64, max: f64) -> Result<(), EngineError> {
    if min < max {
        Ok(())
    } else {
        Err(invalid(format!("min_angle {min} must be < max_angle {max}")))
    }
}

/// Where `preset_start` takes its definition from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetSource {
    /// Entry of the preset library.
    Named(String),
    Inline(PresetDefinition),
}

impl From<PresetDefinition> for PresetSource {
    fn from(def: PresetDefinition) -> Self {
        Self::Inline(def)
    }
}
