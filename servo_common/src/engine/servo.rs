//! Servo data model: registration payload and live record.

use serde::{Deserialize, Serialize};

use super::error::{EngineError, ServoFlags};
use super::state::{AngleSource, Orientation};
use crate::consts::{
    DEFAULT_MAX_PULSE_US, DEFAULT_MIN_PULSE_US, ENVELOPE_MAX_DEG, ENVELOPE_MIN_DEG,
    MAX_CHANNELS, PULSE_ABS_MAX_US, PULSE_ABS_MIN_US,
};

/// Unique servo identifier.
pub type ServoId = String;

/// Static description of a servo, as registered or loaded from config.
///
/// ```toml
/// [[servos]]
/// id = "base"
/// channel = 0
/// min_deg = 10.0
/// max_deg = 170.0
/// orientation = "reversed"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServoSpec {
    pub id: ServoId,
    pub channel: u8,
    #[serde(default = "default_min_deg")]
    pub min_deg: f64,
    #[serde(default = "default_max_deg")]
    pub max_deg: f64,
    #[serde(default = "default_min_pulse")]
    pub min_pulse_us: u16,
    #[serde(default = "default_max_pulse")]
    pub max_pulse_us: u16,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Emergency-stop angle. Midpoint of the range when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_angle: Option<f64>,
    /// Angle at registration. The safe angle when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

fn default_min_deg() -> f64 {
    ENVELOPE_MIN_DEG
}
fn default_max_deg() -> f64 {
    ENVELOPE_MAX_DEG
}
fn default_min_pulse() -> u16 {
    DEFAULT_MIN_PULSE_US
}
fn default_max_pulse() -> u16 {
    DEFAULT_MAX_PULSE_US
}
fn default_true() -> bool {
    true
}

impl ServoSpec {
    /// Full-envelope spec with default pulse range.
    pub fn new(id: impl Into<ServoId>, channel: u8) -> Self {
        Self {
            id: id.into(),
            channel,
            min_deg: ENVELOPE_MIN_DEG,
            max_deg: ENVELOPE_MAX_DEG,
            min_pulse_us: DEFAULT_MIN_PULSE_US,
            max_pulse_us: DEFAULT_MAX_PULSE_US,
            orientation: Orientation::Normal,
            enabled: true,
            safe_angle: None,
            initial_angle: None,
            aliases: Vec::new(),
            notes: String::new(),
        }
    }

    pub fn with_range(mut self, min_deg: f64, max_deg: f64) -> Self {
        self.min_deg = min_deg;
        self.max_deg = max_deg;
        self
    }

    pub fn with_pulses(mut self, min_pulse_us: u16, max_pulse_us: u16) -> Self {
        self.min_pulse_us = min_pulse_us;
        self.max_pulse_us = max_pulse_us;
        self
    }

    pub fn reversed(mut self) -> Self {
        self.orientation = Orientation::Reversed;
        self
    }

    pub fn with_safe_angle(mut self, angle: f64) -> Self {
        self.safe_angle = Some(angle);
        self
    }

    pub fn safe_angle(&self) -> f64 {
        self.safe_angle
            .unwrap_or((self.min_deg + self.max_deg) / 2.0)
    }

    /// Checks everything that does not depend on other servos.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.id.trim().is_empty() {
            return Err(EngineError::InvalidIdentifier(self.id.clone()));
        }
        if let Some(alias) = self.aliases.iter().find(|a| a.trim().is_empty()) {
            return Err(EngineError::InvalidIdentifier(alias.clone()));
        }
        if usize::from(self.channel) >= MAX_CHANNELS {
            return Err(EngineError::InvalidChannel(self.channel));
        }
        validate_range(self.min_deg, self.max_deg)?;
        validate_pulses(self.min_pulse_us, self.max_pulse_us)?;
        for angle in [Some(self.safe_angle()), self.initial_angle]
            .into_iter()
            .flatten()
        {
            if !(self.min_deg..=self.max_deg).contains(&angle) {
                return Err(EngineError::OutOfRange {
                    id: self.id.clone(),
                    angle,
                    min: self.min_deg,
                    max: self.max_deg,
                });
            }
        }
        Ok(())
    }
}

/// `min < max`, both finite and inside the hardware envelope.
pub fn validate_range(min_deg: f64, max_deg: f64) -> Result<(), EngineError> {
    let ok = min_deg.is_finite()
        && max_deg.is_finite()
        && min_deg < max_deg
        && min_deg >= ENVELOPE_MIN_DEG
        && max_deg <= ENVELOPE_MAX_DEG;
    if ok {
        Ok(())
    } else {
        Err(EngineError::InvalidRange {
            min: min_deg,
            max: max_deg,
        })
    }
}

/// `min < max`, both inside the absolute pulse envelope.
pub fn validate_pulses(min_us: u16, max_us: u16) -> Result<(), EngineError> {
    if min_us < max_us && min_us >= PULSE_ABS_MIN_US && max_us <= PULSE_ABS_MAX_US {
        Ok(())
    } else {
        Err(EngineError::InvalidPulseRange { min_us, max_us })
    }
}

/// Live registry record of a servo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Servo {
    pub id: ServoId,
    pub channel: u8,
    pub min_deg: f64,
    pub max_deg: f64,
    pub min_pulse_us: u16,
    pub max_pulse_us: u16,
    pub orientation: Orientation,
    pub enabled: bool,
    pub current_angle: f64,
    pub safe_angle: f64,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub notes: String,
    /// Last output write failed.
    #[serde(default)]
    pub stale: bool,
    #[serde(default)]
    pub source: AngleSource,
}

impl Servo {
    /// Record for a validated spec.
    pub fn from_spec(spec: &ServoSpec) -> Self {
        let safe_angle = spec.safe_angle();
        Self {
            id: spec.id.clone(),
            channel: spec.channel,
            min_deg: spec.min_deg,
            max_deg: spec.max_deg,
            min_pulse_us: spec.min_pulse_us,
            max_pulse_us: spec.max_pulse_us,
            orientation: spec.orientation,
            enabled: spec.enabled,
            current_angle: spec.initial_angle.unwrap_or(safe_angle),
            safe_angle,
            aliases: spec.aliases.clone(),
            notes: spec.notes.clone(),
            stale: false,
            source: AngleSource::Hold,
        }
    }

    /// Spec that would recreate this servo at its current angle.
    pub fn to_spec(&self) -> ServoSpec {
        ServoSpec {
            id: self.id.clone(),
            channel: self.channel,
            min_deg: self.min_deg,
            max_deg: self.max_deg,
            min_pulse_us: self.min_pulse_us,
            max_pulse_us: self.max_pulse_us,
            orientation: self.orientation,
            enabled: self.enabled,
            safe_angle: Some(self.safe_angle),
            initial_angle: Some(self.current_angle),
            aliases: self.aliases.clone(),
            notes: self.notes.clone(),
        }
    }

    #[inline]
    pub fn contains(&self, angle: f64) -> bool {
        angle.is_finite() && angle >= self.min_deg && angle <= self.max_deg
    }

    #[inline]
    pub fn clamp(&self, angle: f64) -> f64 {
        angle.clamp(self.min_deg, self.max_deg)
    }

    /// `OutOfRange` unless `angle` lies inside the servo's range.
    pub fn check_angle(&self, angle: f64) -> Result<(), EngineError> {
        if self.contains(angle) {
            Ok(())
        } else {
            Err(EngineError::OutOfRange {
                id: self.id.clone(),
                angle,
                min: self.min_deg,
                max: self.max_deg,
            })
        }
    }

    /// Linear angle→pulse mapping, flipped for reversed servos.
    pub fn pulse_for(&self, angle: f64) -> u16 {
        let span = self.max_deg - self.min_deg;
        let mut fraction = ((self.clamp(angle) - self.min_deg) / span).clamp(0.0, 1.0);
        if self.orientation == Orientation::Reversed {
            fraction = 1.0 - fraction;
        }
        let pulse_span = f64::from(self.max_pulse_us - self.min_pulse_us);
        self.min_pulse_us + (fraction * pulse_span).round() as u16
    }

    pub fn flags(&self) -> ServoFlags {
        let mut flags = ServoFlags::empty();
        flags.set(ServoFlags::STALE, self.stale);
        flags.set(ServoFlags::DISABLED, !self.enabled);
        flags.set(ServoFlags::FORCED_SAFE, self.source == AngleSource::SafePose);
        flags
    }
}
