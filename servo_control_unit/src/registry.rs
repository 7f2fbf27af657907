//! Servo registry: authoritative state of every actuator.
//!
//! Only the tick loop holds a `&mut ServoRegistry`. Every successful
//! mutation bumps [`ServoRegistry::revision`], so subscribers can detect
//! change by comparing one number. Failed operations leave the registry
//! untouched; angles are never clamped on the caller's behalf.

use std::collections::{BTreeMap, HashMap};

use servo_common::consts::{MAX_CHANNELS, PULSE_TYPICAL_MAX_US, PULSE_TYPICAL_MIN_US};
use servo_common::engine::error::EngineError;
use servo_common::engine::servo::{validate_pulses, validate_range, Servo, ServoId, ServoSpec};
use servo_common::engine::state::AngleSource;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct ServoRegistry {
    servos: BTreeMap<ServoId, Servo>,
    channels: [Option<ServoId>; MAX_CHANNELS],
    aliases: HashMap<String, ServoId>,
    revision: u64,
}

impl ServoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.servos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servos.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Servo> {
        self.servos.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.servos.contains_key(id)
    }

    /// Servos ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Servo> {
        self.servos.values()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Servo> {
        self.servos.values().filter(|s| s.enabled)
    }

    pub fn channel_owner(&self, channel: u8) -> Option<&ServoId> {
        self.channels.get(usize::from(channel))?.as_ref()
    }

    /// Canonical id for an id, alias or decimal channel number.
    pub fn resolve(&self, identifier: &str) -> Option<ServoId> {
        if self.servos.contains_key(identifier) {
            return Some(identifier.to_string());
        }
        if let Some(id) = self.aliases.get(identifier) {
            return Some(id.clone());
        }
        identifier
            .parse::<u8>()
            .ok()
            .and_then(|ch| self.channel_owner(ch))
            .cloned()
    }

    /// Like [`resolve`](Self::resolve), failing with `UnknownServo`.
    pub fn require(&self, identifier: &str) -> Result<ServoId, EngineError> {
        self.resolve(identifier)
            .ok_or_else(|| EngineError::UnknownServo(identifier.to_string()))
    }

    fn identifier_taken(&self, name: &str) -> bool {
        self.servos.contains_key(name) || self.aliases.contains_key(name)
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Add a servo.
    ///
    /// # Errors
    /// `DuplicateIdentifier` if the id or an alias is taken, `ChannelInUse`
    /// if the channel is owned, plus any [`ServoSpec::validate`] failure.
    pub fn register(&mut self, spec: ServoSpec) -> Result<(), EngineError> {
        spec.validate()?;
        if self.identifier_taken(&spec.id) {
            return Err(EngineError::DuplicateIdentifier(spec.id));
        }
        if let Some(owner) = self.channel_owner(spec.channel) {
            return Err(EngineError::ChannelInUse {
                channel: spec.channel,
                owner: owner.clone(),
            });
        }
        for (i, alias) in spec.aliases.iter().enumerate() {
            if *alias == spec.id || self.identifier_taken(alias) || spec.aliases[..i].contains(alias)
            {
                return Err(EngineError::DuplicateIdentifier(alias.clone()));
            }
        }

        let servo = Servo::from_spec(&spec);
        for alias in &servo.aliases {
            self.aliases.insert(alias.clone(), servo.id.clone());
        }
        self.channels[usize::from(servo.channel)] = Some(servo.id.clone());
        info!(
            "Registered servo '{}' on channel {} [{}, {}]°",
            servo.id, servo.channel, servo.min_deg, servo.max_deg
        );
        self.servos.insert(servo.id.clone(), servo);
        self.bump();
        Ok(())
    }

    pub fn deregister(&mut self, id: &str) -> Result<Servo, EngineError> {
        let servo = self
            .servos
            .remove(id)
            .ok_or_else(|| EngineError::UnknownServo(id.to_string()))?;
        self.channels[usize::from(servo.channel)] = None;
        self.aliases.retain(|_, owner| owner != id);
        info!("Deregistered servo '{}' (channel {})", servo.id, servo.channel);
        self.bump();
        Ok(servo)
    }

    /// Give a servo a new canonical id. Channel, aliases and state move
    /// with it. Renaming to the current id is a no-op.
    ///
    /// # Errors
    /// `UnknownServo`, `InvalidIdentifier` for a blank id, or
    /// `DuplicateIdentifier` if `new_id` is an id or alias in use.
    pub fn rename(&mut self, id: &str, new_id: &str) -> Result<(), EngineError> {
        if !self.servos.contains_key(id) {
            return Err(EngineError::UnknownServo(id.to_string()));
        }
        if new_id.trim().is_empty() {
            return Err(EngineError::InvalidIdentifier(new_id.to_string()));
        }
        if new_id == id {
            return Ok(());
        }
        if self.identifier_taken(new_id) {
            return Err(EngineError::DuplicateIdentifier(new_id.to_string()));
        }
        let mut servo = self
            .servos
            .remove(id)
            .ok_or_else(|| EngineError::UnknownServo(id.to_string()))?;
        servo.id = new_id.to_string();
        self.channels[usize::from(servo.channel)] = Some(servo.id.clone());
        for owner in self.aliases.values_mut() {
            if owner == id {
                *owner = servo.id.clone();
            }
        }
        info!("Renamed servo '{id}' to '{new_id}' (channel {})", servo.channel);
        self.servos.insert(servo.id.clone(), servo);
        self.bump();
        Ok(())
    }

    // ─── Mutation ───────────────────────────────────────────────────

    pub fn enable(&mut self, id: &str) -> Result<(), EngineError> {
        self.set_enabled(id, true)
    }

    /// Freeze `current_angle` and exclude the servo from arbitration.
    pub fn disable(&mut self, id: &str) -> Result<(), EngineError> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), EngineError> {
        let servo = self.get_mut(id)?;
        if servo.enabled == enabled {
            return Ok(());
        }
        servo.enabled = enabled;
        if !enabled {
            servo.source = AngleSource::Hold;
        }
        debug!("Servo '{id}' enabled={enabled}");
        self.bump();
        Ok(())
    }

    /// Store a new angle. Returns whether the angle changed.
    ///
    /// # Errors
    /// `OutOfRange` outside `[min_deg, max_deg]` (nothing applied),
    /// `ServoDisabled` for disabled servos.
    pub fn set_angle(&mut self, id: &str, angle: f64) -> Result<bool, EngineError> {
        let servo = self.get_mut(id)?;
        if !servo.enabled {
            return Err(EngineError::ServoDisabled(id.to_string()));
        }
        servo.check_angle(angle)?;
        if servo.current_angle == angle {
            return Ok(false);
        }
        servo.current_angle = angle;
        self.bump();
        Ok(true)
    }

    /// Record which source drove the servo. Not a revision change.
    pub fn set_source(&mut self, id: &str, source: AngleSource) {
        if let Some(servo) = self.servos.get_mut(id) {
            servo.source = source;
        }
    }

    /// Flag or clear a failed output write. Returns whether the flag changed.
    pub fn mark_stale(&mut self, id: &str, stale: bool) -> bool {
        let Some(servo) = self.servos.get_mut(id) else {
            return false;
        };
        if servo.stale == stale {
            return false;
        }
        servo.stale = stale;
        self.bump();
        true
    }

    pub fn add_alias(&mut self, id: &str, alias: &str) -> Result<(), EngineError> {
        if !self.servos.contains_key(id) {
            return Err(EngineError::UnknownServo(id.to_string()));
        }
        if alias.trim().is_empty() {
            return Err(EngineError::InvalidIdentifier(alias.to_string()));
        }
        if self.identifier_taken(alias) {
            return Err(EngineError::DuplicateIdentifier(alias.to_string()));
        }
        self.aliases.insert(alias.to_string(), id.to_string());
        self.get_mut(id)?.aliases.push(alias.to_string());
        self.bump();
        Ok(())
    }

    /// Narrow or widen the soft angular limits.
    ///
    /// Rejected if the current or safe angle would fall outside.
    pub fn set_limits(&mut self, id: &str, min_deg: f64, max_deg: f64) -> Result<(), EngineError> {
        validate_range(min_deg, max_deg)?;
        let servo = self.get_mut(id)?;
        for angle in [servo.current_angle, servo.safe_angle] {
            if !(min_deg..=max_deg).contains(&angle) {
                return Err(EngineError::OutOfRange {
                    id: id.to_string(),
                    angle,
                    min: min_deg,
                    max: max_deg,
                });
            }
        }
        servo.min_deg = min_deg;
        servo.max_deg = max_deg;
        info!("Servo '{id}' limits set to [{min_deg}, {max_deg}]°");
        self.bump();
        Ok(())
    }

    /// Replace the pulse-width calibration.
    pub fn calibrate(&mut self, id: &str, min_pulse_us: u16, max_pulse_us: u16) -> Result<(), EngineError> {
        validate_pulses(min_pulse_us, max_pulse_us)?;
        if min_pulse_us < PULSE_TYPICAL_MIN_US || max_pulse_us > PULSE_TYPICAL_MAX_US {
            warn!(
                "Servo '{id}' calibration [{min_pulse_us}, {max_pulse_us}] µs outside typical \
                 [{PULSE_TYPICAL_MIN_US}, {PULSE_TYPICAL_MAX_US}] µs"
            );
        }
        let servo = self.get_mut(id)?;
        servo.min_pulse_us = min_pulse_us;
        servo.max_pulse_us = max_pulse_us;
        self.bump();
        Ok(())
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Servo, EngineError> {
        self.servos
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownServo(id.to_string()))
    }

    #[inline]
    fn bump(&mut self) {
        self.revision += 1;
    }
}
