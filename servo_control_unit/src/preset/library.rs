//! Named preset library: built-in behaviours plus `[presets.*]` entries.

use std::collections::BTreeMap;

use servo_common::engine::error::EngineError;
use servo_common::engine::preset::{
    BreathParams, PresetDefinition, RippleParams, SineParams, SwarmParams, SweepParams,
    TwitchParams,
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PresetLibrary {
    entries: BTreeMap<String, PresetDefinition>,
}

impl PresetLibrary {
    /// Built-in entries only.
    pub fn builtin() -> Self {
        let entries = [
            ("breathe", PresetDefinition::Breath(BreathParams::default())),
            ("twitch", PresetDefinition::Twitch(TwitchParams::default())),
            (
                "quiver",
                PresetDefinition::Sine(SineParams {
                    center: 90.0,
                    amplitude: 2.0,
                    // 8 Hz
                    period_ms: 125.0,
                    phase: 0.0,
                }),
            ),
            (
                "nod",
                PresetDefinition::Pingpong(SweepParams {
                    min_angle: 75.0,
                    max_angle: 105.0,
                    period_ms: 1500.0,
                }),
            ),
            ("ripple", PresetDefinition::Ripple(RippleParams::default())),
            ("swarm", PresetDefinition::Swarm(SwarmParams::default())),
        ]
        .into_iter()
        .map(|(name, def)| (name.to_string(), def))
        .collect();
        Self { entries }
    }

    /// Built-ins overlaid with validated config entries.
    pub fn with_entries(
        entries: impl IntoIterator<Item = (String, PresetDefinition)>,
    ) -> Result<Self, EngineError> {
        let mut lib = Self::builtin();
        for (name, def) in entries {
            lib.insert(name, def)?;
        }
        Ok(lib)
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, name: String, def: PresetDefinition) -> Result<(), EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidPresetParams("empty preset name".to_string()));
        }
        def.validate()?;
        if self.entries.insert(name.clone(), def).is_some() {
            debug!("Preset library entry '{name}' replaced");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&PresetDefinition, EngineError> {
        self.entries
            .get(name)
            .ok_or_else(|| EngineError::UnknownPreset(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &PresetDefinition)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PresetLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}
