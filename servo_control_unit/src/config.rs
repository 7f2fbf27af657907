//! TOML configuration loader with validation.
//!
//! Loads [`EngineConfig`] from one TOML file and checks what the section
//! structs cannot check on their own: parameter bounds, servo id/alias and
//! channel uniqueness, safe-pose references and preset parameters.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use servo_common::config::{ConfigError, ConfigLoader};
use servo_common::engine::config::EngineConfig;
use servo_common::engine::servo::ServoSpec;
use tracing::{debug, info};

use crate::preset::PresetLibrary;

// ─── Loaded Config Bundle ───────────────────────────────────────────

/// Validated configuration, ready to build an engine from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: EngineConfig,
    /// Built-ins merged with `[presets.*]`.
    pub library: PresetLibrary,
}

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    debug!("Loading configuration from {}", path.display());
    let config = EngineConfig::load(path)?;
    let loaded = validate(config)?;
    info!(
        "Configuration '{}' loaded: {} servo(s), {} pose(s), {} preset(s)",
        loaded.config.shared.service_name,
        loaded.config.servos.len(),
        loaded.config.safe_poses.len(),
        loaded.library.len()
    );
    Ok(loaded)
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(toml: &str) -> Result<LoadedConfig, ConfigError> {
    validate(EngineConfig::load_str(toml)?)
}

fn validate(config: EngineConfig) -> Result<LoadedConfig, ConfigError> {
    config.validate().map_err(ConfigError::ValidationError)?;
    validate_servos(&config.servos)?;
    validate_safe_poses(&config)?;
    let library = PresetLibrary::with_entries(config.presets.clone())
        .map_err(|e| ConfigError::ValidationError(format!("preset: {e}")))?;
    Ok(LoadedConfig { config, library })
}

// ─── Servo Validation ───────────────────────────────────────────────

/// Per-servo checks plus uniqueness of ids, aliases and channels.
fn validate_servos(servos: &[ServoSpec]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    let mut channels: HashMap<u8, &str> = HashMap::new();
    for spec in servos {
        spec.validate()
            .map_err(|e| ConfigError::ValidationError(format!("servo '{}': {e}", spec.id)))?;
        for name in std::iter::once(&spec.id).chain(&spec.aliases) {
            if !names.insert(name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate servo identifier '{name}'"
                )));
            }
        }
        if let Some(owner) = channels.insert(spec.channel, &spec.id) {
            return Err(ConfigError::ValidationError(format!(
                "channel {} used by both '{owner}' and '{}'",
                spec.channel, spec.id
            )));
        }
    }
    Ok(())
}

// ─── Safe Pose Validation ───────────────────────────────────────────

/// Every pose names existing servos with angles inside their ranges.
fn validate_safe_poses(config: &EngineConfig) -> Result<(), ConfigError> {
    let lookup = |name: &str| {
        config.servos.iter().find(|s| {
            s.id == name
                || s.aliases.iter().any(|a| a == name)
                || name.parse::<u8>().is_ok_and(|ch| ch == s.channel)
        })
    };
    let mut seen = HashSet::new();
    for pose in &config.safe_poses {
        if pose.name.trim().is_empty() {
            return Err(ConfigError::ValidationError("safe pose with empty name".to_string()));
        }
        if !seen.insert(pose.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate safe pose '{}'",
                pose.name
            )));
        }
        for (servo, &angle) in &pose.angles {
            let spec = lookup(servo).ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "safe pose '{}' references unknown servo '{servo}'",
                    pose.name
                ))
            })?;
            if !(angle.is_finite() && (spec.min_deg..=spec.max_deg).contains(&angle)) {
                return Err(ConfigError::ValidationError(format!(
                    "safe pose '{}': {angle}° outside [{}, {}] of '{}'",
                    pose.name, spec.min_deg, spec.max_deg, spec.id
                )));
            }
        }
    }
    Ok(())
}
