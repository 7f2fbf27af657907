//! Running preset instances and target ownership.
//!
//! Each servo is owned by at most one instance. Starting an instance on an
//! owned target takes the target over; an instance left without targets is
//! destroyed. Preset time is `(now - start - paused) * rate`.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use servo_common::engine::error::EngineError;
use servo_common::engine::preset::{PresetDefinition, PresetSource};
use servo_common::engine::servo::ServoId;
use servo_common::engine::snapshot::PresetSnapshot;
use tracing::{debug, info};

use super::library::PresetLibrary;
use super::waveform::Sampler;
use crate::registry::ServoRegistry;

/// Arguments of a preset start, after identifier resolution.
#[derive(Debug, Clone)]
pub struct PresetStart {
    pub name: Option<String>,
    pub source: PresetSource,
    pub targets: Vec<ServoId>,
    pub rate: Option<f64>,
}

#[derive(Debug)]
pub struct PresetInstance {
    name: String,
    sampler: Sampler,
    /// Target id and its lane in the sampler, in start order.
    targets: Vec<(ServoId, usize)>,
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
    rate: f64,
    generation: u64,
    last_t_ms: Option<f64>,
}

impl PresetInstance {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &PresetDefinition {
        self.sampler.definition()
    }

    pub fn targets(&self) -> impl Iterator<Item = &ServoId> {
        self.targets.iter().map(|(id, _)| id)
    }

    #[inline]
    pub const fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    #[inline]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Preset time in milliseconds.
    pub fn elapsed_ms(&self, now: Instant) -> f64 {
        let reference = self.paused_at.unwrap_or(now);
        let running = reference
            .saturating_duration_since(self.started)
            .saturating_sub(self.paused_total);
        running.as_nanos() as f64 / 1e6 * self.rate
    }

    fn snapshot(&self, now: Instant) -> PresetSnapshot {
        PresetSnapshot {
            name: self.name.clone(),
            kind: self.definition().kind(),
            targets: self.targets().cloned().collect(),
            paused: self.is_paused(),
            rate: self.rate,
            elapsed_ms: self.elapsed_ms(now),
            generation: self.generation,
        }
    }
}

#[derive(Debug, Default)]
pub struct PresetEngine {
    library: PresetLibrary,
    instances: BTreeMap<String, PresetInstance>,
    owners: HashMap<ServoId, String>,
    generation: u64,
}

impl PresetEngine {
    pub fn new(library: PresetLibrary) -> Self {
        Self {
            library,
            ..Self::default()
        }
    }

    pub fn library(&self) -> &PresetLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut PresetLibrary {
        &mut self.library
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PresetInstance> {
        self.instances.get(name)
    }

    /// Instance currently driving `id`.
    pub fn owner(&self, id: &str) -> Option<&str> {
        self.owners.get(id).map(String::as_str)
    }

    /// Monotonic counter of started instances.
    #[inline]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Start an instance. Returns its name.
    ///
    /// # Errors
    /// `UnknownPreset`, `InvalidPresetParams`, `NoTargets` or `InvalidRate`.
    /// Nothing changes on error.
    pub fn start(&mut self, request: PresetStart, now: Instant) -> Result<String, EngineError> {
        let PresetStart {
            name,
            source,
            targets,
            rate,
        } = request;
        let (library_name, definition) = match source {
            PresetSource::Named(n) => {
                let def = self.library.get(&n)?.clone();
                (Some(n), def)
            }
            PresetSource::Inline(def) => (None, def),
        };
        definition.validate()?;

        let mut unique: Vec<ServoId> = Vec::with_capacity(targets.len());
        for t in targets {
            if !unique.contains(&t) {
                unique.push(t);
            }
        }
        if unique.is_empty() {
            return Err(EngineError::NoTargets);
        }
        let rate = rate.unwrap_or(1.0);
        if !(rate.is_finite() && rate > 0.0) {
            return Err(EngineError::InvalidRate(rate));
        }

        self.generation += 1;
        let name = name
            .filter(|n| !n.trim().is_empty())
            .or(library_name)
            .unwrap_or_else(|| format!("{}-{}", definition.kind(), self.generation));

        if self.instances.contains_key(&name) {
            info!("Preset '{name}' restarted");
            self.stop(&name);
        }
        for target in &unique {
            self.release_target(target);
        }
        for target in &unique {
            self.owners.insert(target.clone(), name.clone());
        }

        info!(
            "Preset '{name}' ({}) started on {:?} at rate {rate}",
            definition.kind(),
            unique
        );
        let instance = PresetInstance {
            name: name.clone(),
            sampler: Sampler::new(definition, unique.len()),
            targets: unique.into_iter().enumerate().map(|(i, id)| (id, i)).collect(),
            started: now,
            paused_at: None,
            paused_total: Duration::ZERO,
            rate,
            generation: self.generation,
            last_t_ms: None,
        };
        self.instances.insert(name.clone(), instance);
        Ok(name)
    }

    /// Destroy an instance. Idempotent; returns whether one existed.
    pub fn stop(&mut self, name: &str) -> bool {
        let Some(instance) = self.instances.remove(name) else {
            return false;
        };
        for (id, _) in &instance.targets {
            if self.owners.get(id).is_some_and(|owner| owner == name) {
                self.owners.remove(id);
            }
        }
        info!("Preset '{name}' stopped");
        true
    }

    /// Destroy every instance. Returns how many were running.
    pub fn stop_all(&mut self) -> usize {
        let count = self.instances.len();
        self.instances.clear();
        self.owners.clear();
        if count > 0 {
            info!("Stopped {count} preset(s)");
        }
        count
    }

    pub fn pause(&mut self, name: &str, now: Instant) -> Result<(), EngineError> {
        let instance = self.instance_mut(name)?;
        if instance.paused_at.is_none() {
            instance.paused_at = Some(now);
            debug!("Preset '{name}' paused");
        }
        Ok(())
    }

    pub fn resume(&mut self, name: &str, now: Instant) -> Result<(), EngineError> {
        let instance = self.instance_mut(name)?;
        if let Some(since) = instance.paused_at.take() {
            instance.paused_total += now.saturating_duration_since(since);
            debug!("Preset '{name}' resumed");
        }
        Ok(())
    }

    /// Drop `id` from whichever instance owns it.
    pub fn release_target(&mut self, id: &str) {
        let Some(owner) = self.owners.remove(id) else {
            return;
        };
        let Some(instance) = self.instances.get_mut(&owner) else {
            return;
        };
        instance.targets.retain(|(t, _)| t != id);
        debug!("Preset '{owner}' released '{id}'");
        if instance.targets.is_empty() {
            self.instances.remove(&owner);
            info!("Preset '{owner}' destroyed: no targets left");
        }
    }

    /// Point ownership and the owning instance's lane at a renamed servo.
    pub fn rename_target(&mut self, id: &str, new_id: &str) {
        let Some(owner) = self.owners.remove(id) else {
            return;
        };
        if let Some(instance) = self.instances.get_mut(&owner) {
            for (t, _) in instance.targets.iter_mut().filter(|(t, _)| t == id) {
                *t = new_id.to_string();
            }
        }
        self.owners.insert(new_id.to_string(), owner);
    }

    /// One clamped sample per enabled target of every running instance.
    pub fn sample(&mut self, now: Instant, registry: &ServoRegistry) -> Vec<(ServoId, f64)> {
        let mut out = Vec::new();
        for instance in self.instances.values_mut() {
            if instance.is_paused() {
                continue;
            }
            let t = instance.elapsed_ms(now);
            let dt = instance.last_t_ms.map_or(0.0, |last| (t - last).max(0.0));
            instance.last_t_ms = Some(t);
            for (id, lane) in &instance.targets {
                let Some(servo) = registry.get(id).filter(|s| s.enabled) else {
                    continue;
                };
                let angle = instance
                    .sampler
                    .sample(*lane, t, dt, servo.min_deg, servo.max_deg);
                out.push((id.clone(), angle));
            }
        }
        out
    }

    pub fn snapshot(&self, now: Instant) -> Vec<PresetSnapshot> {
        self.instances.values().map(|i| i.snapshot(now)).collect()
    }

    fn instance_mut(&mut self, name: &str) -> Result<&mut PresetInstance, EngineError> {
        self.instances
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownPreset(name.to_string()))
    }
}
