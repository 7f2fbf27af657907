//! Named safe poses.
//!
//! Config poses list explicit angles; the built-ins are computed from the
//! registry at invocation time so they follow later `set_limits` calls.

use std::collections::BTreeMap;

use servo_common::engine::error::EngineError;
use servo_common::engine::safety::SafePose;
use servo_common::engine::servo::{Servo, ServoId};
use tracing::{debug, warn};

use crate::registry::ServoRegistry;

/// Every enabled servo at its safe angle.
pub const PARK: &str = "park";
/// Every enabled servo folded toward the low end of its range.
pub const RETRACT: &str = "retract";

const RETRACT_CEILING_DEG: f64 = 45.0;

#[derive(Debug, Clone, Default)]
pub struct SafePoseBook {
    poses: BTreeMap<String, SafePose>,
}

impl SafePoseBook {
    pub fn new(poses: impl IntoIterator<Item = SafePose>) -> Self {
        Self {
            poses: poses.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    /// Config poses shadow built-ins of the same name.
    pub fn insert(&mut self, pose: SafePose) {
        self.poses.insert(pose.name.clone(), pose);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.poses.contains_key(name) || matches!(name, PARK | RETRACT)
    }

    /// Config poses, in name order.
    pub fn poses(&self) -> impl Iterator<Item = &SafePose> {
        self.poses.values()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.poses.keys().cloned().collect();
        for builtin in [PARK, RETRACT] {
            if !self.poses.contains_key(builtin) {
                names.push(builtin.to_string());
            }
        }
        names.sort();
        names
    }

    /// Re-key pose entries that name `id` directly. Alias and channel
    /// keys keep resolving on their own.
    pub fn rename_servo(&mut self, id: &str, new_id: &str) {
        for pose in self.poses.values_mut() {
            if let Some(angle) = pose.angles.remove(id) {
                pose.angles.insert(new_id.to_string(), angle);
            }
        }
    }

    /// Target angles for `name` against the current registry.
    ///
    /// Disabled servos are left out. Angles that no longer fit a servo's
    /// range are skipped with a warning rather than clamped.
    ///
    /// # Errors
    /// `UnknownPose` when no pose carries that name.
    pub fn resolve(&self, name: &str, registry: &ServoRegistry) -> Result<Vec<(ServoId, f64)>, EngineError> {
        if let Some(pose) = self.poses.get(name) {
            return Ok(resolve_listed(pose, registry));
        }
        let target: fn(&Servo) -> f64 = match name {
            PARK => |s| s.safe_angle,
            RETRACT => |s| s.clamp(((s.min_deg + s.max_deg) / 2.0).min(RETRACT_CEILING_DEG)),
            _ => return Err(EngineError::UnknownPose(name.to_string())),
        };
        Ok(registry.enabled().map(|s| (s.id.clone(), target(s))).collect())
    }
}

fn resolve_listed(pose: &SafePose, registry: &ServoRegistry) -> Vec<(ServoId, f64)> {
    let mut out = Vec::with_capacity(pose.angles.len());
    for (ident, &angle) in &pose.angles {
        let Some(servo) = registry.resolve(ident).and_then(|id| registry.get(&id)) else {
            warn!("Safe pose '{}' references unknown servo '{ident}', skipped", pose.name);
            continue;
        };
        if !servo.enabled {
            debug!("Safe pose '{}': '{}' disabled, skipped", pose.name, servo.id);
            continue;
        }
        if !servo.contains(angle) {
            warn!(
                "Safe pose '{}': {angle}° outside [{}, {}]° for '{}', skipped",
                pose.name, servo.min_deg, servo.max_deg, servo.id
            );
            continue;
        }
        out.push((servo.id.clone(), angle));
    }
    out
}
