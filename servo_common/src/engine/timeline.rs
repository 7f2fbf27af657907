//! Authored timeline data: tracks of keyframes, markers and loop region.
//!
//! Keyframes of a track are kept sorted by strictly increasing `time_ms`;
//! [`Track::upsert`] is the only way in and replaces on identical time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::servo::ServoId;
use crate::consts::DEFAULT_TIMELINE_DURATION_MS;

/// Easing of the segment that ends at a keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    Bounce,
    Elastic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time_ms: f64,
    pub angle: f64,
    #[serde(default)]
    pub ease: Ease,
}

impl Keyframe {
    pub const fn linear(time_ms: f64, angle: f64) -> Self {
        Self {
            time_ms,
            angle,
            ease: Ease::Linear,
        }
    }
}

/// Keyframes of one servo.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawTrack")]
pub struct Track {
    keyframes: Vec<Keyframe>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
}

impl Track {
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn last_time_ms(&self) -> Option<f64> {
        self.keyframes.last().map(|k| k.time_ms)
    }

    /// Insert in time order. A keyframe at an identical time is replaced.
    pub fn upsert(&mut self, keyframe: Keyframe) {
        match self
            .keyframes
            .binary_search_by(|k| k.time_ms.total_cmp(&keyframe.time_ms))
        {
            Ok(i) => self.keyframes[i] = keyframe,
            Err(i) => self.keyframes.insert(i, keyframe),
        }
    }

    /// Remove the keyframe at exactly `time_ms`.
    pub fn remove_at(&mut self, time_ms: f64) -> Option<Keyframe> {
        let i = self
            .keyframes
            .binary_search_by(|k| k.time_ms.total_cmp(&time_ms))
            .ok()?;
        Some(self.keyframes.remove(i))
    }

    /// Keep only keyframes for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&Keyframe) -> bool) {
        self.keyframes.retain(keep);
    }

    /// Rebuild from arbitrary keyframes, restoring order.
    pub fn from_keyframes(keyframes: impl IntoIterator<Item = Keyframe>) -> Self {
        let mut track = Self::default();
        for k in keyframes {
            track.upsert(k);
        }
        track
    }
}

/// Unordered wire form; converted through [`Track::upsert`].
#[derive(Deserialize)]
struct RawTrack {
    #[serde(default)]
    keyframes: Vec<Keyframe>,
    #[serde(default)]
    muted: bool,
    #[serde(default)]
    solo: bool,
}

impl From<RawTrack> for Track {
    fn from(raw: RawTrack) -> Self {
        let mut track = Track::from_keyframes(raw.keyframes);
        track.muted = raw.muted;
        track.solo = raw.solo;
        track
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub label: String,
    pub time_ms: f64,
}

/// Loop region. `end_ms` of `None` means the end of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoopRegion {
    pub enabled: bool,
    #[serde(default)]
    pub start_ms: f64,
    #[serde(default)]
    pub end_ms: Option<f64>,
}

/// Authored timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeline {
    pub duration_ms: f64,
    #[serde(rename = "loop")]
    pub looping: LoopRegion,
    pub markers: Vec<Marker>,
    pub tracks: BTreeMap<ServoId, Track>,
    /// Snap recorded/added keyframes to this grid.
    pub quantize_ms: Option<f64>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_TIMELINE_DURATION_MS,
            looping: LoopRegion::default(),
            markers: Vec::new(),
            tracks: BTreeMap::new(),
            quantize_ms: None,
        }
    }
}

impl Timeline {
    /// Longer of the authored duration and the last keyframe.
    pub fn effective_duration_ms(&self) -> f64 {
        self.tracks
            .values()
            .filter_map(Track::last_time_ms)
            .fold(self.duration_ms, f64::max)
    }

    pub fn marker(&self, label: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.label == label)
    }

    pub fn any_solo(&self) -> bool {
        self.tracks.values().any(|t| t.solo)
    }

    /// Tracks that produce output: not muted, and soloed if any track is.
    pub fn audible_tracks(&self) -> impl Iterator<Item = (&ServoId, &Track)> {
        let solo = self.any_solo();
        self.tracks
            .iter()
            .filter(move |(_, t)| !t.muted && (!solo || t.solo) && !t.is_empty())
    }
}
