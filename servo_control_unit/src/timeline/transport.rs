//! Transport state machine and the authored timeline it plays.
//!
//! ```text
//!            play                 pause
//!  STOPPED ───────▶ PLAYING ◀──────────▶ PAUSED
//!     ▲  record        │ ▲    resume       │
//!     │                ▼ │ play            │ record
//!     └──── stop ── RECORDING ◀────────────┘
//! ```
//!
//! The clock advances while PLAYING or RECORDING; only PLAYING drives
//! servos. A scrub schedules a one-shot sample in any mode.

use std::time::Instant;

use servo_common::engine::command::{TimelineEdit, TransportCommand};
use servo_common::engine::error::EngineError;
use servo_common::engine::servo::ServoId;
use servo_common::engine::snapshot::TimelineSnapshot;
use servo_common::engine::state::TransportMode;
use servo_common::engine::timeline::{Keyframe, LoopRegion, Marker, Timeline, Track};
use tracing::{debug, info, warn};

use super::track;
use crate::registry::ServoRegistry;

#[derive(Debug)]
pub struct TimelineEngine {
    timeline: Timeline,
    mode: TransportMode,
    time_ms: f64,
    rate: f64,
    last_advance: Option<Instant>,
    /// Emit one sample at the next resolution even if not PLAYING.
    scrubbed: bool,
    /// End reached this tick: emit the final sample, then stop.
    at_end: bool,
    record_targets: Option<Vec<ServoId>>,
}

impl Default for TimelineEngine {
    fn default() -> Self {
        Self::new(Timeline::default())
    }
}

impl TimelineEngine {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            mode: TransportMode::Stopped,
            time_ms: 0.0,
            rate: 1.0,
            last_advance: None,
            scrubbed: false,
            at_end: false,
            record_targets: None,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    #[inline]
    pub const fn mode(&self) -> TransportMode {
        self.mode
    }

    #[inline]
    pub const fn time_ms(&self) -> f64 {
        self.time_ms
    }

    #[inline]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    // ─── Clock ──────────────────────────────────────────────────────

    /// Move the transport clock to `now`. Called once at the top of every tick.
    pub fn advance(&mut self, now: Instant) {
        let last = self.last_advance.replace(now);
        if !self.mode.clock_running() {
            return;
        }
        let Some(last) = last else {
            return;
        };
        let elapsed_ms = now.saturating_duration_since(last).as_nanos() as f64 / 1e6;
        self.time_ms += elapsed_ms * self.rate;

        match self.mode {
            TransportMode::Playing => self.handle_end(),
            TransportMode::Recording => {
                // Recording extends the take instead of ending it.
                if self.time_ms > self.timeline.duration_ms {
                    self.timeline.duration_ms = self.time_ms;
                }
            }
            _ => {}
        }
    }

    fn handle_end(&mut self) {
        let end = self.timeline.effective_duration_ms();
        let LoopRegion {
            enabled,
            start_ms,
            end_ms,
        } = self.timeline.looping;
        if enabled {
            let loop_end = end_ms.map_or(end, |e| e.min(end));
            let span = loop_end - start_ms;
            if self.time_ms >= loop_end && span > 0.0 {
                self.time_ms = start_ms + (self.time_ms - loop_end).rem_euclid(span);
                debug!("Timeline looped to {:.1} ms", self.time_ms);
                return;
            }
        }
        if self.time_ms >= end {
            self.time_ms = end;
            self.at_end = true;
        }
    }

    /// Angles for every audible track at the current time, or nothing when
    /// the timeline is not driving. Consumes a pending scrub and performs
    /// the stop after the final sample at the end.
    pub fn sample(&mut self) -> Vec<(ServoId, f64)> {
        let emit = self.mode == TransportMode::Playing || self.scrubbed;
        self.scrubbed = false;
        if !emit {
            return Vec::new();
        }
        let t = self.time_ms;
        let out = self
            .timeline
            .audible_tracks()
            .filter_map(|(id, tr)| track::sample(tr, t).map(|a| (id.clone(), a)))
            .collect();
        if self.at_end {
            info!("Timeline reached end at {t:.1} ms, stopping");
            self.reset_to_stopped();
        }
        out
    }

    fn reset_to_stopped(&mut self) {
        self.mode = TransportMode::Stopped;
        self.time_ms = 0.0;
        self.at_end = false;
        self.record_targets = None;
    }

    /// Stop for a safety event. Pending scrubs are discarded.
    pub fn halt(&mut self) {
        if self.mode != TransportMode::Stopped {
            warn!("Timeline halted from {:?}", self.mode);
        }
        self.reset_to_stopped();
        self.scrubbed = false;
    }

    // ─── Transport ──────────────────────────────────────────────────

    /// Apply a transport command. `Record` targets must already be
    /// canonical servo ids.
    pub fn apply_transport(&mut self, command: TransportCommand, now: Instant) -> Result<(), EngineError> {
        use TransportCommand as C;
        use TransportMode as M;

        let invalid = |command: &TransportCommand, mode| EngineError::InvalidTransport {
            command: command.name(),
            mode,
        };
        let from = self.mode;
        match (from, &command) {
            (M::Playing, C::Play) => {}
            (_, C::Play) => {
                self.mode = M::Playing;
                self.record_targets = None;
            }
            (M::Playing | M::Recording, C::Pause) => self.mode = M::Paused,
            (M::Paused, C::Pause) => {}
            (M::Stopped, C::Pause) => return Err(invalid(&command, from)),
            (M::Paused, C::Resume) => self.mode = M::Playing,
            (_, C::Resume) => return Err(invalid(&command, from)),
            (_, C::Stop) => self.reset_to_stopped(),
            (_, C::Scrub { time_ms }) => self.scrub(*time_ms)?,
            (_, C::Jump { label }) => {
                let marker = self
                    .timeline
                    .marker(label)
                    .ok_or_else(|| EngineError::UnknownMarker(label.clone()))?;
                let t = marker.time_ms;
                self.scrub(t)?;
            }
            (_, C::Record { targets }) => {
                self.mode = M::Recording;
                self.record_targets = targets.clone();
            }
            (_, C::SetRate { rate }) => {
                if !(rate.is_finite() && *rate > 0.0) {
                    return Err(EngineError::InvalidRate(*rate));
                }
                self.rate = *rate;
            }
        }
        if command.starts_motion() {
            self.last_advance = Some(now);
        }
        if self.mode != from {
            info!("Transport {from:?} -> {:?} ({})", self.mode, command.name());
        }
        Ok(())
    }

    fn scrub(&mut self, time_ms: f64) -> Result<(), EngineError> {
        if !time_ms.is_finite() {
            return Err(EngineError::InvalidTimeline(format!("scrub to {time_ms}")));
        }
        self.time_ms = time_ms.clamp(0.0, self.timeline.effective_duration_ms());
        self.at_end = false;
        self.scrubbed = true;
        debug!("Timeline scrubbed to {:.1} ms", self.time_ms);
        Ok(())
    }

    // ─── Recording ──────────────────────────────────────────────────

    /// Capture an accepted live angle. Returns whether a keyframe was written.
    pub fn record(&mut self, id: &str, angle: f64) -> bool {
        if self.mode != TransportMode::Recording {
            return false;
        }
        if let Some(targets) = &self.record_targets {
            if !targets.iter().any(|t| t == id) {
                return false;
            }
        }
        let t = track::quantize(self.time_ms, self.timeline.quantize_ms).max(0.0);
        self.timeline
            .tracks
            .entry(id.to_string())
            .or_default()
            .upsert(Keyframe::linear(t, angle));
        if t > self.timeline.duration_ms {
            self.timeline.duration_ms = t;
        }
        debug!("Recorded '{id}' = {angle}° at {t:.1} ms");
        true
    }

    /// Move a servo's track and record target to a new id.
    ///
    /// # Errors
    /// `DuplicateIdentifier` if a track already uses `new_id`.
    pub fn check_rename(&self, new_id: &str) -> Result<(), EngineError> {
        if self.timeline.tracks.contains_key(new_id) {
            return Err(EngineError::DuplicateIdentifier(new_id.to_string()));
        }
        Ok(())
    }

    /// Caller runs [`Self::check_rename`] first.
    pub fn rename_track(&mut self, id: &str, new_id: &str) {
        if let Some(track) = self.timeline.tracks.remove(id) {
            self.timeline.tracks.insert(new_id.to_string(), track);
        }
        if let Some(targets) = &mut self.record_targets {
            for t in targets.iter_mut().filter(|t| *t == id) {
                *t = new_id.to_string();
            }
        }
    }

    // ─── Editing ────────────────────────────────────────────────────

    /// Apply an edit. Servo names must already be canonical ids.
    ///
    /// # Errors
    /// `OutOfRange` for keyframe angles outside the servo range,
    /// `UnknownServo` for keyframes on unregistered servos and
    /// `InvalidTimeline` for everything else malformed.
    pub fn apply_edit(&mut self, edit: TimelineEdit, registry: &ServoRegistry) -> Result<(), EngineError> {
        match edit {
            TimelineEdit::AddKeyframe {
                servo,
                time_ms,
                angle,
                ease,
            } => {
                check_time("keyframe time", time_ms)?;
                registry
                    .get(&servo)
                    .ok_or_else(|| EngineError::UnknownServo(servo.clone()))?
                    .check_angle(angle)?;
                let time_ms = track::quantize(time_ms, self.timeline.quantize_ms);
                self.timeline.tracks.entry(servo).or_default().upsert(Keyframe {
                    time_ms,
                    angle,
                    ease,
                });
            }
            TimelineEdit::RemoveKeyframe { servo, time_ms } => {
                self.track_mut(&servo)?
                    .remove_at(time_ms)
                    .ok_or_else(|| {
                        EngineError::InvalidTimeline(format!("no keyframe for '{servo}' at {time_ms} ms"))
                    })?;
                self.fit_to_duration();
            }
            TimelineEdit::ClearTrack { servo } => {
                self.timeline.tracks.remove(&servo);
                self.fit_to_duration();
            }
            TimelineEdit::SetDuration { duration_ms } => {
                if !(duration_ms.is_finite() && duration_ms > 0.0) {
                    return Err(EngineError::InvalidTimeline(format!("duration {duration_ms}")));
                }
                self.timeline.duration_ms = duration_ms;
                self.fit_to_duration();
            }
            TimelineEdit::SetLoop {
                enabled,
                start_ms,
                end_ms,
            } => {
                let region = LoopRegion {
                    enabled,
                    start_ms,
                    end_ms,
                };
                check_loop(&region, self.timeline.effective_duration_ms())?;
                self.timeline.looping = region;
            }
            TimelineEdit::SetQuantize { grid_ms } => {
                if let Some(grid) = grid_ms {
                    if !(grid.is_finite() && grid > 0.0) {
                        return Err(EngineError::InvalidTimeline(format!("quantize grid {grid}")));
                    }
                }
                self.timeline.quantize_ms = grid_ms;
            }
            TimelineEdit::AddMarker(marker) => {
                if marker.label.trim().is_empty() {
                    return Err(EngineError::InvalidTimeline("empty marker label".to_string()));
                }
                check_time("marker time", marker.time_ms)?;
                self.timeline.markers.retain(|m| m.label != marker.label);
                self.timeline.markers.push(marker);
                self.timeline
                    .markers
                    .sort_by(|a: &Marker, b: &Marker| a.time_ms.total_cmp(&b.time_ms));
            }
            TimelineEdit::Mute { servo, muted } => self.track_mut(&servo)?.muted = muted,
            TimelineEdit::Solo { servo, solo } => self.track_mut(&servo)?.solo = solo,
            TimelineEdit::Simplify { servo, tolerance } => {
                if !(tolerance.is_finite() && tolerance >= 0.0) {
                    return Err(EngineError::InvalidTimeline(format!("tolerance {tolerance}")));
                }
                let removed = track::simplify(self.track_mut(&servo)?, tolerance);
                info!("Simplified track '{servo}': {removed} keyframe(s) removed");
            }
            TimelineEdit::Load(timeline) => {
                check_timeline(&timeline)?;
                info!(
                    "Timeline loaded: {} track(s), {:.0} ms",
                    timeline.tracks.len(),
                    timeline.effective_duration_ms()
                );
                self.timeline = timeline;
                self.reset_to_stopped();
                self.scrubbed = false;
            }
        }
        Ok(())
    }

    /// Pull the loop region and the clock back inside a shrunken timeline.
    /// A loop that no longer starts before the end is cleared.
    fn fit_to_duration(&mut self) {
        let end = self.timeline.effective_duration_ms();
        let looping = &mut self.timeline.looping;
        if looping.start_ms >= end {
            warn!(
                "Loop start {:.1} ms is not before the end ({end:.1} ms), loop region cleared",
                looping.start_ms
            );
            *looping = LoopRegion::default();
        } else if looping.end_ms.is_some_and(|e| e > end) {
            looping.end_ms = Some(end);
        }
        self.time_ms = self.time_ms.min(end);
    }

    fn track_mut(&mut self, servo: &str) -> Result<&mut Track, EngineError> {
        self.timeline
            .tracks
            .get_mut(servo)
            .ok_or_else(|| EngineError::InvalidTimeline(format!("no track for '{servo}'")))
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            mode: self.mode,
            current_time_ms: self.time_ms,
            rate: self.rate,
            duration_ms: self.timeline.effective_duration_ms(),
            looping: self.timeline.looping.enabled,
            tracks: self.timeline.tracks.len(),
        }
    }
}

fn check_time(what: &str, time_ms: f64) -> Result<(), EngineError> {
    if time_ms.is_finite() && time_ms >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidTimeline(format!("{what} {time_ms}")))
    }
}

/// The region must start before both its own end and the timeline end.
fn check_loop(region: &LoopRegion, duration_ms: f64) -> Result<(), EngineError> {
    check_time("loop start", region.start_ms)?;
    if let Some(end) = region.end_ms {
        if !(end.is_finite() && end > region.start_ms) {
            return Err(EngineError::InvalidTimeline(format!(
                "loop end {end} not after start {}",
                region.start_ms
            )));
        }
    }
    let stop = region.end_ms.map_or(duration_ms, |e| e.min(duration_ms));
    if region.start_ms >= stop {
        return Err(EngineError::InvalidTimeline(format!(
            "loop start {} not before timeline end {stop}",
            region.start_ms
        )));
    }
    Ok(())
}

/// Structural checks for a whole timeline arriving from a client or a file.
pub fn check_timeline(timeline: &Timeline) -> Result<(), EngineError> {
    if !(timeline.duration_ms.is_finite() && timeline.duration_ms > 0.0) {
        return Err(EngineError::InvalidTimeline(format!(
            "duration {}",
            timeline.duration_ms
        )));
    }
    for (id, tr) in &timeline.tracks {
        for k in tr.keyframes() {
            check_time("keyframe time", k.time_ms)?;
            if !k.angle.is_finite() {
                return Err(EngineError::InvalidTimeline(format!("non-finite angle on '{id}'")));
            }
        }
    }
    check_loop(&timeline.looping, timeline.effective_duration_ms())?;
    for m in &timeline.markers {
        check_time("marker time", m.time_ms)?;
    }
    Ok(())
}
