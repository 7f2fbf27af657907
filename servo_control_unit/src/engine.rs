//! The engine: every piece of mutable state, advanced one tick at a time.
//!
//! ## Tick body
//! 1. Poll the RECOVERING cooldown, advance the timeline clock.
//! 2. Apply queued events (priority lane first), feed the watchdog, then
//!    check it.
//! 3. EMERGENCY_STOP: build the stop frame for the configured
//!    [`EmergencyMode`] (safe angles, frozen angles or released outputs).
//!    NORMAL: resolve explicit > preset > timeline > hold.
//!    RECOVERING: hold.
//! 4. Write resolved angles to the registry, submit one pulse per enabled
//!    servo unless outputs are detached, fold completed write results into
//!    the stale flags.
//! 5. Leave EMERGENCY_STOP once the stop frame has been handed over.
//! 6. Build the snapshot.
//!
//! The engine never reads the wall clock; `now` is passed in, so tests drive
//! it with a synthetic clock.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use servo_common::engine::command::{CommandEvent, CommandOutcome};
use servo_common::engine::config::{EngineConfig, SafetyConfig};
use servo_common::engine::error::EngineError;
use servo_common::engine::safety::PreflightReport;
use servo_common::engine::servo::ServoId;
use servo_common::engine::snapshot::{ServoStatus, StateSnapshot};
use servo_common::engine::state::{AngleSource, EmergencyMode, StopReason};
use servo_common::engine::timeline::Timeline;
use tracing::{debug, info, warn};

use crate::command::arbitration::resolve_angle;
use crate::output::{OutputStage, PulseWrite};
use crate::preset::{PresetEngine, PresetLibrary};
use crate::registry::ServoRegistry;
use crate::safety::monitor::SafetyMonitor;
use crate::safety::pose::SafePoseBook;
use crate::safety::preflight::run_preflight;
use crate::safety::watchdog::Watchdog;
use crate::store::ProjectFile;
use crate::timeline::TimelineEngine;
use crate::timeline::transport::check_timeline;

/// Safety log entries carried in each snapshot.
const SNAPSHOT_LOG_ENTRIES: usize = 10;

/// Result of one tick.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub outcomes: Vec<CommandOutcome>,
    pub snapshot: StateSnapshot,
}

pub struct Engine {
    pub(crate) registry: ServoRegistry,
    pub(crate) safety: SafetyMonitor,
    pub(crate) watchdog: Watchdog,
    pub(crate) presets: PresetEngine,
    pub(crate) timeline: TimelineEngine,
    pub(crate) poses: SafePoseBook,
    output: OutputStage,
    tick: u64,
    /// Explicit targets of the current tick.
    pub(crate) explicit: BTreeMap<ServoId, (f64, AngleSource)>,
    /// Channels registered during the current tick, with their winner.
    pub(crate) claimed: HashMap<u8, ServoId>,
    /// Servos moved by a safe pose during the current tick.
    pub(crate) posed: HashSet<ServoId>,
    queue_dropped: u64,
}

impl Engine {
    /// Empty engine with default safety timings.
    pub fn new(output: OutputStage, now: Instant) -> Self {
        let safety = SafetyConfig::default();
        Self {
            registry: ServoRegistry::new(),
            safety: SafetyMonitor::new(safety.cooldown()),
            watchdog: Watchdog::new(safety.watchdog_timeout(), now),
            presets: PresetEngine::default(),
            timeline: TimelineEngine::default(),
            poses: SafePoseBook::default(),
            output,
            tick: 0,
            explicit: BTreeMap::new(),
            claimed: HashMap::new(),
            posed: HashSet::new(),
            queue_dropped: 0,
        }
    }

    /// Engine populated from a validated configuration and the preset
    /// library built from it.
    ///
    /// # Errors
    /// The first servo the registry rejects.
    pub fn from_config(
        config: &EngineConfig,
        library: PresetLibrary,
        output: OutputStage,
        now: Instant,
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(output, now)
            .with_watchdog(config.safety.watchdog_timeout(), now)
            .with_cooldown(config.safety.cooldown())
            .with_emergency_mode(config.safety.emergency_mode)
            .with_library(library)
            .with_poses(SafePoseBook::new(config.safe_poses.iter().cloned()))
            .with_timeline(Timeline {
                duration_ms: config.timeline.duration_ms,
                quantize_ms: config.timeline.quantize_ms,
                ..Timeline::default()
            });
        for spec in &config.servos {
            engine.registry.register(spec.clone())?;
        }
        info!(
            "Engine configured: {} servo(s), {} safe pose(s), {} preset(s)",
            engine.registry.len(),
            engine.poses.names().len(),
            engine.presets.library().len()
        );
        Ok(engine)
    }

    pub fn with_watchdog(mut self, timeout: Option<Duration>, now: Instant) -> Self {
        self.watchdog = Watchdog::new(timeout, now);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.safety = SafetyMonitor::new(cooldown).with_mode(self.safety.emergency_mode());
        self
    }

    pub fn with_emergency_mode(mut self, mode: EmergencyMode) -> Self {
        self.safety = SafetyMonitor::new(self.safety.cooldown()).with_mode(mode);
        self
    }

    pub fn with_library(mut self, library: PresetLibrary) -> Self {
        self.presets = PresetEngine::new(library);
        self
    }

    pub fn with_poses(mut self, poses: SafePoseBook) -> Self {
        self.poses = poses;
        self
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = TimelineEngine::new(timeline);
        self
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn registry(&self) -> &ServoRegistry {
        &self.registry
    }

    pub fn safety(&self) -> &SafetyMonitor {
        &self.safety
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn presets(&self) -> &PresetEngine {
        &self.presets
    }

    pub fn timeline(&self) -> &TimelineEngine {
        &self.timeline
    }

    pub fn poses(&self) -> &SafePoseBook {
        &self.poses
    }

    pub fn output_name(&self) -> &'static str {
        self.output.name()
    }

    /// PWM stays released from a detach-mode stop until motion is
    /// permitted again.
    pub fn outputs_detached(&self) -> bool {
        self.safety.emergency_mode() == EmergencyMode::Detach && !self.safety.permits_motion()
    }

    pub fn set_queue_dropped(&mut self, dropped: u64) {
        self.queue_dropped = dropped;
    }

    pub fn preflight(&self) -> PreflightReport {
        run_preflight(self.registry.iter(), self.watchdog.timeout())
    }

    // ─── Tick ───────────────────────────────────────────────────────

    pub fn tick(&mut self, now: Instant, events: Vec<CommandEvent>) -> TickOutput {
        self.tick += 1;
        let tick = self.tick;
        self.explicit.clear();
        self.claimed.clear();
        self.posed.clear();

        self.safety.poll(now, tick);
        self.timeline.advance(now);

        let mut outcomes = Vec::with_capacity(events.len());
        for CommandEvent { seq, client, command } in events {
            self.watchdog.feed(now);
            let name = command.name();
            let result = self.apply_command(command, now);
            match &result {
                Ok(()) => debug!("{client} '{name}' seq {seq} applied"),
                Err(e) => warn!("{client} '{name}' seq {seq} rejected: {e}"),
            }
            outcomes.push(CommandOutcome::from_parts(seq, client, name, tick, result));
        }

        let armed = self.registry.enabled().next().is_some();
        if self.watchdog.check(now, armed) {
            warn!(
                "Watchdog expired after {} ms of silence",
                self.watchdog.timeout().map_or(0, |t| t.as_millis())
            );
            self.emergency_stop(StopReason::Watchdog, now);
        }

        let stopping = self.safety.is_stopping();
        if stopping {
            self.apply_stop_frame();
        } else {
            // Samples are taken every tick so stateful sources keep time;
            // they only drive servos in NORMAL.
            let preset: HashMap<ServoId, f64> = self.presets.sample(now, &self.registry).into_iter().collect();
            let timeline: HashMap<ServoId, f64> = self.timeline.sample().into_iter().collect();
            if self.safety.permits_motion() {
                self.resolve(&preset, &timeline);
            }
        }

        let submit = !self.outputs_detached();
        self.write_outputs(submit);

        if stopping {
            self.safety.confirm_safe_pose(now, tick);
        }

        TickOutput {
            outcomes,
            snapshot: self.snapshot(now),
        }
    }

    /// Enter EMERGENCY_STOP: presets destroyed, timeline halted, pending
    /// explicit targets discarded.
    pub(crate) fn emergency_stop(&mut self, reason: StopReason, now: Instant) {
        if self.safety.trigger(reason, now, self.tick) {
            self.presets.stop_all();
            self.timeline.halt();
            self.explicit.clear();
        }
    }

    fn apply_stop_frame(&mut self) {
        match self.safety.emergency_mode() {
            EmergencyMode::SafePose => self.force_safe_pose(),
            EmergencyMode::Hold => self.hold_all(),
            EmergencyMode::Detach => {
                self.hold_all();
                self.output.release();
            }
        }
    }

    /// Freeze every enabled servo at its last commanded angle.
    fn hold_all(&mut self) {
        let ids: Vec<ServoId> = self.registry.enabled().map(|s| s.id.clone()).collect();
        for id in ids {
            self.registry.set_source(&id, AngleSource::Hold);
        }
    }

    fn force_safe_pose(&mut self) {
        let targets: Vec<(ServoId, f64)> = self
            .registry
            .enabled()
            .map(|s| (s.id.clone(), s.safe_angle))
            .collect();
        for (id, angle) in targets {
            if let Err(e) = self.registry.set_angle(&id, angle) {
                warn!("Safe pose for '{id}' not applied: {e}");
                continue;
            }
            self.registry.set_source(&id, AngleSource::SafePose);
        }
    }

    fn resolve(&mut self, preset: &HashMap<ServoId, f64>, timeline: &HashMap<ServoId, f64>) {
        let ids: Vec<ServoId> = self.registry.enabled().map(|s| s.id.clone()).collect();
        for id in ids {
            let resolved = resolve_angle(
                self.explicit.get(&id).copied(),
                preset.get(&id).copied(),
                timeline.get(&id).copied(),
            );
            let Some((angle, source)) = resolved else {
                self.registry.set_source(&id, AngleSource::Hold);
                continue;
            };
            match self.registry.set_angle(&id, angle) {
                Ok(_) => self.registry.set_source(&id, source),
                // Limits narrowed after validation; the servo holds.
                Err(e) => debug!("'{id}' holds: {e}"),
            }
        }
    }

    fn write_outputs(&mut self, submit: bool) {
        if submit {
            let frame: Vec<PulseWrite> = self
                .registry
                .enabled()
                .map(|s| PulseWrite {
                    id: s.id.clone(),
                    channel: s.channel,
                    pulse_us: s.pulse_for(s.current_angle),
                })
                .collect();
            self.output.submit(frame);
        }

        for done in self.output.collect() {
            match done.result {
                Ok(()) => {
                    if self.registry.mark_stale(&done.id, false) {
                        info!("Output for '{}' recovered", done.id);
                    }
                }
                Err(e) => {
                    if self.registry.mark_stale(&done.id, true) {
                        warn!("Output for '{}' (channel {}) failed: {e}", done.id, done.channel);
                    }
                }
            }
        }
    }

    pub fn snapshot(&self, now: Instant) -> StateSnapshot {
        StateSnapshot {
            tick: self.tick,
            revision: self.registry.revision(),
            safety: self.safety.snapshot(now, SNAPSHOT_LOG_ENTRIES),
            servos: self
                .registry
                .iter()
                .map(|s| ServoStatus {
                    pulse_us: s.pulse_for(s.current_angle),
                    flags: s.flags(),
                    servo: s.clone(),
                })
                .collect(),
            timeline: self.timeline.snapshot(),
            presets: self.presets.snapshot(now),
            queue_dropped: self.queue_dropped,
            outputs_detached: self.outputs_detached(),
        }
    }

    /// Release every output channel.
    pub fn shutdown(&mut self) {
        if let Some(diag) = self.output.shutdown() {
            info!(
                "Output '{}' released: {} write(s), {} failure(s), max {} µs",
                self.output.name(),
                diag.writes,
                diag.failures,
                diag.max_write_us
            );
        }
    }

    // ─── Projects ───────────────────────────────────────────────────

    /// Merge a project file into the engine. Servos that collide with
    /// already registered ones are skipped.
    pub fn apply_project(&mut self, project: ProjectFile) -> Result<(), EngineError> {
        let timeline = project.active_timeline().cloned();
        if let Some(timeline) = &timeline {
            check_timeline(timeline)?;
        }
        for spec in project.servos {
            let id = spec.id.clone();
            if let Err(e) = self.registry.register(spec) {
                warn!("Project servo '{id}' skipped: {e}");
            }
        }
        for pose in project.safe_poses {
            self.poses.insert(pose);
        }
        for (name, def) in project.presets {
            self.presets.library_mut().insert(name, def)?;
        }
        if let Some(timeline) = timeline {
            self.timeline = TimelineEngine::new(timeline);
        }
        Ok(())
    }

    /// Current servos, poses, library entries and timeline as a project.
    pub fn project(&self) -> ProjectFile {
        ProjectFile::capture(
            self.registry.iter().map(|s| s.to_spec()).collect(),
            self.poses.poses().cloned().collect(),
            self.presets
                .library()
                .entries()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            self.timeline.timeline().clone(),
        )
    }
}
