//! Shared rig for the integration tests.

mod arbitration;
mod hardware_faults;
mod properties;
mod queue_pressure;
mod safety_stop;
mod timeline_playback;

use std::time::{Duration, Instant};

use servo_common::engine::command::{ClientId, Command, CommandEvent};
use servo_common::engine::servo::ServoSpec;
use servo_common::engine::state::EmergencyMode;
use servo_control_unit::engine::{Engine, TickOutput};
use servo_control_unit::output::OutputStage;
use servo_hal::{SimulationProbe, SimulationPwm};

/// Engine on the simulation backend, driven in milliseconds from `t0`.
pub struct Rig {
    pub engine: Engine,
    pub probe: SimulationProbe,
    pub t0: Instant,
    seq: u64,
}

impl Rig {
    /// Watchdog disabled, default 3 s cooldown.
    pub fn new() -> Self {
        let t0 = Instant::now();
        let (pwm, probe) = SimulationPwm::with_probe();
        let engine = Engine::new(OutputStage::inline(Box::new(pwm)), t0).with_watchdog(None, t0);
        Self {
            engine,
            probe,
            t0,
            seq: 0,
        }
    }

    pub fn with_watchdog(mut self, timeout_ms: u64) -> Self {
        let t0 = self.t0;
        self.engine = self
            .engine
            .with_watchdog(Some(Duration::from_millis(timeout_ms)), t0);
        self
    }

    pub fn with_emergency_mode(mut self, mode: EmergencyMode) -> Self {
        self.engine = self.engine.with_emergency_mode(mode);
        self
    }

    pub fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    /// Tick at `ms` with `commands` from client 1, in order.
    pub fn tick(&mut self, ms: u64, commands: Vec<Command>) -> TickOutput {
        let events = commands
            .into_iter()
            .map(|command| {
                self.seq += 1;
                CommandEvent {
                    seq: self.seq,
                    client: ClientId(1),
                    command,
                }
            })
            .collect();
        let now = self.at(ms);
        self.engine.tick(now, events)
    }

    /// Register `servos` in one tick at `ms`; every registration must succeed.
    pub fn register(&mut self, ms: u64, servos: Vec<ServoSpec>) -> TickOutput {
        let out = self.tick(ms, servos.into_iter().map(Command::Register).collect());
        assert!(out.outcomes.iter().all(|o| o.is_ok()), "{:?}", out.outcomes);
        out
    }
}

pub fn set(id: &str, angle: f64) -> Command {
    Command::SetAngle {
        id: id.to_string(),
        angle,
    }
}
