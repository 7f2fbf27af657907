//! Command application and per-servo source arbitration.
//!
//! [`Engine::apply_command`] validates one command against the current
//! state and applies it, or rejects it with nothing changed. Explicit angles
//! are staged for the current tick; [`resolve_angle`] picks the single
//! source that drives each servo.
//!
//! A safe pose latches its servos for the rest of the tick: a later
//! `set_angle` on a posed servo in the same tick is accepted but does not
//! replace the pose target.

use std::time::Instant;

use servo_common::engine::command::{Command, TimelineEdit, TransportCommand};
use servo_common::engine::error::EngineError;
use servo_common::engine::servo::{Servo, ServoId};
use servo_common::engine::state::{AngleSource, StopReason};
use tracing::{debug, info};

use crate::engine::Engine;
use crate::preset::PresetStart;

/// Highest-priority source with a value: explicit (this tick) > preset >
/// timeline. `None` means the servo holds its angle.
pub fn resolve_angle(
    explicit: Option<(f64, AngleSource)>,
    preset: Option<f64>,
    timeline: Option<f64>,
) -> Option<(f64, AngleSource)> {
    explicit
        .or_else(|| preset.map(|a| (a, AngleSource::Preset)))
        .or_else(|| timeline.map(|a| (a, AngleSource::Timeline)))
}

impl Engine {
    /// Apply one command.
    ///
    /// # Errors
    /// Any [`EngineError`]; a rejected command changes nothing.
    pub(crate) fn apply_command(&mut self, command: Command, now: Instant) -> Result<(), EngineError> {
        match command {
            Command::Heartbeat => Ok(()),
            Command::EmergencyStop => {
                self.emergency_stop(StopReason::Manual, now);
                Ok(())
            }
            Command::SetAngle { id, angle } => {
                self.require_motion()?;
                let id = self.registry.require(&id)?;
                let servo = self.enabled_servo(&id)?;
                servo.check_angle(angle)?;
                if self.posed.contains(&id) {
                    debug!("'{id}' keeps its safe pose target this tick, {angle}° ignored");
                    return Ok(());
                }
                self.explicit.insert(id.clone(), (angle, AngleSource::Explicit));
                self.timeline.record(&id, angle);
                Ok(())
            }
            Command::SafePose { name } => {
                self.require_motion()?;
                let targets = self.poses.resolve(&name, &self.registry)?;
                info!("Safe pose '{name}' applied to {} servo(s)", targets.len());
                for (id, angle) in targets {
                    self.posed.insert(id.clone());
                    self.explicit.insert(id, (angle, AngleSource::Explicit));
                }
                Ok(())
            }
            Command::Enable { id } => {
                let id = self.registry.require(&id)?;
                self.registry.enable(&id)
            }
            Command::Disable { id } => {
                let id = self.registry.require(&id)?;
                self.registry.disable(&id)?;
                self.presets.release_target(&id);
                self.explicit.remove(&id);
                Ok(())
            }
            Command::Register(spec) => {
                if let Some(winner) = self.claimed.get(&spec.channel) {
                    if self.registry.channel_owner(spec.channel) == Some(winner) {
                        return Err(EngineError::RegistrationConflict {
                            channel: spec.channel,
                            winner: winner.clone(),
                        });
                    }
                }
                let (channel, id) = (spec.channel, spec.id.clone());
                self.registry.register(spec)?;
                self.claimed.insert(channel, id);
                Ok(())
            }
            Command::Deregister { id } => {
                let id = self.registry.require(&id)?;
                self.registry.deregister(&id)?;
                self.presets.release_target(&id);
                self.explicit.remove(&id);
                Ok(())
            }
            Command::Rename { id, new_id } => {
                let id = self.registry.require(&id)?;
                if id == new_id {
                    return Ok(());
                }
                self.timeline.check_rename(&new_id)?;
                self.registry.rename(&id, &new_id)?;
                self.presets.rename_target(&id, &new_id);
                self.timeline.rename_track(&id, &new_id);
                self.poses.rename_servo(&id, &new_id);
                if let Some(target) = self.explicit.remove(&id) {
                    self.explicit.insert(new_id.clone(), target);
                }
                if self.posed.remove(&id) {
                    self.posed.insert(new_id.clone());
                }
                for winner in self.claimed.values_mut().filter(|w| **w == id) {
                    *winner = new_id.clone();
                }
                Ok(())
            }
            Command::PresetStart {
                name,
                preset,
                targets,
                rate,
            } => {
                self.require_motion()?;
                let targets = targets
                    .iter()
                    .map(|t| {
                        let id = self.registry.require(t)?;
                        self.enabled_servo(&id)?;
                        Ok(id)
                    })
                    .collect::<Result<Vec<ServoId>, EngineError>>()?;
                self.presets
                    .start(
                        PresetStart {
                            name,
                            source: preset,
                            targets,
                            rate,
                        },
                        now,
                    )
                    .map(|_| ())
            }
            Command::PresetStop { name } => {
                self.presets.stop(&name);
                Ok(())
            }
            Command::PresetPause { name } => self.presets.pause(&name, now),
            Command::PresetResume { name } => self.presets.resume(&name, now),
            Command::Transport(cmd) => {
                if cmd.starts_motion() {
                    self.require_motion()?;
                }
                let cmd = match cmd {
                    TransportCommand::Record {
                        targets: Some(targets),
                    } => TransportCommand::Record {
                        targets: Some(
                            targets
                                .iter()
                                .map(|t| self.registry.require(t))
                                .collect::<Result<_, _>>()?,
                        ),
                    },
                    other => other,
                };
                self.timeline.apply_transport(cmd, now)
            }
            Command::Timeline(edit) => {
                let edit = self.canonical_edit(edit)?;
                self.timeline.apply_edit(edit, &self.registry)
            }
            Command::AddAlias { id, alias } => {
                let id = self.registry.require(&id)?;
                self.registry.add_alias(&id, &alias)
            }
            Command::SetLimits {
                id,
                min_deg,
                max_deg,
            } => {
                let id = self.registry.require(&id)?;
                self.registry.set_limits(&id, min_deg, max_deg)
            }
            Command::Calibrate {
                id,
                min_pulse_us,
                max_pulse_us,
            } => {
                let id = self.registry.require(&id)?;
                self.registry.calibrate(&id, min_pulse_us, max_pulse_us)
            }
        }
    }

    fn require_motion(&self) -> Result<(), EngineError> {
        if self.safety.permits_motion() {
            Ok(())
        } else {
            Err(EngineError::MotionBlocked(self.safety.state()))
        }
    }

    fn enabled_servo(&self, id: &str) -> Result<&Servo, EngineError> {
        let servo = self
            .registry
            .get(id)
            .ok_or_else(|| EngineError::UnknownServo(id.to_string()))?;
        if servo.enabled {
            Ok(servo)
        } else {
            Err(EngineError::ServoDisabled(id.to_string()))
        }
    }

    /// Track keys are canonical ids. Keyframes need a registered servo;
    /// other edits fall back to the raw name so tracks of removed servos
    /// stay editable.
    fn canonical_edit(&self, edit: TimelineEdit) -> Result<TimelineEdit, EngineError> {
        let lenient = |servo: String| self.registry.resolve(&servo).unwrap_or(servo);
        Ok(match edit {
            TimelineEdit::AddKeyframe {
                servo,
                time_ms,
                angle,
                ease,
            } => TimelineEdit::AddKeyframe {
                servo: self.registry.require(&servo)?,
                time_ms,
                angle,
                ease,
            },
            TimelineEdit::RemoveKeyframe { servo, time_ms } => TimelineEdit::RemoveKeyframe {
                servo: lenient(servo),
                time_ms,
            },
            TimelineEdit::ClearTrack { servo } => TimelineEdit::ClearTrack {
                servo: lenient(servo),
            },
            TimelineEdit::Mute { servo, muted } => TimelineEdit::Mute {
                servo: lenient(servo),
                muted,
            },
            TimelineEdit::Solo { servo, solo } => TimelineEdit::Solo {
                servo: lenient(servo),
                solo,
            },
            TimelineEdit::Simplify { servo, tolerance } => TimelineEdit::Simplify {
                servo: lenient(servo),
                tolerance,
            },
            other => other,
        })
    }
}
