//! Integration test: timeline transport driven through the command path.

use servo_common::engine::command::{Command, TimelineEdit, TransportCommand};
use servo_common::engine::error::EngineError;
use servo_common::engine::servo::ServoSpec;
use servo_common::engine::state::{AngleSource, SafetyState, TransportMode};
use servo_common::engine::timeline::{Ease, Marker};

use super::{Rig, set};

fn edit(edit: TimelineEdit) -> Command {
    Command::Timeline(edit)
}

fn transport(command: TransportCommand) -> Command {
    Command::Transport(command)
}

fn keyframe(servo: &str, time_ms: f64, angle: f64) -> Command {
    edit(TimelineEdit::AddKeyframe {
        servo: servo.to_string(),
        time_ms,
        angle,
        ease: Ease::Linear,
    })
}

/// `base` ramps 0 → 100 over one second; timeline is one second long.
fn ramp_rig() -> Rig {
    let mut rig = Rig::new();
    rig.register(0, vec![ServoSpec::new("base", 0)]);
    let out = rig.tick(
        0,
        vec![
            keyframe("base", 0.0, 0.0),
            keyframe("base", 1000.0, 100.0),
            edit(TimelineEdit::SetDuration { duration_ms: 1000.0 }),
        ],
    );
    assert!(out.outcomes.iter().all(|o| o.is_ok()), "{:?}", out.outcomes);
    rig
}

#[test]
fn play_interpolates_between_keyframes() {
    let mut rig = ramp_rig();

    let out = rig.tick(10, vec![transport(TransportCommand::Play)]);
    assert_eq!(out.snapshot.angle("base"), Some(0.0));
    assert_eq!(out.snapshot.timeline.mode, TransportMode::Playing);

    let out = rig.tick(260, vec![]);
    assert_eq!(out.snapshot.angle("base"), Some(25.0));
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Timeline);

    let out = rig.tick(510, vec![]);
    assert_eq!(out.snapshot.angle("base"), Some(50.0));
    assert_eq!(out.snapshot.timeline.current_time_ms, 500.0);
}

#[test]
fn end_without_loop_emits_final_sample_then_stops() {
    let mut rig = ramp_rig();
    rig.tick(10, vec![transport(TransportCommand::Play)]);

    let out = rig.tick(1210, vec![]);
    assert_eq!(out.snapshot.angle("base"), Some(100.0));
    assert_eq!(out.snapshot.timeline.mode, TransportMode::Stopped);
    assert_eq!(out.snapshot.timeline.current_time_ms, 0.0);

    // Stopped: nothing drives, the last angle holds.
    let out = rig.tick(1300, vec![]);
    assert_eq!(out.snapshot.angle("base"), Some(100.0));
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Hold);
}

#[test]
fn loop_region_wraps_time() {
    let mut rig = ramp_rig();
    rig.tick(
        10,
        vec![
            edit(TimelineEdit::SetLoop {
                enabled: true,
                start_ms: 0.0,
                end_ms: Some(1000.0),
            }),
            transport(TransportCommand::Play),
        ],
    );

    let out = rig.tick(1260, vec![]);
    assert_eq!(out.snapshot.timeline.mode, TransportMode::Playing);
    assert_eq!(out.snapshot.timeline.current_time_ms, 250.0);
    assert_eq!(out.snapshot.angle("base"), Some(25.0));
    assert!(out.snapshot.timeline.looping);
}

#[test]
fn scrub_samples_once_and_matches_playback() {
    let mut rig = ramp_rig();

    let out = rig.tick(10, vec![transport(TransportCommand::Scrub { time_ms: 750.0 })]);
    let scrubbed = out.snapshot.angle("base");
    assert_eq!(scrubbed, Some(75.0));
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Timeline);
    assert_eq!(out.snapshot.timeline.mode, TransportMode::Stopped);
    assert_eq!(out.snapshot.timeline.current_time_ms, 750.0);

    // One-shot: the next tick holds.
    let out = rig.tick(20, vec![]);
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Hold);

    let mut played = ramp_rig();
    played.tick(10, vec![transport(TransportCommand::Play)]);
    let out = played.tick(760, vec![]);
    assert_eq!(out.snapshot.angle("base"), scrubbed);
}

#[test]
fn scrub_clamps_to_duration() {
    let mut rig = ramp_rig();
    let out = rig.tick(10, vec![transport(TransportCommand::Scrub { time_ms: 5000.0 })]);
    assert_eq!(out.snapshot.timeline.current_time_ms, 1000.0);
    assert_eq!(out.snapshot.angle("base"), Some(100.0));

    let out = rig.tick(20, vec![transport(TransportCommand::Scrub { time_ms: f64::NAN })]);
    assert!(matches!(out.outcomes[0].error, Some(EngineError::InvalidTimeline(_))));
}

#[test]
fn pause_and_resume_keep_position() {
    let mut rig = ramp_rig();
    rig.tick(10, vec![transport(TransportCommand::Play)]);
    let out = rig.tick(210, vec![]);
    assert_eq!(out.snapshot.angle("base"), Some(20.0));
    let out = rig.tick(210, vec![transport(TransportCommand::Pause)]);
    assert_eq!(out.snapshot.timeline.mode, TransportMode::Paused);
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Hold);

    // Time spent paused does not count.
    let out = rig.tick(5000, vec![transport(TransportCommand::Resume)]);
    assert_eq!(out.snapshot.timeline.current_time_ms, 200.0);
    let out = rig.tick(5100, vec![]);
    assert_eq!(out.snapshot.angle("base"), Some(30.0));
}

#[test]
fn rate_scales_playback() {
    let mut rig = ramp_rig();
    let out = rig.tick(
        10,
        vec![
            transport(TransportCommand::SetRate { rate: 2.0 }),
            transport(TransportCommand::Play),
        ],
    );
    assert_eq!(out.snapshot.timeline.rate, 2.0);
    let out = rig.tick(260, vec![]);
    assert_eq!(out.snapshot.angle("base"), Some(50.0));

    let out = rig.tick(
        270,
        vec![
            transport(TransportCommand::SetRate { rate: 0.0 }),
            transport(TransportCommand::SetRate { rate: -1.0 }),
        ],
    );
    assert_eq!(out.outcomes[0].error, Some(EngineError::InvalidRate(0.0)));
    assert_eq!(out.outcomes[1].error, Some(EngineError::InvalidRate(-1.0)));
    assert_eq!(out.snapshot.timeline.rate, 2.0);
}

#[test]
fn invalid_transitions_are_rejected() {
    let mut rig = ramp_rig();
    let out = rig.tick(
        10,
        vec![
            transport(TransportCommand::Pause),
            transport(TransportCommand::Resume),
            transport(TransportCommand::Stop),
        ],
    );
    assert_eq!(
        out.outcomes[0].error,
        Some(EngineError::InvalidTransport {
            command: "pause",
            mode: TransportMode::Stopped,
        })
    );
    assert_eq!(
        out.outcomes[1].error,
        Some(EngineError::InvalidTransport {
            command: "resume",
            mode: TransportMode::Stopped,
        })
    );
    assert!(out.outcomes[2].is_ok(), "stop is always allowed");

    let out = rig.tick(20, vec![transport(TransportCommand::Play), transport(TransportCommand::Resume)]);
    assert!(out.outcomes[0].is_ok());
    assert!(matches!(
        out.outcomes[1].error,
        Some(EngineError::InvalidTransport { command: "resume", .. })
    ));
}

#[test]
fn jump_to_marker() {
    let mut rig = ramp_rig();
    let out = rig.tick(
        10,
        vec![
            edit(TimelineEdit::AddMarker(Marker {
                label: "mid".to_string(),
                time_ms: 500.0,
            })),
            transport(TransportCommand::Jump {
                label: "mid".to_string(),
            }),
            transport(TransportCommand::Jump {
                label: "nowhere".to_string(),
            }),
        ],
    );
    assert!(out.outcomes[0].is_ok());
    assert!(out.outcomes[1].is_ok());
    assert_eq!(
        out.outcomes[2].error,
        Some(EngineError::UnknownMarker("nowhere".to_string()))
    );
    assert_eq!(out.snapshot.angle("base"), Some(50.0));
}

#[test]
fn recording_captures_live_commands_on_the_grid() {
    let mut rig = Rig::new();
    let mut base = ServoSpec::new("base", 0);
    base.aliases = vec!["turntable".to_string()];
    rig.register(0, vec![base, ServoSpec::new("arm", 1)]);

    let out = rig.tick(
        10,
        vec![
            edit(TimelineEdit::SetDuration { duration_ms: 200.0 }),
            edit(TimelineEdit::SetQuantize { grid_ms: Some(100.0) }),
            transport(TransportCommand::Record {
                targets: Some(vec!["turntable".to_string()]),
            }),
        ],
    );
    assert!(out.outcomes.iter().all(|o| o.is_ok()), "{:?}", out.outcomes);
    assert_eq!(out.snapshot.timeline.mode, TransportMode::Recording);

    // 130 ms into the take snaps to 100 ms.
    let out = rig.tick(140, vec![set("base", 30.0), set("arm", 45.0)]);
    assert_eq!(out.snapshot.angle("base"), Some(30.0));
    assert_eq!(out.snapshot.angle("arm"), Some(45.0));

    // 260 ms snaps to 300 ms and stretches the take.
    let out = rig.tick(270, vec![set("turntable", 60.0)]);
    assert_eq!(out.snapshot.timeline.duration_ms, 300.0);

    // Recording does not drive servos.
    let out = rig.tick(280, vec![]);
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Hold);

    let out = rig.tick(290, vec![transport(TransportCommand::Stop)]);
    assert_eq!(out.snapshot.timeline.mode, TransportMode::Stopped);

    let timeline = rig.engine.timeline().timeline();
    let keys: Vec<(f64, f64)> = timeline.tracks["base"]
        .keyframes()
        .iter()
        .map(|k| (k.time_ms, k.angle))
        .collect();
    assert_eq!(keys, vec![(100.0, 30.0), (300.0, 60.0)]);
    assert!(!timeline.tracks.contains_key("arm"), "arm was not a record target");

    // Stopped: live commands are no longer captured.
    rig.tick(300, vec![set("base", 90.0)]);
    assert_eq!(rig.engine.timeline().timeline().tracks["base"].keyframes().len(), 2);
}

#[test]
fn mute_and_solo_select_tracks() {
    let mut rig = Rig::new();
    rig.register(
        0,
        vec![ServoSpec::new("base", 0), ServoSpec::new("arm", 1)],
    );
    rig.tick(
        0,
        vec![
            keyframe("base", 0.0, 10.0),
            keyframe("arm", 0.0, 170.0),
            edit(TimelineEdit::Mute {
                servo: "base".to_string(),
                muted: true,
            }),
        ],
    );

    let out = rig.tick(10, vec![transport(TransportCommand::Play)]);
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Hold);
    assert_eq!(out.snapshot.angle("base"), Some(90.0));
    assert_eq!(out.snapshot.angle("arm"), Some(170.0));

    let out = rig.tick(
        20,
        vec![
            edit(TimelineEdit::Mute {
                servo: "base".to_string(),
                muted: false,
            }),
            edit(TimelineEdit::Solo {
                servo: "base".to_string(),
                solo: true,
            }),
            edit(TimelineEdit::Solo {
                servo: "ghost".to_string(),
                solo: true,
            }),
        ],
    );
    assert!(matches!(out.outcomes[2].error, Some(EngineError::InvalidTimeline(_))));
    assert_eq!(out.snapshot.angle("base"), Some(10.0));
    assert_eq!(out.snapshot.servo("arm").unwrap().servo.source, AngleSource::Hold);
}

#[test]
fn keyframe_edits_are_validated() {
    let mut rig = Rig::new();
    rig.register(0, vec![ServoSpec::new("base", 0).with_range(20.0, 160.0)]);
    let out = rig.tick(
        10,
        vec![
            keyframe("base", 0.0, 200.0),
            keyframe("ghost", 0.0, 90.0),
            keyframe("base", -5.0, 90.0),
            edit(TimelineEdit::RemoveKeyframe {
                servo: "base".to_string(),
                time_ms: 0.0,
            }),
            edit(TimelineEdit::SetDuration { duration_ms: 0.0 }),
        ],
    );
    assert!(matches!(out.outcomes[0].error, Some(EngineError::OutOfRange { .. })));
    assert_eq!(out.outcomes[1].error, Some(EngineError::UnknownServo("ghost".to_string())));
    assert!(matches!(out.outcomes[2].error, Some(EngineError::InvalidTimeline(_))));
    assert!(matches!(out.outcomes[3].error, Some(EngineError::InvalidTimeline(_))));
    assert!(matches!(out.outcomes[4].error, Some(EngineError::InvalidTimeline(_))));
    assert_eq!(out.snapshot.timeline.tracks, 0);
}

fn track_times(rig: &Rig) -> Vec<f64> {
    rig.engine.timeline().timeline().tracks["base"]
        .keyframes()
        .iter()
        .map(|k| k.time_ms)
        .collect()
}

fn simplify(servo: &str, tolerance: f64) -> Command {
    edit(TimelineEdit::Simplify {
        servo: servo.to_string(),
        tolerance,
    })
}

#[test]
fn simplify_drops_predictable_keyframes() {
    let mut rig = ramp_rig();
    rig.tick(10, vec![keyframe("base", 250.0, 25.0), keyframe("base", 500.0, 50.0)]);
    assert_eq!(track_times(&rig), vec![0.0, 250.0, 500.0, 1000.0]);

    let out = rig.tick(20, vec![simplify("base", 0.5)]);
    assert!(out.outcomes[0].is_ok());
    assert_eq!(track_times(&rig), vec![0.0, 1000.0]);

    // 80° at 500 ms is 30° off the 0 → 1000 ms line.
    rig.tick(30, vec![keyframe("base", 500.0, 80.0)]);
    let out = rig.tick(
        40,
        vec![simplify("base", 0.5), simplify("base", -1.0), simplify("arm", 0.5)],
    );
    assert!(out.outcomes[0].is_ok());
    assert!(matches!(out.outcomes[1].error, Some(EngineError::InvalidTimeline(_))));
    assert!(matches!(out.outcomes[2].error, Some(EngineError::InvalidTimeline(_))));
    assert_eq!(track_times(&rig), vec![0.0, 500.0, 1000.0]);
}

#[test]
fn playback_is_suppressed_outside_normal() {
    let mut rig = ramp_rig();
    rig.tick(10, vec![transport(TransportCommand::Play)]);
    let out = rig.tick(20, vec![Command::EmergencyStop]);
    assert_eq!(out.snapshot.timeline.mode, TransportMode::Stopped);
    assert_eq!(out.snapshot.angle("base"), Some(90.0));

    let out = rig.tick(
        100,
        vec![
            transport(TransportCommand::Scrub { time_ms: 500.0 }),
            transport(TransportCommand::Play),
        ],
    );
    assert_eq!(out.snapshot.safety.state, SafetyState::Recovering);
    assert!(out.outcomes[0].is_ok(), "scrub only moves the playhead");
    assert_eq!(
        out.outcomes[1].error,
        Some(EngineError::MotionBlocked(SafetyState::Recovering))
    );
    assert_eq!(out.snapshot.angle("base"), Some(90.0));
    assert_eq!(out.snapshot.timeline.current_time_ms, 500.0);
}
