//! Integration test: source arbitration across presets, timeline and
//! explicit commands, plus registration races.

use servo_common::engine::command::{Command, TimelineEdit, TransportCommand};
use servo_common::engine::error::{EngineError, ErrorKind};
use servo_common::engine::preset::{PresetDefinition, PresetSource, SweepParams};
use servo_common::engine::servo::ServoSpec;
use servo_common::engine::state::AngleSource;
use servo_common::engine::timeline::Ease;

use super::{Rig, set};

fn keyframe(servo: &str, time_ms: f64, angle: f64) -> Command {
    Command::Timeline(TimelineEdit::AddKeyframe {
        servo: servo.to_string(),
        time_ms,
        angle,
        ease: Ease::Linear,
    })
}

fn sweep(name: &str, targets: &[&str]) -> Command {
    Command::PresetStart {
        name: Some(name.to_string()),
        preset: PresetSource::Inline(PresetDefinition::Pingpong(SweepParams {
            min_angle: 60.0,
            max_angle: 120.0,
            period_ms: 2000.0,
        })),
        targets: targets.iter().map(|t| t.to_string()).collect(),
        rate: None,
    }
}

fn rig_with_timeline() -> Rig {
    let mut rig = Rig::new();
    rig.register(0, vec![ServoSpec::new("base", 0), ServoSpec::new("arm", 1)]);
    let out = rig.tick(
        0,
        vec![
            keyframe("base", 0.0, 20.0),
            keyframe("base", 1000.0, 120.0),
            Command::Transport(TransportCommand::Play),
        ],
    );
    assert!(out.outcomes.iter().all(|o| o.is_ok()), "{:?}", out.outcomes);
    rig
}

#[test]
fn priority_is_explicit_then_preset_then_timeline_then_hold() {
    let mut rig = rig_with_timeline();

    let out = rig.tick(500, vec![]);
    assert_eq!(out.snapshot.angle("base"), Some(70.0));
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Timeline);
    assert_eq!(out.snapshot.servo("arm").unwrap().servo.source, AngleSource::Hold);

    let out = rig.tick(500, vec![sweep("s", &["base"])]);
    assert_eq!(out.snapshot.angle("base"), Some(60.0));
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Preset);

    let out = rig.tick(600, vec![set("base", 5.0)]);
    assert_eq!(out.snapshot.angle("base"), Some(5.0));
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Explicit);

    let out = rig.tick(700, vec![Command::PresetStop { name: "s".to_string() }]);
    assert!((out.snapshot.angle("base").unwrap() - 90.0).abs() < 1e-9);
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Timeline);
}

#[test]
fn last_explicit_command_in_a_tick_wins() {
    let mut rig = Rig::new();
    rig.register(0, vec![ServoSpec::new("base", 0)]);
    let out = rig.tick(10, vec![set("base", 10.0), set("base", 20.0), set("base", 30.0)]);
    assert_eq!(out.snapshot.angle("base"), Some(30.0));
}

#[test]
fn paused_preset_yields_to_the_timeline() {
    let mut rig = rig_with_timeline();
    rig.tick(100, vec![sweep("s", &["base"])]);
    let out = rig.tick(200, vec![Command::PresetPause { name: "s".to_string() }]);
    assert!((out.snapshot.angle("base").unwrap() - 40.0).abs() < 1e-9);
    assert!(out.snapshot.presets[0].paused);

    let out = rig.tick(300, vec![Command::PresetResume { name: "s".to_string() }]);
    assert_eq!(out.snapshot.servo("base").unwrap().servo.source, AngleSource::Preset);
    // 100 ms of preset time ran before the pause, 100 ms were paused.
    let expected = 60.0 + 60.0 * (100.0 / 1000.0);
    assert!((out.snapshot.angle("base").unwrap() - expected).abs() < 1e-9);
}

#[test]
fn preset_on_owned_target_supersedes_it() {
    let mut rig = Rig::new();
    rig.register(0, vec![ServoSpec::new("base", 0), ServoSpec::new("arm", 1)]);
    rig.tick(0, vec![sweep("a", &["base", "arm"])]);

    let out = rig.tick(10, vec![sweep("b", &["arm"])]);
    let names: Vec<_> = out.snapshot.presets.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(out.snapshot.presets[0].targets, vec!["base".to_string()]);

    let out = rig.tick(20, vec![sweep("c", &["base"])]);
    let names: Vec<_> = out.snapshot.presets.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["b", "c"], "'a' lost its last target");
}

#[test]
fn preset_start_rejects_unknown_and_disabled_targets() {
    let mut rig = Rig::new();
    rig.register(0, vec![ServoSpec::new("base", 0), ServoSpec::new("arm", 1)]);
    let out = rig.tick(
        10,
        vec![
            sweep("x", &["base", "ghost"]),
            Command::Disable { id: "arm".to_string() },
            sweep("y", &["base", "arm"]),
            Command::PresetStart {
                name: None,
                preset: PresetSource::Named("nope".to_string()),
                targets: vec!["base".to_string()],
                rate: None,
            },
        ],
    );
    assert_eq!(out.outcomes[0].error, Some(EngineError::UnknownServo("ghost".to_string())));
    assert_eq!(out.outcomes[2].error, Some(EngineError::ServoDisabled("arm".to_string())));
    assert_eq!(out.outcomes[3].error, Some(EngineError::UnknownPreset("nope".to_string())));
    assert!(out.snapshot.presets.is_empty());
}

#[test]
fn library_preset_by_name() {
    let mut rig = Rig::new();
    rig.register(0, vec![ServoSpec::new("base", 0)]);
    let out = rig.tick(
        0,
        vec![Command::PresetStart {
            name: None,
            preset: PresetSource::Named("nod".to_string()),
            targets: vec!["base".to_string()],
            rate: Some(2.0),
        }],
    );
    assert!(out.outcomes[0].is_ok());
    assert_eq!(out.snapshot.presets[0].name, "nod");
    assert_eq!(out.snapshot.presets[0].rate, 2.0);
    assert_eq!(out.snapshot.angle("base"), Some(75.0));
}

#[test]
fn channel_race_within_one_tick_is_a_conflict() {
    let mut rig = Rig::new();
    let out = rig.tick(
        0,
        vec![
            Command::Register(ServoSpec::new("left", 7)),
            Command::Register(ServoSpec::new("right", 7)),
        ],
    );
    assert!(out.outcomes[0].is_ok());
    assert_eq!(out.outcomes[1].error_kind, Some(ErrorKind::Conflict));
    assert_eq!(out.snapshot.servos.len(), 1);

    let out = rig.tick(10, vec![Command::Register(ServoSpec::new("right", 7))]);
    assert_eq!(out.outcomes[0].error_kind, Some(ErrorKind::Validation));
    assert!(matches!(
        out.outcomes[0].error,
        Some(EngineError::ChannelInUse { channel: 7, ref owner }) if owner == "left"
    ));
}

#[test]
fn deregister_frees_the_channel_and_releases_presets() {
    let mut rig = Rig::new();
    rig.register(0, vec![ServoSpec::new("base", 0)]);
    rig.tick(0, vec![sweep("s", &["base"])]);
    let out = rig.tick(
        10,
        vec![
            Command::Deregister { id: "base".to_string() },
            Command::Register(ServoSpec::new("turret", 0)),
        ],
    );
    assert!(out.outcomes.iter().all(|o| o.is_ok()), "{:?}", out.outcomes);
    assert!(out.snapshot.presets.is_empty());
    assert!(out.snapshot.servo("base").is_none());
    assert_eq!(out.snapshot.servo("turret").unwrap().servo.channel, 0);
}
