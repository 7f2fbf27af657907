//! Integration test: emergency stop, watchdog and recovery.
//!
//! 1. Manual trigger → safe pose in one tick → RECOVERING
//! 2. Re-trigger during RECOVERING restarts the cooldown
//! 3. Watchdog expiry on client silence
//! 4. Timeline halted and named poses blocked while stopped
//! 5. Hold and detach emergency modes

use servo_common::engine::command::{Command, TransportCommand};
use servo_common::engine::error::EngineError;
use servo_common::engine::servo::ServoSpec;
use servo_common::engine::state::{AngleSource, EmergencyMode, SafetyState, StopReason, TransportMode};

use super::{Rig, set};

// ── Helpers ─────────────────────────────────────────────────────────

fn two_servo_rig() -> Rig {
    rig_in_mode(EmergencyMode::SafePose)
}

fn rig_in_mode(mode: EmergencyMode) -> Rig {
    let mut rig = Rig::new().with_emergency_mode(mode);
    rig.register(
        0,
        vec![
            ServoSpec::new("base", 0).with_safe_angle(30.0),
            ServoSpec::new("arm", 1).with_range(40.0, 120.0),
        ],
    );
    rig
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn every_enabled_servo_reaches_its_safe_angle() {
    let mut rig = two_servo_rig();
    rig.tick(10, vec![set("base", 150.0), set("arm", 110.0)]);

    let out = rig.tick(20, vec![Command::EmergencyStop]);
    assert_eq!(out.snapshot.angle("base"), Some(30.0));
    assert_eq!(out.snapshot.angle("arm"), Some(80.0));
    for status in &out.snapshot.servos {
        assert_eq!(status.servo.source, AngleSource::SafePose);
    }
    assert_eq!(out.snapshot.safety.state, SafetyState::Recovering);
}

#[test]
fn disabled_servo_is_left_alone() {
    let mut rig = two_servo_rig();
    rig.tick(10, vec![set("arm", 110.0)]);
    rig.tick(15, vec![Command::Disable { id: "arm".to_string() }]);
    let out = rig.tick(20, vec![Command::EmergencyStop]);
    assert_eq!(out.snapshot.angle("arm"), Some(110.0));
    assert_eq!(out.snapshot.angle("base"), Some(30.0));
}

#[test]
fn explicit_command_in_the_stop_tick_is_discarded() {
    let mut rig = two_servo_rig();
    // Emergency stops are ordered first by the queue; here the set arrives
    // earlier in the same batch and must still lose.
    let out = rig.tick(10, vec![set("base", 170.0), Command::EmergencyStop]);
    assert!(out.outcomes[0].is_ok());
    assert_eq!(out.snapshot.angle("base"), Some(30.0));
}

#[test]
fn retrigger_during_recovering_restarts_cooldown() {
    let mut rig = two_servo_rig();
    rig.tick(600, vec![Command::EmergencyStop]);

    let out = rig.tick(2000, vec![Command::EmergencyStop]);
    assert_eq!(out.snapshot.safety.state, SafetyState::Recovering);
    assert_eq!(out.snapshot.safety.trigger_count, 2);
    assert_eq!(out.snapshot.safety.cooldown_remaining_ms, 3000);

    // The first cooldown would have ended at 3600.
    let out = rig.tick(3600, vec![set("base", 50.0)]);
    assert_eq!(out.snapshot.safety.state, SafetyState::Recovering);
    assert!(!out.outcomes[0].is_ok());

    let out = rig.tick(5000, vec![set("base", 50.0)]);
    assert_eq!(out.snapshot.safety.state, SafetyState::Normal);
    assert_eq!(out.snapshot.angle("base"), Some(50.0));
}

#[test]
fn safety_log_records_each_transition() {
    let mut rig = two_servo_rig();
    rig.tick(100, vec![Command::EmergencyStop]);
    let out = rig.tick(3100, vec![]);
    let transitions: Vec<_> = out
        .snapshot
        .safety
        .recent
        .iter()
        .map(|e| (e.from, e.to))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (SafetyState::Normal, SafetyState::EmergencyStop),
            (SafetyState::EmergencyStop, SafetyState::Recovering),
            (SafetyState::Recovering, SafetyState::Normal),
        ]
    );
    assert_eq!(out.snapshot.safety.recent[0].reason, Some(StopReason::Manual));
}

#[test]
fn watchdog_fires_on_silence_and_heartbeats_keep_it_quiet() {
    let mut rig = Rig::new().with_watchdog(500);
    rig.register(0, vec![ServoSpec::new("base", 0).with_safe_angle(45.0)]);

    for ms in (100..=1000).step_by(100) {
        let out = rig.tick(ms, vec![Command::Heartbeat]);
        assert_eq!(out.snapshot.safety.state, SafetyState::Normal, "at {ms} ms");
    }

    let out = rig.tick(1400, vec![]);
    assert_eq!(out.snapshot.safety.state, SafetyState::Normal);
    let out = rig.tick(1500, vec![]);
    assert_eq!(out.snapshot.safety.state, SafetyState::Recovering);
    assert_eq!(out.snapshot.safety.last_reason, Some(StopReason::Watchdog));
    assert_eq!(out.snapshot.angle("base"), Some(45.0));
    assert_eq!(rig.engine.watchdog().expirations(), 1);
}

#[test]
fn watchdog_is_disarmed_without_enabled_servos() {
    let mut rig = Rig::new().with_watchdog(500);
    let out = rig.tick(5000, vec![]);
    assert_eq!(out.snapshot.safety.state, SafetyState::Normal);
    assert_eq!(rig.engine.watchdog().expirations(), 0);
}

#[test]
fn stop_halts_timeline_and_blocks_named_poses() {
    let mut rig = two_servo_rig();
    rig.tick(0, vec![Command::Transport(TransportCommand::Play)]);
    let out = rig.tick(100, vec![Command::EmergencyStop]);
    assert_eq!(out.snapshot.timeline.mode, TransportMode::Stopped);
    assert_eq!(out.snapshot.timeline.current_time_ms, 0.0);

    let out = rig.tick(200, vec![Command::SafePose { name: "park".to_string() }]);
    assert_eq!(
        out.outcomes[0].error,
        Some(EngineError::MotionBlocked(SafetyState::Recovering))
    );
}

#[test]
fn hold_mode_freezes_last_angles() {
    let mut rig = rig_in_mode(EmergencyMode::Hold);
    rig.tick(10, vec![set("base", 150.0), set("arm", 110.0)]);
    let pulse = rig.probe.pulse(0);

    let out = rig.tick(20, vec![Command::EmergencyStop]);
    assert_eq!(out.snapshot.safety.emergency_mode, EmergencyMode::Hold);
    assert_eq!(out.snapshot.angle("base"), Some(150.0));
    assert_eq!(out.snapshot.angle("arm"), Some(110.0));
    for status in &out.snapshot.servos {
        assert_eq!(status.servo.source, AngleSource::Hold);
    }
    assert!(!out.snapshot.outputs_detached);
    assert_eq!(rig.probe.pulse(0), pulse);
    assert_eq!(out.snapshot.safety.state, SafetyState::Recovering);
}

#[test]
fn detach_mode_releases_pwm_until_recovery() {
    let mut rig = rig_in_mode(EmergencyMode::Detach);
    rig.tick(10, vec![set("base", 150.0)]);
    assert!(rig.probe.pulse(0).is_some());
    let writes = rig.probe.writes();

    let out = rig.tick(20, vec![Command::EmergencyStop]);
    assert!(out.snapshot.outputs_detached);
    assert_eq!(out.snapshot.angle("base"), Some(150.0));
    assert_eq!(rig.probe.pulse(0), None);
    assert_eq!(rig.probe.pulse(1), None);

    let out = rig.tick(1000, vec![]);
    assert!(out.snapshot.outputs_detached);
    assert_eq!(rig.probe.writes(), writes);
    assert_eq!(rig.probe.pulse(0), None);

    let out = rig.tick(3100, vec![set("base", 60.0)]);
    assert_eq!(out.snapshot.safety.state, SafetyState::Normal);
    assert!(!out.snapshot.outputs_detached);
    assert!(rig.probe.pulse(0).is_some());
    assert!(rig.probe.writes() > writes);
    assert_eq!(out.snapshot.angle("base"), Some(60.0));
}

#[test]
fn every_mode_blocks_motion_until_recovery() {
    for mode in [EmergencyMode::SafePose, EmergencyMode::Hold, EmergencyMode::Detach] {
        let mut rig = rig_in_mode(mode);
        rig.tick(10, vec![Command::EmergencyStop]);
        let out = rig.tick(
            500,
            vec![
                set("base", 50.0),
                Command::SafePose { name: "park".to_string() },
                Command::Transport(TransportCommand::Play),
            ],
        );
        for outcome in &out.outcomes {
            assert_eq!(
                outcome.error,
                Some(EngineError::MotionBlocked(SafetyState::Recovering)),
                "{mode:?} {}",
                outcome.command
            );
        }
        let out = rig.tick(3010, vec![set("base", 50.0)]);
        assert!(out.outcomes[0].is_ok(), "{mode:?}");
        assert_eq!(out.snapshot.angle("base"), Some(50.0), "{mode:?}");
    }
}
