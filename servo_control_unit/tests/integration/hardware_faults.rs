//! Integration test: output failures surface as stale servos, never as
//! lost intent.

use std::thread;
use std::time::{Duration, Instant};

use servo_common::engine::command::{ClientId, Command, CommandEvent};
use servo_common::engine::error::ServoFlags;
use servo_common::engine::safety::CheckStatus;
use servo_common::engine::servo::ServoSpec;
use servo_control_unit::engine::{Engine, TickOutput};
use servo_control_unit::output::OutputStage;
use servo_hal::SimulationPwm;

use super::{Rig, set};

fn flags(out: &TickOutput, id: &str) -> ServoFlags {
    out.snapshot.servo(id).unwrap().flags
}

#[test]
fn failed_write_marks_stale_and_keeps_intent() {
    let mut rig = Rig::new();
    rig.register(0, vec![ServoSpec::new("base", 0), ServoSpec::new("arm", 1)]);

    let out = rig.tick(10, vec![set("base", 45.0)]);
    assert!(!flags(&out, "base").contains(ServoFlags::STALE));
    assert_eq!(rig.probe.pulse(0), Some(1125));

    rig.probe.set_failing(0, true);
    let out = rig.tick(20, vec![set("base", 60.0), set("arm", 30.0)]);
    assert!(out.outcomes.iter().all(|o| o.is_ok()), "write failures never reject commands");
    assert!(flags(&out, "base").contains(ServoFlags::STALE));
    assert!(!flags(&out, "arm").contains(ServoFlags::STALE));
    assert_eq!(out.snapshot.angle("base"), Some(60.0));
    assert_eq!(rig.probe.pulse(0), Some(1125), "actuator still at the old pulse");
    assert!(rig.probe.failures() >= 1);

    let report = rig.engine.preflight();
    let healthy = report.check("outputs_healthy").unwrap();
    assert_eq!(healthy.status, CheckStatus::Warn);
    assert!(healthy.detail.contains("'base'"));

    rig.probe.set_failing(0, false);
    let out = rig.tick(30, vec![]);
    assert!(!flags(&out, "base").contains(ServoFlags::STALE));
    assert_eq!(rig.probe.pulse(0), Some(1250));
    assert_eq!(
        rig.engine.preflight().check("outputs_healthy").unwrap().status,
        CheckStatus::Pass
    );
}

#[test]
fn emergency_stop_with_failing_bus_still_records_safe_pose() {
    let mut rig = Rig::new();
    rig.register(0, vec![ServoSpec::new("base", 0).with_safe_angle(20.0)]);
    rig.tick(10, vec![set("base", 150.0)]);

    rig.probe.set_failing(0, true);
    let out = rig.tick(20, vec![Command::EmergencyStop]);
    let f = flags(&out, "base");
    assert!(f.contains(ServoFlags::STALE | ServoFlags::FORCED_SAFE));
    assert_eq!(out.snapshot.angle("base"), Some(20.0));
}

#[test]
fn disabled_servo_is_not_written() {
    let mut rig = Rig::new();
    rig.register(0, vec![ServoSpec::new("base", 0)]);
    rig.tick(10, vec![]);
    let before = rig.probe.writes();

    let out = rig.tick(20, vec![Command::Disable { id: "base".to_string() }]);
    assert!(flags(&out, "base").contains(ServoFlags::DISABLED));
    rig.tick(30, vec![]);
    assert_eq!(rig.probe.writes(), before);
}

#[test]
fn busy_offloaded_writer_drops_frames() {
    let t0 = Instant::now();
    let (pwm, probe) = SimulationPwm::with_probe();
    probe.set_latency(Duration::from_millis(200));
    let stage = OutputStage::offloaded(Box::new(pwm)).unwrap();
    assert!(stage.is_offloaded());
    let mut engine = Engine::new(stage, t0).with_watchdog(None, t0);

    let register = CommandEvent {
        seq: 0,
        client: ClientId(1),
        command: Command::Register(ServoSpec::new("base", 0)),
    };
    // One frame in flight, one buffered, the third has nowhere to go.
    let first = engine.tick(t0, vec![register]);
    assert!(first.outcomes[0].is_ok());
    let busy: Vec<bool> = (1..=2)
        .map(|i| {
            let out = engine.tick(t0 + Duration::from_millis(i), Vec::new());
            out.snapshot.servo("base").unwrap().flags.contains(ServoFlags::STALE)
        })
        .collect();
    assert!(busy.contains(&true), "{busy:?}");

    // Once the writer drains, completed writes clear the flag.
    thread::sleep(Duration::from_millis(700));
    let out = engine.tick(t0 + Duration::from_millis(1000), Vec::new());
    assert!(!out.snapshot.servo("base").unwrap().flags.contains(ServoFlags::STALE));

    engine.shutdown();
    assert_eq!(probe.pulse(0), None, "channels released on shutdown");
}
