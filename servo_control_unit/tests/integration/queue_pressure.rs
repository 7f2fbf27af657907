//! Integration test: client handles, queue overflow and the tick runner.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use servo_common::engine::command::{ClientId, Command, CommandOutcome};
use servo_common::engine::error::{EngineError, ErrorKind, ServoFlags};
use servo_common::engine::servo::ServoSpec;
use servo_common::engine::state::{SafetyState, StopReason};
use servo_control_unit::cycle::TickRunner;
use servo_control_unit::engine::Engine;
use servo_control_unit::output::OutputStage;
use servo_control_unit::publish::EngineEvent;
use servo_hal::SimulationPwm;
use tokio::sync::broadcast::Receiver;

use super::set;

fn runner(capacity: usize, t0: Instant) -> TickRunner {
    let engine = Engine::new(OutputStage::inline(Box::new(SimulationPwm::new())), t0).with_watchdog(None, t0);
    TickRunner::new(engine, capacity, Duration::from_millis(20))
}

fn outcomes(events: &mut Receiver<EngineEvent>) -> Vec<CommandOutcome> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::Outcome(o) = event {
            out.push(o);
        }
    }
    out
}

#[test]
fn full_queue_drops_oldest_and_reports_it() {
    let t0 = Instant::now();
    let mut runner = runner(4, t0);
    let handle = runner.handle();
    handle.send(Command::Register(ServoSpec::new("base", 0)));
    runner.tick_at(t0);

    let mut events = handle.subscribe();
    for angle in 1..=10 {
        handle.send(set("base", f64::from(angle)));
    }
    let snap = runner.tick_at(t0 + Duration::from_millis(20));

    assert_eq!(snap.queue_dropped, 6);
    assert_eq!(snap.angle("base"), Some(10.0));
    let applied = outcomes(&mut events);
    assert_eq!(applied.len(), 4);
    assert!(applied.iter().all(|o| o.is_ok()));

    // The counter is cumulative and stays put while nothing overflows.
    handle.send(set("base", 11.0));
    let snap = runner.tick_at(t0 + Duration::from_millis(40));
    assert_eq!(snap.queue_dropped, 6);
}

#[test]
fn emergency_stop_survives_overflow_and_runs_first() {
    let t0 = Instant::now();
    let mut runner = runner(2, t0);
    let handle = runner.handle();
    handle.send(Command::Register(ServoSpec::new("base", 0).with_safe_angle(15.0)));
    runner.tick_at(t0);

    let mut events = handle.subscribe();
    for angle in [100.0, 110.0, 120.0, 130.0, 140.0] {
        handle.send(set("base", angle));
    }
    let stop_seq = handle.emergency_stop();
    let snap = runner.tick_at(t0 + Duration::from_millis(20));

    let applied = outcomes(&mut events);
    assert_eq!(applied.len(), 3);
    assert_eq!(applied[0].seq, stop_seq);
    assert!(applied[0].is_ok());
    for o in &applied[1..] {
        assert_eq!(o.error, Some(EngineError::MotionBlocked(SafetyState::EmergencyStop)));
        assert_eq!(o.error_kind, Some(ErrorKind::Safety));
    }

    assert_eq!(snap.queue_dropped, 3);
    assert_eq!(snap.angle("base"), Some(15.0));
    assert!(snap.servo("base").unwrap().flags.contains(ServoFlags::FORCED_SAFE));
    assert_eq!(snap.safety.last_reason, Some(StopReason::Manual));
}

#[test]
fn concurrent_clients_are_serialized_in_arrival_order() {
    const CLIENTS: usize = 8;
    const PER_CLIENT: usize = 25;

    let t0 = Instant::now();
    let mut runner = runner(1024, t0);
    let observer = runner.handle();
    let mut events = observer.subscribe();

    let senders: Vec<_> = (0..CLIENTS)
        .map(|_| {
            let handle = runner.handle();
            thread::spawn(move || {
                for _ in 0..PER_CLIENT {
                    handle.heartbeat();
                }
                handle.client()
            })
        })
        .collect();
    let clients: Vec<ClientId> = senders.into_iter().map(|h| h.join().unwrap()).collect();

    runner.tick_at(t0);
    let applied = outcomes(&mut events);
    assert_eq!(applied.len(), CLIENTS * PER_CLIENT);
    assert!(applied.windows(2).all(|w| w[0].seq < w[1].seq));

    let mut per_client: HashMap<ClientId, usize> = HashMap::new();
    for o in &applied {
        *per_client.entry(o.client).or_default() += 1;
    }
    assert_eq!(per_client.len(), CLIENTS);
    for client in clients {
        assert_eq!(per_client[&client], PER_CLIENT);
    }
}

#[test]
fn runner_serves_a_client_thread() {
    let t0 = Instant::now();
    let mut runner = TickRunner::new(
        Engine::new(OutputStage::inline(Box::new(SimulationPwm::new())), t0).with_watchdog(None, t0),
        64,
        Duration::from_millis(2),
    );
    let handle = runner.handle();
    let running = Arc::new(AtomicBool::new(true));

    let flag = Arc::clone(&running);
    let client = thread::spawn(move || {
        let mut events = handle.subscribe();
        handle.send(Command::Register(ServoSpec::new("base", 0)));
        handle.send(set("base", 42.0));

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while !seen && Instant::now() < deadline {
            match events.try_recv() {
                Ok(EngineEvent::Snapshot(s)) => seen = s.angle("base") == Some(42.0),
                Ok(EngineEvent::Outcome(_)) => {}
                Err(_) => thread::sleep(Duration::from_millis(1)),
            }
        }
        flag.store(false, Ordering::Relaxed);
        (seen, handle.preflight())
    });

    runner.run(&running);
    let (seen, report) = client.join().unwrap();
    assert!(seen, "client never observed its command");
    assert!(report.check("channels_mapped").is_some());
    assert!(runner.stats().cycle_count >= 1);
    assert_eq!(runner.engine().registry().len(), 1);
}
