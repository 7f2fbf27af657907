//! Fixed-period tick loop: drain → tick → publish.
//!
//! ## Cycle Loop
//! The runner owns the [`Engine`] by value; it is the single writer of
//! every piece of engine state. Each period it drains the command queue,
//! runs one engine tick and publishes the result.
//!
//! ## Overruns
//! A tick body longer than the period is logged and counted. The next tick
//! starts at the next period boundary after the overrun; missed ticks are
//! skipped, never stacked.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use servo_common::engine::command::ClientId;
use servo_common::engine::snapshot::StateSnapshot;
use tracing::{info, warn};

use crate::command::{CommandReceiver, command_queue};
use crate::engine::Engine;
use crate::publish::{ControlHandle, Publisher};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total ticks executed.
    pub cycle_count: u64,
    /// Last tick body duration [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Running sum of squares for stddev computation.
    pub sum_sq_cycle_ns: i128,
    /// Ticks whose body exceeded the period.
    pub overruns: u64,
    /// Period boundaries skipped after overruns.
    pub skipped: u64,
    /// Maximum wake-up latency [ns] (actual minus scheduled start).
    pub max_latency_ns: i64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            sum_sq_cycle_ns: 0,
            overruns: 0,
            skipped: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a tick duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += duration_ns;
        self.sum_sq_cycle_ns += i128::from(duration_ns) * i128::from(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average tick time [ns] (0 if no ticks).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }

    /// Population standard deviation of the tick time [ns].
    pub fn stddev_cycle_ns(&self) -> f64 {
        if self.cycle_count == 0 {
            return 0.0;
        }
        let n = self.cycle_count as f64;
        let mean = self.sum_cycle_ns as f64 / n;
        (self.sum_sq_cycle_ns as f64 / n - mean * mean).max(0.0).sqrt()
    }
}

/// First period boundary strictly after `now`, counting from `scheduled`,
/// the boundary the finished tick started on. Returns that boundary and how
/// many periods it lies past `scheduled`.
pub fn next_boundary(scheduled: Instant, now: Instant, period: Duration) -> (Instant, u64) {
    if now < scheduled || period.is_zero() {
        return (scheduled, 0);
    }
    let behind = now.duration_since(scheduled).as_nanos();
    let skipped = behind / period.as_nanos() + 1;
    let advance = period.as_nanos() * skipped;
    let next = scheduled + Duration::from_nanos(u64::try_from(advance).unwrap_or(u64::MAX));
    (next, u64::try_from(skipped).unwrap_or(u64::MAX))
}

// ─── Tick Runner ────────────────────────────────────────────────────

pub struct TickRunner {
    engine: Engine,
    queue: CommandReceiver,
    publisher: Publisher,
    period: Duration,
    stats: CycleStats,
    next_client: AtomicU64,
}

impl TickRunner {
    pub fn new(engine: Engine, queue_capacity: usize, period: Duration) -> Self {
        let (_, queue) = command_queue(queue_capacity);
        let publisher = Publisher::new(engine.watchdog().timeout());
        Self {
            engine,
            queue,
            publisher,
            period,
            stats: CycleStats::new(),
            next_client: AtomicU64::new(1),
        }
    }

    /// Handle for a new client. Each call gets a distinct [`ClientId`].
    pub fn handle(&self) -> ControlHandle {
        let client = ClientId(self.next_client.fetch_add(1, Ordering::Relaxed));
        self.publisher.handle(self.queue.sender(), client)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// One tick at `now`: drain, tick, publish.
    pub fn tick_at(&mut self, now: Instant) -> Arc<StateSnapshot> {
        let events = self.queue.drain();
        self.engine.set_queue_dropped(self.queue.dropped());
        let output = self.engine.tick(now, events);
        self.publisher.publish(output)
    }

    /// Tick every period until `running` is cleared, then release outputs.
    pub fn run(&mut self, running: &AtomicBool) {
        info!(
            "Tick loop started: period {} µs, output '{}'",
            self.period.as_micros(),
            self.engine.output_name()
        );
        let mut scheduled = Instant::now();
        while running.load(Ordering::Relaxed) {
            let start = Instant::now();
            let latency = start.saturating_duration_since(scheduled);
            self.tick_at(start);
            let elapsed = start.elapsed();
            self.stats
                .record(duration_ns(elapsed), duration_ns(latency));

            if elapsed > self.period {
                self.stats.overruns += 1;
                warn!(
                    "Tick {} overran: {} µs > {} µs budget ({} overrun(s))",
                    self.engine.tick_count(),
                    elapsed.as_micros(),
                    self.period.as_micros(),
                    self.stats.overruns
                );
            }

            let (next, skipped) = next_boundary(scheduled, Instant::now(), self.period);
            if skipped > 1 {
                self.stats.skipped += skipped - 1;
            }
            scheduled = next;
            std::thread::sleep(scheduled.saturating_duration_since(Instant::now()));
        }
        info!(
            "Tick loop stopped after {} tick(s): avg {} ns, max {} ns, {} overrun(s)",
            self.stats.cycle_count,
            self.stats.avg_cycle_ns(),
            self.stats.max_cycle_ns,
            self.stats.overruns
        );
        self.engine.shutdown();
    }
}

fn duration_ns(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}
