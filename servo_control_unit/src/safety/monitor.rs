//! NORMAL → EMERGENCY_STOP → RECOVERING → NORMAL.
//!
//! All timing uses `Instant`; nothing can shorten the cooldown. A trigger
//! while RECOVERING re-enters EMERGENCY_STOP and the cooldown starts over
//! once the stop frame is handled again. What that frame does (safe pose,
//! hold or detach) is the monitor's [`EmergencyMode`].

use std::time::{Duration, Instant};

use heapless::Deque;
use servo_common::consts::SAFETY_LOG_CAPACITY;
use servo_common::engine::safety::SafetyLogEntry;
use servo_common::engine::snapshot::SafetySnapshot;
use servo_common::engine::state::{EmergencyMode, SafetyState, StopReason};
use tracing::{info, warn};

/// Events that drive the safety state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyEvent {
    /// Emergency-stop command or watchdog expiry.
    Trigger(StopReason),
    /// Stop frame handled: safe pose or held angles handed to the output,
    /// or the outputs released.
    SafePoseApplied,
    /// Cooldown has fully elapsed.
    CooldownElapsed,
}

/// Result of a transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyTransition {
    Ok(SafetyState),
    Rejected(&'static str),
}

pub struct SafetyMonitor {
    state: SafetyState,
    mode: EmergencyMode,
    cooldown: Duration,
    recovering_since: Option<Instant>,
    last_reason: Option<StopReason>,
    trigger_count: u64,
    log: Deque<SafetyLogEntry, SAFETY_LOG_CAPACITY>,
}

impl SafetyMonitor {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: SafetyState::Normal,
            mode: EmergencyMode::default(),
            cooldown,
            recovering_since: None,
            last_reason: None,
            trigger_count: 0,
            log: Deque::new(),
        }
    }

    pub fn with_mode(mut self, mode: EmergencyMode) -> Self {
        self.mode = mode;
        self
    }

    #[inline]
    pub const fn emergency_mode(&self) -> EmergencyMode {
        self.mode
    }

    #[inline]
    pub const fn state(&self) -> SafetyState {
        self.state
    }

    #[inline]
    pub const fn permits_motion(&self) -> bool {
        self.state.permits_motion()
    }

    /// In EMERGENCY_STOP, waiting for the stop frame.
    #[inline]
    pub const fn is_stopping(&self) -> bool {
        matches!(self.state, SafetyState::EmergencyStop)
    }

    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Handle a safety event at time `now` during tick `tick`.
    pub fn handle_event(&mut self, event: SafetyEvent, now: Instant, tick: u64) -> SafetyTransition {
        use SafetyEvent as E;
        use SafetyState as S;

        let from = self.state;
        let next = match (from, event) {
            (S::Normal | S::Recovering, E::Trigger(_)) => S::EmergencyStop,
            // Already stopping; a second trigger changes nothing.
            (S::EmergencyStop, E::Trigger(_)) => return SafetyTransition::Ok(S::EmergencyStop),
            (S::EmergencyStop, E::SafePoseApplied) => S::Recovering,
            (S::Recovering, E::CooldownElapsed) => S::Normal,
            _ => return SafetyTransition::Rejected("invalid safety transition"),
        };

        let reason = match event {
            E::Trigger(reason) => {
                self.trigger_count += 1;
                self.last_reason = Some(reason);
                warn!("EMERGENCY STOP ({reason:?}) from {from:?} at tick {tick}");
                Some(reason)
            }
            _ => None,
        };
        self.recovering_since = (next == S::Recovering).then_some(now);
        if next == S::Normal {
            info!("Safety recovered to NORMAL at tick {tick}");
        }

        self.state = next;
        self.push_log(SafetyLogEntry {
            tick,
            from,
            to: next,
            reason,
        });
        SafetyTransition::Ok(next)
    }

    /// Trigger an emergency stop. Returns `true` when this entered
    /// EMERGENCY_STOP (as opposed to already being there).
    pub fn trigger(&mut self, reason: StopReason, now: Instant, tick: u64) -> bool {
        let was = self.state;
        matches!(
            self.handle_event(SafetyEvent::Trigger(reason), now, tick),
            SafetyTransition::Ok(SafetyState::EmergencyStop)
        ) && was != SafetyState::EmergencyStop
    }

    /// Confirm the safe-pose frame; starts the cooldown.
    pub fn confirm_safe_pose(&mut self, now: Instant, tick: u64) {
        let _ = self.handle_event(SafetyEvent::SafePoseApplied, now, tick);
    }

    /// Leave RECOVERING once the cooldown has elapsed. Returns `true` on
    /// the transition to NORMAL.
    pub fn poll(&mut self, now: Instant, tick: u64) -> bool {
        match self.recovering_since {
            Some(since) if now.saturating_duration_since(since) >= self.cooldown => {
                self.handle_event(SafetyEvent::CooldownElapsed, now, tick)
                    == SafetyTransition::Ok(SafetyState::Normal)
            }
            _ => false,
        }
    }

    pub fn cooldown_remaining(&self, now: Instant) -> Duration {
        match (self.state, self.recovering_since) {
            (SafetyState::Recovering, Some(since)) => {
                self.cooldown.saturating_sub(now.saturating_duration_since(since))
            }
            (SafetyState::EmergencyStop, _) => self.cooldown,
            _ => Duration::ZERO,
        }
    }

    fn push_log(&mut self, entry: SafetyLogEntry) {
        if self.log.is_full() {
            self.log.pop_front();
        }
        // Room was made above.
        let _ = self.log.push_back(entry);
    }

    pub fn log(&self) -> impl Iterator<Item = &SafetyLogEntry> {
        self.log.iter()
    }

    pub fn snapshot(&self, now: Instant, recent: usize) -> SafetySnapshot {
        let skip = self.log.len().saturating_sub(recent);
        SafetySnapshot {
            state: self.state,
            emergency_mode: self.mode,
            cooldown_remaining_ms: self.cooldown_remaining(now).as_millis() as u64,
            last_reason: self.last_reason,
            trigger_count: self.trigger_count,
            recent: self.log.iter().skip(skip).copied().collect(),
        }
    }
}
