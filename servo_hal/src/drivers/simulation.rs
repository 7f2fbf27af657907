//! Simulation backend.
//!
//! `SimulationPwm` keeps the last pulse written to every channel in memory.
//! A [`SimulationProbe`] shares that state so tests (or a dashboard) can
//! inspect outputs after the backend has been moved into the tick loop, and
//! inject bus failures or write latency.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use servo_common::consts::MAX_CHANNELS;
use servo_common::output::{check_channel, HardwareError, OutputDiagnostics, PwmOutput};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct SimState {
    pulses: [Option<u16>; MAX_CHANNELS],
    writes: u64,
    failures: u64,
    max_write_us: u64,
    failing: [bool; MAX_CHANNELS],
    latency: Duration,
    log: Vec<(u8, u16)>,
}

/// In-memory PWM backend.
pub struct SimulationPwm {
    state: Arc<Mutex<SimState>>,
}

/// Shared view into a [`SimulationPwm`].
#[derive(Clone)]
pub struct SimulationProbe {
    state: Arc<Mutex<SimState>>,
}

impl SimulationPwm {
    /// Create a backend with all channels idle.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Backend plus a probe sharing its state.
    pub fn with_probe() -> (Self, SimulationProbe) {
        let pwm = Self::new();
        let probe = SimulationProbe {
            state: Arc::clone(&pwm.state),
        };
        (pwm, probe)
    }
}

impl Default for SimulationPwm {
    fn default() -> Self {
        Self::new()
    }
}

impl PwmOutput for SimulationPwm {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn write(&mut self, channel: u8, pulse_us: u16) -> Result<(), HardwareError> {
        check_channel(channel)?;
        let started = Instant::now();
        let latency = self.state.lock().latency;
        if !latency.is_zero() {
            thread::sleep(latency);
        }

        let mut st = self.state.lock();
        let idx = usize::from(channel);
        if st.failing[idx] {
            st.failures += 1;
            return Err(HardwareError::Bus {
                channel,
                reason: "simulated NACK".to_string(),
            });
        }
        st.pulses[idx] = Some(pulse_us);
        st.writes += 1;
        st.log.push((channel, pulse_us));
        let took = started.elapsed().as_micros() as u64;
        st.max_write_us = st.max_write_us.max(took);
        Ok(())
    }

    fn release_all(&mut self) -> Result<(), HardwareError> {
        let mut st = self.state.lock();
        st.pulses = [None; MAX_CHANNELS];
        info!("Simulation PWM released all channels");
        Ok(())
    }

    fn diagnostics(&self) -> Option<OutputDiagnostics> {
        let st = self.state.lock();
        Some(OutputDiagnostics {
            writes: st.writes,
            failures: st.failures,
            max_write_us: st.max_write_us,
        })
    }
}

impl SimulationProbe {
    /// Last pulse written to `channel`, `None` if idle or released.
    pub fn pulse(&self, channel: u8) -> Option<u16> {
        self.state
            .lock()
            .pulses
            .get(usize::from(channel))
            .copied()
            .flatten()
    }

    /// Successful writes so far.
    pub fn writes(&self) -> u64 {
        self.state.lock().writes
    }

    /// Failed writes so far.
    pub fn failures(&self) -> u64 {
        self.state.lock().failures
    }

    /// Make writes to `channel` fail (or succeed again).
    pub fn set_failing(&self, channel: u8, failing: bool) {
        if let Some(slot) = self.state.lock().failing.get_mut(usize::from(channel)) {
            *slot = failing;
            debug!("Simulation PWM channel {channel} failing={failing}");
        }
    }

    /// Delay every write by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Drain the ordered log of successful writes.
    pub fn take_log(&self) -> Vec<(u8, u16)> {
        std::mem::take(&mut self.state.lock().log)
    }
}

/// Factory function for the driver registry.
pub fn create_driver() -> Box<dyn PwmOutput> {
    Box::new(SimulationPwm::new())
}
