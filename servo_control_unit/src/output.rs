//! Output stage between the tick loop and a [`PwmOutput`] backend.
//!
//! - **Inline**: writes happen inside the tick. For fast or simulated backends.
//! - **Offloaded**: a dedicated writer thread behind `sync_channel(1)`. The
//!   tick hands frames over with `try_send` and picks results up with
//!   `try_recv`; a frame that does not fit is dropped and its servos are
//!   reported [`HardwareError::WriterBusy`]. The tick never waits on I/O.
//!
//! [`OutputStage::release`] turns every channel off without stopping the
//! stage; the next submitted frame drives the channels again.

use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::thread::{self, JoinHandle};

use servo_common::engine::servo::ServoId;
use servo_common::output::{HardwareError, OutputDiagnostics, PwmOutput};
use tracing::{debug, info, warn};

/// One pulse for one servo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseWrite {
    pub id: ServoId,
    pub channel: u8,
    pub pulse_us: u16,
}

/// Completion of a [`PulseWrite`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResult {
    pub id: ServoId,
    pub channel: u8,
    pub result: Result<(), HardwareError>,
}

type Frame = Vec<PulseWrite>;

/// Work for the writer thread.
enum Job {
    Frame(Frame),
    Release,
}

pub struct OutputStage {
    name: &'static str,
    mode: Mode,
}

enum Mode {
    Inline {
        output: Box<dyn PwmOutput>,
        completed: Vec<WriteResult>,
    },
    Offloaded(Writer),
}

struct Writer {
    frames: Option<SyncSender<Job>>,
    results: Receiver<Vec<WriteResult>>,
    worker: Option<JoinHandle<Option<OutputDiagnostics>>>,
    rejected: Vec<WriteResult>,
    /// Release requested while the channel was full.
    release_pending: bool,
}

fn release_channels(output: &mut dyn PwmOutput) {
    match output.release_all() {
        Ok(()) => info!("Output '{}' released all channels", output.name()),
        Err(e) => warn!("Output release failed: {e}"),
    }
}

fn write_frame(output: &mut dyn PwmOutput, frame: Frame) -> Vec<WriteResult> {
    frame
        .into_iter()
        .map(|w| WriteResult {
            result: output.write(w.channel, w.pulse_us),
            id: w.id,
            channel: w.channel,
        })
        .collect()
}

impl OutputStage {
    pub fn inline(output: Box<dyn PwmOutput>) -> Self {
        Self {
            name: output.name(),
            mode: Mode::Inline {
                output,
                completed: Vec::new(),
            },
        }
    }

    /// Move `output` onto a writer thread.
    ///
    /// # Errors
    /// Thread spawn failure.
    pub fn offloaded(mut output: Box<dyn PwmOutput>) -> std::io::Result<Self> {
        let name = output.name();
        let (frame_tx, frame_rx) = mpsc::sync_channel::<Job>(1);
        let (result_tx, result_rx) = mpsc::channel::<Vec<WriteResult>>();
        let worker = thread::Builder::new()
            .name(format!("pwm-writer-{name}"))
            .spawn(move || {
                while let Ok(job) = frame_rx.recv() {
                    match job {
                        Job::Frame(frame) => {
                            let results = write_frame(output.as_mut(), frame);
                            if result_tx.send(results).is_err() {
                                break;
                            }
                        }
                        Job::Release => release_channels(output.as_mut()),
                    }
                }
                if let Err(e) = output.release_all() {
                    warn!("Output release failed: {e}");
                }
                debug!("PWM writer thread exiting");
                output.diagnostics()
            })?;
        info!("Output '{name}' offloaded to writer thread");
        Ok(Self {
            name,
            mode: Mode::Offloaded(Writer {
                frames: Some(frame_tx),
                results: result_rx,
                worker: Some(worker),
                rejected: Vec::new(),
                release_pending: false,
            }),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_offloaded(&self) -> bool {
        matches!(self.mode, Mode::Offloaded(_))
    }

    /// Hand one frame to the backend. Never blocks on I/O when offloaded.
    pub fn submit(&mut self, frame: Vec<PulseWrite>) {
        if frame.is_empty() {
            return;
        }
        match &mut self.mode {
            Mode::Inline { output, completed } => {
                completed.extend(write_frame(output.as_mut(), frame));
            }
            Mode::Offloaded(writer) => {
                // A pending release goes first; the frame re-attaches afterwards.
                writer.flush_release();
                if writer.release_pending {
                    writer.reject(frame, HardwareError::WriterBusy);
                    return;
                }
                let Some(tx) = &writer.frames else {
                    writer.reject(frame, HardwareError::NotInitialized);
                    return;
                };
                match tx.try_send(Job::Frame(frame)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(Job::Frame(frame))) => {
                        warn!("PWM writer busy, frame of {} write(s) dropped", frame.len());
                        writer.reject(frame, HardwareError::WriterBusy);
                    }
                    Err(TrySendError::Disconnected(Job::Frame(frame))) => {
                        warn!("PWM writer thread gone");
                        writer.frames = None;
                        writer.reject(frame, HardwareError::NotInitialized);
                    }
                    // Only frames are sent here.
                    Err(_) => {}
                }
            }
        }
    }

    /// Every write result that completed since the last call.
    pub fn collect(&mut self) -> Vec<WriteResult> {
        match &mut self.mode {
            Mode::Inline { completed, .. } => std::mem::take(completed),
            Mode::Offloaded(writer) => {
                writer.flush_release();
                let mut out = std::mem::take(&mut writer.rejected);
                loop {
                    match writer.results.try_recv() {
                        Ok(batch) => out.extend(batch),
                        Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                    }
                }
                out
            }
        }
    }

    /// Turn every channel off and keep the stage running. When offloaded the
    /// release is queued behind the frame in flight and retried on later
    /// calls if the writer is busy.
    pub fn release(&mut self) {
        match &mut self.mode {
            Mode::Inline { output, .. } => release_channels(output.as_mut()),
            Mode::Offloaded(writer) => {
                writer.release_pending = true;
                writer.flush_release();
            }
        }
    }

    /// Release every channel. Offloaded stages stop and join their writer.
    pub fn shutdown(&mut self) -> Option<OutputDiagnostics> {
        match &mut self.mode {
            Mode::Inline { output, .. } => {
                if let Err(e) = output.release_all() {
                    warn!("Output release failed: {e}");
                }
                output.diagnostics()
            }
            Mode::Offloaded(writer) => writer.stop(),
        }
    }

    /// Backend counters; unavailable while the writer thread owns the backend.
    pub fn diagnostics(&self) -> Option<OutputDiagnostics> {
        match &self.mode {
            Mode::Inline { output, .. } => output.diagnostics(),
            Mode::Offloaded(_) => None,
        }
    }
}

impl Writer {
    fn flush_release(&mut self) {
        if !self.release_pending {
            return;
        }
        let Some(tx) = &self.frames else {
            self.release_pending = false;
            return;
        };
        match tx.try_send(Job::Release) {
            Ok(()) => self.release_pending = false,
            Err(TrySendError::Full(_)) => debug!("PWM writer busy, release deferred"),
            Err(TrySendError::Disconnected(_)) => {
                self.frames = None;
                self.release_pending = false;
            }
        }
    }

    fn reject(&mut self, frame: Frame, error: HardwareError) {
        self.rejected.extend(frame.into_iter().map(|w| WriteResult {
            id: w.id,
            channel: w.channel,
            result: Err(error.clone()),
        }));
    }

    fn stop(&mut self) -> Option<OutputDiagnostics> {
        // Closing the channel ends the worker loop.
        self.frames = None;
        let handle = self.worker.take()?;
        match handle.join() {
            Ok(diag) => diag,
            Err(_) => {
                warn!("PWM writer thread panicked");
                None
            }
        }
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
