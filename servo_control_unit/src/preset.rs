//! Preset engine: parametric waveforms driving groups of servos.

pub mod engine;
pub mod library;
pub mod waveform;

pub use engine::{PresetEngine, PresetStart};
pub use library::PresetLibrary;
