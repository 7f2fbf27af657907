//! # Servo Control Unit Library
//!
//! Orchestration engine for up to 16 hobby servos shared by many concurrent
//! clients. One fixed-period tick loop is the single writer of all state;
//! clients only enqueue commands and watch published snapshots.
//!
//! ## Architecture Levels
//!
//! 1. **Registry** (`registry`): authoritative servo records, never outside
//!    their ranges
//! 2. **Safety** (`safety`): NORMAL / EMERGENCY_STOP / RECOVERING overlay,
//!    watchdog, preflight, named safe poses
//! 3. **Sources** (`preset`, `timeline`): parametric waveforms and keyframe
//!    playback, sampled once per tick
//! 4. **Arbitration** (`command`, `engine`): explicit > preset > timeline >
//!    hold, one source per servo per tick
//! 5. **Output** (`output`): inline or offloaded pulse writes; failures mark
//!    servos stale
//!
//! ## Runtime
//!
//! `cycle::TickRunner` owns the engine, drains the command queue every
//! period and publishes through `publish::Publisher`. Configuration comes
//! from TOML (`config`), projects from JSON (`store`).

pub mod command;
pub mod config;
pub mod cycle;
pub mod engine;
pub mod output;
pub mod preset;
pub mod publish;
pub mod registry;
pub mod safety;
pub mod store;
pub mod timeline;
