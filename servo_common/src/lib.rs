//! Servo Common Library
//!
//! Shared constants, data model and configuration loading utilities for
//! all crates of the servo orchestration workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Channel counts, envelopes and timing defaults
//! - [`config`] - Configuration loading traits and types
//! - [`engine`] - Data model of the orchestration engine (servos, commands,
//!   presets, timelines, safety reports, snapshots, errors)
//! - [`output`] - PWM output adapter contract
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use servo_common::prelude::*;
//!
//! let spec = ServoSpec::new("base", 0);
//! assert_eq!(spec.safe_angle(), 90.0);
//! ```

pub mod config;
pub mod consts;
pub mod engine;
pub mod output;
pub mod prelude;
