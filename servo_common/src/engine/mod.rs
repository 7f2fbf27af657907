//! Data model of the servo orchestration engine.
//!
//! Types shared by the control unit, drivers and any transport layer:
//! servo records, commands, preset and timeline definitions, safety
//! reports, snapshots and the rejection error taxonomy.

pub mod command;
pub mod config;
pub mod error;
pub mod preset;
pub mod safety;
pub mod servo;
pub mod snapshot;
pub mod state;
pub mod timeline;
