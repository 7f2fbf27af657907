//! Timeline engine: keyframe tracks, transport and recording.

pub mod track;
pub mod transport;

pub use transport::TimelineEngine;
