//! Safety monitor: emergency-stop state machine, watchdog, safe poses and
//! the read-only preflight check.

pub mod monitor;
pub mod pose;
pub mod preflight;
pub mod watchdog;
