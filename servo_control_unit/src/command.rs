//! Command processing root.
//!
//! Client command queue, command application and per-servo source arbitration.

pub mod arbitration;
pub mod queue;

pub use queue::{CommandReceiver, CommandSender, command_queue};
