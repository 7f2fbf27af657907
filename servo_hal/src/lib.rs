//! # Servo HAL Library
//!
//! PWM output backends behind the `PwmOutput` trait defined in
//! `servo_common::output`, and the registry the control unit uses to pick
//! one by name at startup.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - Backend factory registration
//! - [`drivers`] - Backend implementations
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     servo_control_unit                    │
//! │   tick loop ──► OutputStage (inline | offloaded thread)   │
//! └──────────────────────────────┬────────────────────────────┘
//!                                │ write(channel, pulse_us)
//!                                ▼
//!                   ┌────────────────────────┐
//!                   │  PwmOutput (trait obj) │◄── DriverRegistry
//!                   └────────────────────────┘      "simulation"
//! ```

#![deny(missing_docs)]

pub mod driver_registry;
pub mod drivers;

pub use crate::driver_registry::DriverRegistry;
pub use crate::drivers::register_all_drivers;
pub use crate::drivers::simulation::{SimulationProbe, SimulationPwm};
