//! HAL for the PSI5-S sensor interface on TC29x microcontrollers
//!
//! The PSI5-S module transports PSI5 sensor frames over a serial (ASC-style)
//! interface. All of its kernel clocks and the serial bit rate are derived
//! from the bus clocks through fractional dividers; this crate covers the
//! divider arithmetic, the register images the divider values are packed
//! into, and the module bring-up sequence built on top of them.
//!
//! NOTE This HAL is still under active development. This API will remain
//! volatile until 1.0.0
//!
//! # Crate features
//!
//! * **defmt** -
//!   Implement `defmt::Format` for several types.

#![warn(missing_docs)]
#![no_std]

pub mod clocks;
pub mod endinit;
pub mod fracdiv;
pub mod psi5s;
mod typelevel;

// Provide access to common datastructures to avoid repeating ourselves
pub use clocks::ClockSource;
pub use fracdiv::{compute_divider, DividerConfig, DividerMode, DividerResult};
pub use psi5s::Psi5s;

// Re-export crates used in tc29x-hal's public API
pub extern crate fugit;
