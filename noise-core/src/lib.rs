#![no_std]

// Shared logic for the ESC noise script.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware and clocks are reached only through the
// traits in `output`; the sequencer itself is a pure state machine.

pub mod commands;
pub mod config;
pub mod output;
pub mod ramp;
pub mod sequencer;
pub mod telemetry;

pub use commands::{CommandSet, PulseWidth};
pub use config::{ConfigError, NoiseConfig};
pub use sequencer::{Directive, NoiseSequencer, Phase, SequenceError};
