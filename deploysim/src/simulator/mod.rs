//! Deployment progress simulation
//!
//! A run advances one deployment by a fixed step per tick, walks each
//! provider up the milestone ladder and finishes every provider at 100.

pub mod fsm;
pub mod ladder;
pub mod runner;
pub mod tick;

pub use runner::{Simulator, SimulatorOptions};
pub use tick::{apply_tick, RunState, TickOutcome, TickSettings};
