//! Simulation scaffolding.
//!
//! This module provides the pieces that drive the arbiter in time:
//! 1. **Clock:** Phase alignment and deadline arithmetic shared by every component.
//! 2. **Memory:** A behavioural downstream target with configurable latencies.
//! 3. **Master:** Scripted upstream traffic generators.
//! 4. **Simulator:** The event loop tying them together.

/// Clock period, phase alignment and deadline helpers.
pub mod clock;

/// Behavioural memory slave.
pub mod memory;

/// Scripted traffic masters and the script parser.
pub mod master;

/// Event loops over masters, arbiter or transactor, and memory.
pub mod simulator;

pub use clock::Clock;
pub use master::{Ingress, ScriptEntry, TrafficMaster, parse_script};
pub use memory::Memory;
pub use simulator::{PinSimulator, Simulator};
