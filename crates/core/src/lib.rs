//! Bus arbiter and pin transactor simulation library.
//!
//! This crate models the traffic path between several bus masters and a single downstream
//! target with the following:
//! 1. **Bus:** Request/response envelopes, non-blocking port traits, and response matching.
//! 2. **Arbiter:** Per-port admission, arbitration policies, locking, routing, address
//!    translation, and on-the-fly bus-width conversion.
//! 3. **Transactor:** Conversion between envelopes and pin-level handshakes for local
//!    memory, PIF, AXI and APB interfaces.
//! 4. **Simulation:** Clock-phase scheduling, a behavioural memory, a scripted traffic
//!    master, and the top-level simulator loop.
//! 5. **Statistics:** Admission, dispatch and buffer-occupancy profiling.

/// Common types (time, errors, object pools).
pub mod common;
/// Component configuration (defaults, enums, parsed parameter strings).
pub mod config;
/// Transaction envelopes, port traits, and response matching tables.
pub mod bus;
/// Multi-port arbiter (admission, arbitration, width conversion, routing).
pub mod arbiter;
/// Envelope to pin-level signal transactor.
pub mod transactor;
/// Clock-phase scheduler, behavioural models, and the simulator loop.
pub mod sim;
/// Arbiter statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Multi-port arbiter component.
pub use crate::arbiter::Arbiter;
/// Request and response envelopes.
pub use crate::bus::{Request, Response};
/// Pin-level transactor component.
pub use crate::transactor::Transactor;
