//! Common utilities and types used throughout the bus model.
//!
//! This module provides the building blocks shared by every component:
//! 1. **Time:** The simulation time unit and clock-cycle helpers.
//! 2. **Error Handling:** Configuration, protocol, and command errors.
//! 3. **Pooling:** An index arena for high-frequency transaction wrappers.

/// Simulation time type and helpers.
pub mod time;

/// Error types for configuration, protocol violations, and runtime commands.
pub mod error;

/// Index-addressed object pool with unique handles.
pub mod pool;

pub use error::{CommandError, ConfigError, ProtocolError, SimError};
pub use pool::{Handle, Pool};
pub use time::Time;
