//! # Component Tests
//!
//! Tests organized by the component they exercise, from admission through the arbitration
//! engine, width conversion, routing and timing, to the pin transactor and the simulator.



/// Runtime command surface.
pub mod commands;

/// Configuration parsing and validation.
pub mod config;

/// Downstream and upstream port contracts exercised through mocks.
pub mod ports;

/// Randomized ordering, alignment and conversion properties.
pub mod properties;


/// End-to-end simulation through the arbiter and behavioural memory.
pub mod simulator;

/// Clock phases, delays and response pacing.
pub mod timing;

/// Pin transactor handshakes for every interface family.
pub mod transactor;

/// Address translation scripts.
pub mod translation;

/// Width conversion through the arbiter.
pub mod width_conversion;
