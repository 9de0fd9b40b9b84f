//! Shared test infrastructure.

pub mod builder;
