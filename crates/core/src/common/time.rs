//! Simulation time.
//!
//! Time is an unsigned count of abstract time units (picoseconds by convention). Clock
//! periods, phases and delays are all expressed in the same unit so that phase arithmetic
//! stays exact.

/// Absolute simulation time or a duration, in time units.
pub type Time = u64;

/// Sentinel meaning "no wake-up scheduled".
pub const NEVER: Time = Time::MAX;

/// Returns the index of the clock cycle containing `now`.
///
/// # Arguments
///
/// * `now` - Absolute time.
/// * `period` - Clock period (non-zero).
/// * `posedge_offset` - Time of the first rising edge.
#[inline]
pub fn cycle_index(now: Time, period: Time, posedge_offset: Time) -> u64 {
    now.saturating_sub(posedge_offset) / period
}
