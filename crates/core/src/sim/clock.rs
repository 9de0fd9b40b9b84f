//! Clock-phase scheduler.
//!
//! Every clocked action of the arbiter and transactor happens at a fixed phase inside the
//! clock period. This module provides:
//! 1. **Phase alignment:** `delay_to_phase` computes the wait that lands exactly on a phase.
//! 2. **Deadlines:** `deadline` combines a receipt delay with a spacing constraint.
//! 3. **Reconfiguration:** `change_period` rescales the period at runtime.

use crate::common::time::cycle_index;
use crate::common::{ConfigError, Time};
use crate::config::ClockConfig;

/// Clock period and edge placement of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    period: Time,
    posedge_offset: Time,
    system_period: Time,
}

impl Clock {
    /// Creates a clock from validated configuration.
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            period: config.clock_period,
            posedge_offset: config.posedge_offset,
            system_period: config.system_period(),
        }
    }

    /// Clock period.
    #[inline]
    pub const fn period(&self) -> Time {
        self.period
    }

    /// Time of the first rising edge.
    #[inline]
    pub const fn posedge_offset(&self) -> Time {
        self.posedge_offset
    }

    /// Duration of `cycles` clock periods.
    #[inline]
    pub const fn cycles(&self, cycles: u64) -> Time {
        cycles.saturating_mul(self.period)
    }

    /// Index of the clock cycle containing `now`.
    #[inline]
    pub fn cycle_of(&self, now: Time) -> u64 {
        cycle_index(now, self.period, self.posedge_offset)
    }

    /// Minimal delay `d` such that `(now + d - posedge_offset) mod period == phase`.
    ///
    /// # Arguments
    ///
    /// * `now` - Current time.
    /// * `phase` - Target phase; must be less than the period.
    ///
    /// # Returns
    ///
    /// A delay in `0..period`.
    pub fn delay_to_phase(&self, now: Time, phase: Time) -> Time {
        let shifted = (now + self.period - self.posedge_offset % self.period) % self.period;
        if shifted <= phase {
            phase - shifted
        } else {
            self.period - shifted + phase
        }
    }

    /// Earliest time at or after `now` that lies on `phase`.
    #[inline]
    pub fn at_phase(&self, now: Time, phase: Time) -> Time {
        now + self.delay_to_phase(now, phase)
    }

    /// Earliest time strictly after `now` that lies on `phase`.
    pub fn after_phase(&self, now: Time, phase: Time) -> Time {
        match self.delay_to_phase(now, phase) {
            0 => now + self.period,
            delay => now + delay,
        }
    }

    /// `max(receipt + own_delay, previous + spacing)`.
    ///
    /// `previous` is `None` until the first action has happened.
    pub fn deadline(receipt: Time, own_delay: Time, previous: Option<Time>, spacing: Time) -> Time {
        let own = receipt.saturating_add(own_delay);
        previous.map_or(own, |prev| own.max(prev.saturating_add(spacing)))
    }

    /// Rescales the period to `factor` system periods.
    ///
    /// The optional `phase_factor` moves the rising edge to `phase_factor` system periods.
    ///
    /// # Returns
    ///
    /// The previous factor (`period / system_period`).
    pub fn change_period(&mut self, factor: u64, phase_factor: Option<u64>) -> Result<u64, ConfigError> {
        if factor == 0 {
            return Err(ConfigError::invalid("clock_period", "factor must be non-zero"));
        }
        let period = self.system_period.saturating_mul(factor);
        let posedge_offset = match phase_factor {
            Some(phase) => self.system_period.saturating_mul(phase),
            None => self.posedge_offset % period,
        };
        if posedge_offset >= period {
            return Err(ConfigError::invalid(
                "posedge_offset",
                format!("phase factor {} must be less than factor {factor}", phase_factor.unwrap_or(0)),
            ));
        }
        let previous = self.period / self.system_period;
        self.period = period;
        self.posedge_offset = posedge_offset;
        Ok(previous)
    }
}
