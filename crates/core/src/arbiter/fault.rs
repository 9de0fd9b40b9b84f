//! Deterministic fault injection.
//!
//! Requests on ports selected by `fail_port_mask` are refused with a probability of
//! `fail_percentage` percent. The generator is seeded from `fail_seed`, so a run with the
//! same traffic refuses the same requests.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::config::FaultConfig;

/// Seeded request-refusal generator.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    mask: u32,
    percentage: u32,
    seed: u64,
    rng: Xoshiro256StarStar,
}

impl FaultInjector {
    /// Creates an injector from configuration.
    pub fn new(config: &FaultConfig) -> Self {
        Self {
            mask: config.fail_port_mask,
            percentage: config.fail_percentage.min(100),
            seed: config.fail_seed,
            rng: Xoshiro256StarStar::seed_from_u64(config.fail_seed),
        }
    }

    /// Returns `true` if faults can ever be injected.
    pub const fn is_active(&self) -> bool {
        self.mask != 0 && self.percentage != 0
    }

    /// Decides whether the next request on `port` is refused.
    pub fn should_fail(&mut self, port: usize) -> bool {
        if port >= 32 || self.mask & (1 << port) == 0 || self.percentage == 0 {
            return false;
        }
        if self.percentage >= 100 {
            return true;
        }
        self.rng.gen_range(0..100) < self.percentage
    }

    /// Restarts the sequence from the configured seed.
    pub fn reseed(&mut self) {
        self.rng = Xoshiro256StarStar::seed_from_u64(self.seed);
    }
}
