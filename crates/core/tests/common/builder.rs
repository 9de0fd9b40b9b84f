//! Fluent builders for configurations and traffic.

use busarb_core::bus::Request;
use busarb_core::config::{ArbiterConfig, Config, PinProtocol, TransactorConfig};

// ─── ArbiterConfig ─────────────────────────────────────────────────────────

/// Builds an [`ArbiterConfig`] starting from the defaults.
#[derive(Debug, Clone, Default)]
pub struct ArbiterBuilder {
    config: ArbiterConfig,
}

impl ArbiterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ports(mut self, num_masters: usize) -> Self {
        self.config.num_masters = num_masters;
        self
    }

    pub fn fifo_depth(mut self, depth: usize) -> Self {
        self.config.request_fifo_depth = depth;
        self
    }

    pub fn response_fifo_depth(mut self, depth: usize) -> Self {
        self.config.response_fifo_depth = depth;
        self
    }

    pub fn delays(mut self, request: u64, response: u64) -> Self {
        self.config.request_delay = request;
        self.config.response_delay = response;
        self
    }

    pub fn arbitration_phase(mut self, phase: u64) -> Self {
        self.config.arbitration_phase = phase;
        self
    }

    pub fn policy(mut self, policy: &str) -> Self {
        self.config.arbitration_policy = Some(policy.to_owned());
        self
    }

    pub fn widths(mut self, masters: &[u32], slave: u32) -> Self {
        self.config.master_byte_widths = Some(masters.to_vec());
        self.config.slave_byte_width = slave;
        self
    }

    pub fn block_requests(mut self) -> Self {
        self.config.use_block_requests = true;
        self
    }

    pub fn route_ids(mut self, count: usize) -> Self {
        self.config.num_route_ids = count;
        self
    }

    pub fn faults(mut self, mask: u32, percentage: u32) -> Self {
        self.config.fault.fail_port_mask = mask;
        self.config.fault.fail_percentage = percentage;
        self
    }

    pub fn one_at_a_time(mut self) -> Self {
        self.config.one_at_a_time = true;
        self
    }

    pub fn dram_lock(mut self) -> Self {
        self.config.dram_lock = true;
        self
    }

    pub fn external_order(mut self) -> Self {
        self.config.external_order = true;
        self
    }

    pub fn with(mut self, edit: impl FnOnce(&mut ArbiterConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn build(self) -> ArbiterConfig {
        self.config
    }

    /// Wraps the arbiter configuration in a full system configuration.
    pub fn system(self) -> Config {
        Config {
            arbiter: self.config,
            ..Config::default()
        }
    }
}

// ─── TransactorConfig ──────────────────────────────────────────────────────

/// System configuration driving `protocol` pins on one port.
pub fn pin_system(protocol: PinProtocol) -> Config {
    Config {
        transactor: TransactorConfig {
            protocol,
            ..TransactorConfig::default()
        },
        ..Config::default()
    }
}

// ─── Traffic ───────────────────────────────────────────────────────────────

/// A single WRITE whose payload follows the address pattern.
pub fn patterned_write(address: u64, size: u32) -> Request {
    let data: Vec<u8> = (0..size).map(|i| (address + u64::from(i)) as u8).collect();
    Request::write(address, &data)
}
