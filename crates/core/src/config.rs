//! Configuration system for the bus model.
//!
//! This module defines every configuration structure used to parameterize the components.
//! It provides:
//! 1. **Defaults:** Baseline parameters (clock, FIFO depths, delays, widths).
//! 2. **Structures:** Clock, arbiter, fault-injection, transactor, and memory-model configs.
//! 3. **Parsed parameters:** Arbitration policy and lock-group strings, translation scripts.
//! 4. **Validation:** Contradictory settings are rejected with the offending parameter name.
//!
//! Configuration is supplied as JSON (see `Config::from_json`) or built with `Config::default()`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::arbiter::policy::PortPolicy;
use crate::bus::BusProtocol;
use crate::bus::request::{MAX_BYTE_SIZE, MAX_TRANSFERS};
use crate::common::{ConfigError, Time};

/// Default configuration constants.
///
/// These values define the baseline component configuration when not explicitly
/// overridden in the JSON configuration.
mod defaults {
    use crate::common::Time;

    /// Number of upstream master ports.
    pub const NUM_MASTERS: usize = 2;

    /// Per-port request FIFO depth.
    pub const REQUEST_FIFO_DEPTH: usize = 2;

    /// Per-port response FIFO depth.
    pub const RESPONSE_FIFO_DEPTH: usize = 2;

    /// Clock period in time units (1 ns at picosecond resolution).
    pub const CLOCK_PERIOD: Time = 1000;

    /// Request dispatch delay in clock cycles.
    pub const REQUEST_DELAY: u64 = 1;

    /// Response forwarding delay in clock cycles.
    pub const RESPONSE_DELAY: u64 = 1;

    /// Spacing between beats of one multi-beat response, in clock cycles.
    pub const RESPONSE_REPEAT: u64 = 1;

    /// Spacing after the last beat of a response, in clock cycles.
    pub const RECOVERY_TIME: u64 = 1;

    /// Data bus width in bytes.
    pub const BYTE_WIDTH: u32 = 4;

    /// Behavioural memory latency in clock cycles.
    pub const MEMORY_DELAY: u64 = 1;

    /// Behavioural memory size in bytes.
    pub const MEMORY_SIZE: u64 = 1 << 24;

    /// Local memory read latency in clock cycles.
    pub const READ_DELAY: u64 = 1;

    /// Seed for fault injection.
    pub const FAIL_SEED: u64 = 0x5eed;
}

/// Clock parameters shared by every clocked component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ClockConfig {
    /// Bus clock period in time units.
    #[serde(default = "ClockConfig::default_period")]
    pub clock_period: Time,

    /// Reference period for `change_clock_period <factor>`; defaults to `clock_period`.
    #[serde(default)]
    pub system_clock_period: Option<Time>,

    /// Time of the first rising edge; must be less than `clock_period`.
    #[serde(default)]
    pub posedge_offset: Time,
}

impl ClockConfig {
    /// Returns the default clock period.
    const fn default_period() -> Time {
        defaults::CLOCK_PERIOD
    }

    /// Reference period used by the clock-period factor command.
    pub fn system_period(&self) -> Time {
        self.system_clock_period.unwrap_or(self.clock_period)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_period == 0 {
            return Err(ConfigError::invalid("clock_period", "must be non-zero"));
        }
        if self.system_clock_period == Some(0) {
            return Err(ConfigError::invalid("system_clock_period", "must be non-zero"));
        }
        if self.posedge_offset >= self.clock_period {
            return Err(ConfigError::invalid(
                "posedge_offset",
                format!(
                    "{} must be less than clock_period {}",
                    self.posedge_offset, self.clock_period
                ),
            ));
        }
        Ok(())
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            clock_period: defaults::CLOCK_PERIOD,
            system_clock_period: None,
            posedge_offset: 0,
        }
    }
}

/// Randomized request rejection for robustness testing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FaultConfig {
    /// Bit `p` set makes port `p` subject to fault injection.
    #[serde(default)]
    pub fail_port_mask: u32,

    /// Percentage (0-100) of requests on masked ports that are NACC'd.
    #[serde(default)]
    pub fail_percentage: u32,

    /// Seed of the deterministic generator.
    #[serde(default = "FaultConfig::default_seed")]
    pub fail_seed: u64,
}

impl FaultConfig {
    /// Returns the default fault-injection seed.
    const fn default_seed() -> u64 {
        defaults::FAIL_SEED
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            fail_port_mask: 0,
            fail_percentage: 0,
            fail_seed: defaults::FAIL_SEED,
        }
    }
}

/// Multi-port arbiter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArbiterConfig {
    /// Number of upstream master ports.
    #[serde(default = "ArbiterConfig::default_num_masters")]
    pub num_masters: usize,

    /// Request FIFO depth used by every port without an entry in `request_fifo_depths`.
    #[serde(default = "ArbiterConfig::default_request_fifo_depth")]
    pub request_fifo_depth: usize,

    /// Optional per-port request FIFO depths.
    #[serde(default)]
    pub request_fifo_depths: Option<Vec<usize>>,

    /// Per-port response FIFO depth.
    #[serde(default = "ArbiterConfig::default_response_fifo_depth")]
    pub response_fifo_depth: usize,

    /// Clock parameters.
    #[serde(default, flatten)]
    pub clock: ClockConfig,

    /// Phase within the clock period at which arbitration happens.
    #[serde(default)]
    pub arbitration_phase: Time,

    /// Time after a dispatch during which a downstream NACC may still arrive;
    /// defaults to one clock period.
    #[serde(default)]
    pub nacc_wait_time: Option<Time>,

    /// Minimum cycles between receiving a request and dispatching it.
    #[serde(default = "ArbiterConfig::default_request_delay")]
    pub request_delay: u64,

    /// Minimum cycles between receiving a response and forwarding it upstream.
    #[serde(default = "ArbiterConfig::default_response_delay")]
    pub response_delay: u64,

    /// Minimum cycles between successive beats of one response.
    #[serde(default = "ArbiterConfig::default_response_repeat")]
    pub response_repeat: u64,

    /// Minimum cycles after a last beat before the next response is forwarded.
    #[serde(default = "ArbiterConfig::default_recovery_time")]
    pub recovery_time: u64,

    /// Allow only one outstanding request per port until it is accepted downstream.
    #[serde(default)]
    pub one_at_a_time: bool,

    /// Hold each dispatched request until the next arbitration phase before the next one.
    #[serde(default)]
    pub align_request_phase: bool,

    /// Use explicit lock calls (local-memory style) instead of last-transfer locking.
    #[serde(default)]
    pub dram_lock: bool,

    /// Ports that share one lock, e.g. `"0,1;2,3"`.
    #[serde(default)]
    pub lock_port_groups: Option<String>,

    /// Per-port `"<start>,<end>,<decrement>"` triples separated by `;`.
    #[serde(default)]
    pub arbitration_policy: Option<String>,

    /// Ports are served in an externally supplied grant order.
    #[serde(default)]
    pub external_order: bool,

    /// Duplex read/write pairing on ports 0 and 1.
    #[serde(default)]
    pub external_cbox: bool,

    /// Port whose `xfer_en` requests preempt round-robin selection.
    #[serde(default)]
    pub xfer_en_port: Option<usize>,

    /// Per-port upstream data widths in bytes; enables width conversion together with
    /// `slave_byte_width`.
    #[serde(default)]
    pub master_byte_widths: Option<Vec<u32>>,

    /// Downstream data width in bytes (0 = same as the masters, no width conversion).
    #[serde(default)]
    pub slave_byte_width: u32,

    /// Coalesce fully enabled converted beats into block/burst transactions.
    #[serde(default)]
    pub use_block_requests: bool,

    /// Lowest route-ID bit used to encode the originating port.
    #[serde(default)]
    pub route_id_lsb: u32,

    /// Size of the autonomous route-ID pool (0 = encode the port in route-ID bits).
    #[serde(default)]
    pub num_route_ids: usize,

    /// Address translation script.
    #[serde(default)]
    pub translation_file: Option<PathBuf>,

    /// Expected payload family per port (defaults to PIF everywhere).
    #[serde(default)]
    pub port_protocols: Option<Vec<BusProtocol>>,

    /// Fault injection.
    #[serde(default, flatten)]
    pub fault: FaultConfig,

    /// Track queue and pool occupancy for `dump_profile_results`.
    #[serde(default)]
    pub profile_buffers: bool,
}

impl ArbiterConfig {
    /// Returns the default number of master ports.
    const fn default_num_masters() -> usize {
        defaults::NUM_MASTERS
    }

    /// Returns the default request FIFO depth.
    const fn default_request_fifo_depth() -> usize {
        defaults::REQUEST_FIFO_DEPTH
    }

    /// Returns the default response FIFO depth.
    const fn default_response_fifo_depth() -> usize {
        defaults::RESPONSE_FIFO_DEPTH
    }

    /// Returns the default request delay in cycles.
    const fn default_request_delay() -> u64 {
        defaults::REQUEST_DELAY
    }

    /// Returns the default response delay in cycles.
    const fn default_response_delay() -> u64 {
        defaults::RESPONSE_DELAY
    }

    /// Returns the default response repeat in cycles.
    const fn default_response_repeat() -> u64 {
        defaults::RESPONSE_REPEAT
    }

    /// Returns the default recovery time in cycles.
    const fn default_recovery_time() -> u64 {
        defaults::RECOVERY_TIME
    }

    /// Request FIFO depth of `port`.
    pub fn request_fifo_depth_of(&self, port: usize) -> usize {
        self.request_fifo_depths
            .as_ref()
            .and_then(|depths| depths.get(port).copied())
            .unwrap_or(self.request_fifo_depth)
    }

    /// Effective not-accepted window.
    pub fn nacc_window(&self) -> Time {
        self.nacc_wait_time.unwrap_or(self.clock.clock_period)
    }

    /// Returns `true` when any port width differs from the slave width.
    pub fn width_conversion_enabled(&self) -> bool {
        self.slave_byte_width != 0
            && self
                .master_byte_widths
                .as_ref()
                .is_some_and(|widths| widths.iter().any(|w| *w != self.slave_byte_width))
    }

    /// Upstream width of `port` (defaults to the slave width).
    pub fn master_width_of(&self, port: usize) -> u32 {
        self.master_byte_widths
            .as_ref()
            .and_then(|widths| widths.get(port).copied())
            .unwrap_or(if self.slave_byte_width == 0 {
                MAX_BYTE_SIZE
            } else {
                self.slave_byte_width
            })
    }

    /// Payload family expected on `port`.
    pub fn protocol_of(&self, port: usize) -> BusProtocol {
        self.port_protocols
            .as_ref()
            .and_then(|protocols| protocols.get(port).copied())
            .unwrap_or_default()
    }

    /// Number of route-ID bits needed to encode a port number.
    pub fn route_id_bits(&self) -> u32 {
        if self.num_masters <= 1 {
            0
        } else {
            usize::BITS - (self.num_masters - 1).leading_zeros()
        }
    }

    /// Parses `arbitration_policy` into one priority policy per port.
    pub fn port_policies(&self) -> Result<Option<Vec<PortPolicy>>, ConfigError> {
        let Some(text) = self.arbitration_policy.as_deref() else {
            return Ok(None);
        };
        let policies = parse_port_policies(text)?;
        if policies.len() != self.num_masters {
            return Err(ConfigError::invalid(
                "arbitration_policy",
                format!(
                    "{} entries given, num_masters is {}",
                    policies.len(),
                    self.num_masters
                ),
            ));
        }
        Ok(Some(policies))
    }

    /// Parses `lock_port_groups` into a group index per port.
    ///
    /// Ports not named in any group form a group of their own.
    pub fn lock_groups(&self) -> Result<Vec<usize>, ConfigError> {
        let mut groups: Vec<usize> = (0..self.num_masters).collect();
        let Some(text) = self.lock_port_groups.as_deref() else {
            return Ok(groups);
        };
        let mut seen = vec![false; self.num_masters];
        for group in text.split(';').map(str::trim).filter(|g| !g.is_empty()) {
            let mut leader = None;
            for item in group.split(',').map(str::trim) {
                let port: usize = item.parse().map_err(|_| {
                    ConfigError::invalid("lock_port_groups", format!("`{item}` is not a port"))
                })?;
                if port >= self.num_masters {
                    return Err(ConfigError::invalid(
                        "lock_port_groups",
                        format!("port {port} >= num_masters {}", self.num_masters),
                    ));
                }
                if seen[port] {
                    return Err(ConfigError::invalid(
                        "lock_port_groups",
                        format!("port {port} appears in more than one group"),
                    ));
                }
                seen[port] = true;
                let leader = *leader.get_or_insert(port);
                groups[port] = leader;
            }
        }
        Ok(groups)
    }

    /// Checks parameter ranges and combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clock.validate()?;
        let period = self.clock.clock_period;
        if self.num_masters == 0 || self.num_masters > 32 {
            return Err(ConfigError::invalid(
                "num_masters",
                format!("{} outside 1..=32", self.num_masters),
            ));
        }
        if self.request_fifo_depth == 0 {
            return Err(ConfigError::invalid("request_fifo_depth", "must be non-zero"));
        }
        if let Some(depths) = &self.request_fifo_depths {
            if depths.len() != self.num_masters || depths.contains(&0) {
                return Err(ConfigError::invalid(
                    "request_fifo_depths",
                    "need one non-zero depth per master",
                ));
            }
        }
        if self.response_fifo_depth == 0 {
            return Err(ConfigError::invalid("response_fifo_depth", "must be non-zero"));
        }
        if self.arbitration_phase >= period {
            return Err(ConfigError::invalid(
                "arbitration_phase",
                format!("{} must be less than clock_period {period}", self.arbitration_phase),
            ));
        }
        let window = self.nacc_window();
        if window == 0 || window > period {
            return Err(ConfigError::invalid(
                "nacc_wait_time",
                format!("{window} must be in 1..={period}"),
            ));
        }
        if let Some(widths) = &self.master_byte_widths {
            if widths.len() != self.num_masters {
                return Err(ConfigError::invalid(
                    "master_byte_widths",
                    format!("{} entries given, num_masters is {}", widths.len(), self.num_masters),
                ));
            }
            for width in widths {
                check_width("master_byte_widths", *width)?;
            }
            if self.slave_byte_width == 0 {
                return Err(ConfigError::invalid(
                    "slave_byte_width",
                    "required when master_byte_widths is set",
                ));
            }
        }
        if self.slave_byte_width != 0 {
            check_width("slave_byte_width", self.slave_byte_width)?;
        }
        if self.align_request_phase && self.width_conversion_enabled() {
            return Err(ConfigError::invalid(
                "align_request_phase",
                "cannot be combined with width conversion",
            ));
        }
        if self.external_cbox && self.num_masters != 2 {
            return Err(ConfigError::invalid(
                "external_cbox",
                "requires exactly two masters (read port 0, write port 1)",
            ));
        }
        if let Some(port) = self.xfer_en_port {
            if port >= self.num_masters {
                return Err(ConfigError::invalid(
                    "xfer_en_port",
                    format!("port {port} >= num_masters {}", self.num_masters),
                ));
            }
        }
        if self.external_order && self.arbitration_policy.is_some() {
            return Err(ConfigError::invalid(
                "external_order",
                "cannot be combined with arbitration_policy",
            ));
        }
        if self.fault.fail_percentage > 100 {
            return Err(ConfigError::invalid(
                "fail_percentage",
                format!("{} exceeds 100", self.fault.fail_percentage),
            ));
        }
        if self.num_route_ids > 0 && self.width_conversion_enabled() {
            return Err(ConfigError::invalid(
                "num_route_ids",
                "autonomous routing cannot be combined with width conversion",
            ));
        }
        if self.num_route_ids == 0 && self.route_id_lsb + self.route_id_bits() > 32 {
            return Err(ConfigError::invalid(
                "route_id_lsb",
                format!(
                    "{} + {} port bits exceed 32",
                    self.route_id_lsb,
                    self.route_id_bits()
                ),
            ));
        }
        if let Some(protocols) = &self.port_protocols {
            if protocols.len() != self.num_masters {
                return Err(ConfigError::invalid(
                    "port_protocols",
                    "need one protocol per master",
                ));
            }
        }
        let _ = self.port_policies()?;
        let _ = self.lock_groups()?;
        Ok(())
    }
}

impl Default for ArbiterConfig {
    /// Creates a two-port round-robin arbiter without width conversion.
    fn default() -> Self {
        Self {
            num_masters: defaults::NUM_MASTERS,
            request_fifo_depth: defaults::REQUEST_FIFO_DEPTH,
            request_fifo_depths: None,
            response_fifo_depth: defaults::RESPONSE_FIFO_DEPTH,
            clock: ClockConfig::default(),
            arbitration_phase: 0,
            nacc_wait_time: None,
            request_delay: defaults::REQUEST_DELAY,
            response_delay: defaults::RESPONSE_DELAY,
            response_repeat: defaults::RESPONSE_REPEAT,
            recovery_time: defaults::RECOVERY_TIME,
            one_at_a_time: false,
            align_request_phase: false,
            dram_lock: false,
            lock_port_groups: None,
            arbitration_policy: None,
            external_order: false,
            external_cbox: false,
            xfer_en_port: None,
            master_byte_widths: None,
            slave_byte_width: 0,
            use_block_requests: false,
            route_id_lsb: 0,
            num_route_ids: 0,
            translation_file: None,
            port_protocols: None,
            fault: FaultConfig::default(),
            profile_buffers: false,
        }
    }
}

/// Pin-level interface family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PinProtocol {
    /// Local memory load/store port (enable, address, busy, read data).
    LocalMemory,
    /// Processor interface with request/response valid-ready channels.
    #[default]
    #[serde(alias = "PIF")]
    Pif,
    /// AMBA AXI with AR/R and AW/W/B channels.
    #[serde(alias = "AXI")]
    Axi,
    /// AMBA APB with setup and access phases.
    #[serde(alias = "APB")]
    Apb,
}

/// Pin transactor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactorConfig {
    /// Interface family of every port.
    #[serde(default)]
    pub protocol: PinProtocol,

    /// Number of ports.
    #[serde(default = "TransactorConfig::default_num_ports")]
    pub num_ports: usize,

    /// Data bus width in bytes.
    #[serde(default = "TransactorConfig::default_byte_width")]
    pub byte_width: u32,

    /// Clock parameters.
    #[serde(default, flatten)]
    pub clock: ClockConfig,

    /// Phase within the clock period at which inputs are sampled; defaults to the
    /// middle of the period.
    #[serde(default)]
    pub sample_phase: Option<Time>,

    /// Per-port request FIFO depth.
    #[serde(default = "TransactorConfig::default_request_fifo_depth")]
    pub request_fifo_depth: usize,

    /// Local memory read latency in cycles.
    #[serde(default = "TransactorConfig::default_read_delay")]
    pub read_delay: u64,

    /// Local memory exposes a busy signal.
    #[serde(default = "TransactorConfig::default_has_busy")]
    pub has_busy: bool,

    /// Drop responses that match no outstanding request instead of failing.
    #[serde(default)]
    pub discard_unknown_responses: bool,
}

impl TransactorConfig {
    /// Returns the default number of ports.
    const fn default_num_ports() -> usize {
        1
    }

    /// Returns the default data bus width.
    const fn default_byte_width() -> u32 {
        defaults::BYTE_WIDTH
    }

    /// Returns the default request FIFO depth.
    const fn default_request_fifo_depth() -> usize {
        defaults::REQUEST_FIFO_DEPTH
    }

    /// Returns the default local memory read latency.
    const fn default_read_delay() -> u64 {
        defaults::READ_DELAY
    }

    /// Local memories expose busy unless configured otherwise.
    const fn default_has_busy() -> bool {
        true
    }

    /// Effective sample phase.
    pub fn sample_phase(&self) -> Time {
        self.sample_phase.unwrap_or(self.clock.clock_period / 2)
    }

    /// Checks parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clock.validate()?;
        if self.num_ports == 0 {
            return Err(ConfigError::invalid("num_ports", "must be non-zero"));
        }
        check_width("byte_width", self.byte_width)?;
        if self.sample_phase() >= self.clock.clock_period {
            return Err(ConfigError::invalid(
                "sample_phase",
                format!(
                    "{} must be less than clock_period {}",
                    self.sample_phase(),
                    self.clock.clock_period
                ),
            ));
        }
        if self.request_fifo_depth == 0 {
            return Err(ConfigError::invalid("request_fifo_depth", "must be non-zero"));
        }
        if self.protocol == PinProtocol::LocalMemory && self.read_delay == 0 {
            return Err(ConfigError::invalid("read_delay", "must be at least one cycle"));
        }
        Ok(())
    }
}

impl Default for TransactorConfig {
    fn default() -> Self {
        Self {
            protocol: PinProtocol::default(),
            num_ports: 1,
            byte_width: defaults::BYTE_WIDTH,
            clock: ClockConfig::default(),
            sample_phase: None,
            request_fifo_depth: defaults::REQUEST_FIFO_DEPTH,
            read_delay: defaults::READ_DELAY,
            has_busy: true,
            discard_unknown_responses: false,
        }
    }
}

/// Behavioural memory slave configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryModelConfig {
    /// Data bus width in bytes.
    #[serde(default = "MemoryModelConfig::default_byte_width")]
    pub byte_width: u32,

    /// First byte address served.
    #[serde(default)]
    pub start_address: u64,

    /// Number of bytes served; accesses outside yield address errors.
    #[serde(default = "MemoryModelConfig::default_size")]
    pub size: u64,

    /// Cycles from acceptance to the first response beat.
    #[serde(default = "MemoryModelConfig::default_delay")]
    pub read_delay: u64,

    /// Cycles from acceptance of a last write beat to its response.
    #[serde(default = "MemoryModelConfig::default_delay")]
    pub write_delay: u64,

    /// Cycles between beats of a block/burst read response.
    #[serde(default = "MemoryModelConfig::default_delay")]
    pub block_read_repeat: u64,

    /// Reject the first N requests offered (downstream NACC exercise).
    #[serde(default)]
    pub nacc_first: u32,
}

impl MemoryModelConfig {
    /// Returns the default memory width.
    const fn default_byte_width() -> u32 {
        defaults::BYTE_WIDTH
    }

    /// Returns the default memory size.
    const fn default_size() -> u64 {
        defaults::MEMORY_SIZE
    }

    /// Returns the default memory latency.
    const fn default_delay() -> u64 {
        defaults::MEMORY_DELAY
    }
}

impl Default for MemoryModelConfig {
    fn default() -> Self {
        Self {
            byte_width: defaults::BYTE_WIDTH,
            start_address: 0,
            size: defaults::MEMORY_SIZE,
            read_delay: defaults::MEMORY_DELAY,
            write_delay: defaults::MEMORY_DELAY,
            block_read_repeat: defaults::MEMORY_DELAY,
            nacc_first: 0,
        }
    }
}

/// Root configuration: one arbiter feeding one behavioural memory.
///
/// # Examples
///
/// ```
/// use busarb_core::config::Config;
///
/// let json = r#"{
///     "arbiter": {
///         "num_masters": 3,
///         "clock_period": 2000,
///         "arbitration_policy": "0,0,0;3,0,1;3,0,1",
///         "fail_port_mask": 4,
///         "fail_percentage": 25
///     },
///     "memory": { "byte_width": 8, "read_delay": 2 }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.arbiter.num_masters, 3);
/// assert_eq!(config.arbiter.clock.clock_period, 2000);
/// assert_eq!(config.arbiter.fault.fail_percentage, 25);
/// assert_eq!(config.memory.byte_width, 8);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Arbiter parameters.
    #[serde(default)]
    pub arbiter: ArbiterConfig,
    /// Downstream memory parameters.
    #[serde(default)]
    pub memory: MemoryModelConfig,
    /// Pin transactor parameters.
    #[serde(default)]
    pub transactor: TransactorConfig,
}

impl Config {
    /// Deserializes and validates a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, deserializes and validates a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arbiter.validate()?;
        self.transactor.validate()?;
        check_width("memory.byte_width", self.memory.byte_width)
    }
}

fn check_width(param: &'static str, width: u32) -> Result<(), ConfigError> {
    if width == 0 || !width.is_power_of_two() || width > MAX_BYTE_SIZE {
        return Err(ConfigError::invalid(
            param,
            format!("{width} is not a power of two in 1..={MAX_BYTE_SIZE}"),
        ));
    }
    Ok(())
}

/// Parses `"<start>,<end>,<decrement>;..."` into port policies.
pub fn parse_port_policies(text: &str) -> Result<Vec<PortPolicy>, ConfigError> {
    text.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let fields: Vec<&str> = entry.split(',').map(str::trim).collect();
            let [start, end, decrement] = fields.as_slice() else {
                return Err(ConfigError::invalid(
                    "arbitration_policy",
                    format!("`{entry}` is not <start>,<end>,<decrement>"),
                ));
            };
            let number = |field: &str| {
                field.parse::<u32>().map_err(|_| {
                    ConfigError::invalid(
                        "arbitration_policy",
                        format!("`{field}` in `{entry}` is not a number"),
                    )
                })
            };
            let (start, end, decrement) = (number(start)?, number(end)?, number(decrement)?);
            if end > start {
                return Err(ConfigError::invalid(
                    "arbitration_policy",
                    format!("`{entry}`: end priority {end} exceeds start priority {start}"),
                ));
            }
            Ok(PortPolicy::new(start, end, decrement))
        })
        .collect()
}

/// Returns the largest block length the bus accepts.
pub const fn max_transfers() -> u32 {
    MAX_TRANSFERS
}
