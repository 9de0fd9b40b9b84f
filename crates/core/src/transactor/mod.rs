//! Envelope to pin-level transactor.
//!
//! The transactor accepts [`Request`] envelopes on a number of ports and turns each into
//! signal-level handshakes once per clock period:
//! 1. **Drive:** at the rising edge the oldest queued request is translated into field
//!    assignments and its valid signal is asserted.
//! 2. **Sample:** at the sample phase the pin target is evaluated, then ready and the
//!    response channels are sampled.
//! 3. **Complete:** an accepted request holds its signals until the next edge; a refused
//!    one is either held (AXI, APB) or NACCed together with every request queued behind it
//!    (PIF, local memory).
//!
//! Responses are matched to outstanding requests through a per-port [`MatchTable`] keyed by
//! transaction ID and route ID (or by the port alone for local memories). Responses that
//! match nothing are fatal unless `discard_unknown_responses` is set.

/// Pin-level signals backed by bit vectors.
pub mod signal;

/// Local memory load/store interface.
pub mod local_mem;

/// Processor interface (PIF).
pub mod pif;

/// AMBA AXI interface.
pub mod axi;

/// AMBA APB interface.
pub mod apb;

/// Pin-level memory target.
pub mod target;

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, error, trace, warn};

pub use self::signal::{Signal, SignalBank};
pub use self::target::PinMemory;
use crate::bus::{MatchTable, Request, RequestSink, RequestType, Response, ResponseStatus, UpstreamPorts};
use crate::common::{ConfigError, ProtocolError, Time};
use crate::config::{PinProtocol, TransactorConfig};
use crate::sim::clock::Clock;

/// Width of every address bus.
pub const ADDRESS_BITS: usize = 32;

/// Responses buffered per port before response ready is dropped.
const RESPONSE_BACKLOG: usize = 32;

/// How a request's response reaches the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The slave returns the response on a valid/ready channel.
    Handshake,
    /// The response is sampled in the same cycle the request is accepted.
    OnAccept,
    /// The response is sampled a fixed number of cycles after acceptance.
    AfterCycles(u64),
}

/// Response channel a transaction is matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// One channel for reads and writes.
    Shared,
    /// Read data channel.
    Read,
    /// Write response channel.
    Write,
}

/// Key of the per-port matching table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchKey {
    /// Response channel.
    pub channel: Channel,
    /// Transaction ID.
    pub id: u8,
    /// Route ID.
    pub route_id: u32,
}

/// A response as seen on the pins, before it is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// Matching key carried by the response.
    pub key: MatchKey,
    /// Decoded status.
    pub status: ResponseStatus,
    /// Full-width data bus contents.
    pub data: Vec<u8>,
    /// Last beat of the transaction.
    pub last: bool,
}

/// Signal-level encoding of one protocol family, for both sides of the interface.
pub trait PinInterface: fmt::Debug {
    /// Protocol family.
    fn protocol(&self) -> PinProtocol;

    /// Data bus width in bytes.
    fn byte_width(&self) -> u32;

    /// Fresh signal banks: (master driven, slave driven).
    fn declare(&self) -> (SignalBank, SignalBank);

    /// Returns `true` if the family can carry `kind`.
    fn supports(&self, kind: RequestType) -> bool;

    /// How the response to `request` is returned.
    fn completion(&self, request: &Request) -> Completion;

    /// Matching key for `request`.
    fn match_key(&self, request: &Request) -> MatchKey {
        let channel = if request.kind.is_read() { Channel::Read } else { Channel::Write };
        MatchKey {
            channel,
            id: request.id,
            route_id: request.route_id,
        }
    }

    /// Width of the route ID field, if the family carries route IDs on its pins.
    fn route_id_bits(&self) -> Option<usize> {
        None
    }

    /// Cycles a request is driven before ready is sampled.
    fn setup_cycles(&self) -> u32 {
        0
    }

    /// `true` when a refused request is NACCed rather than held.
    fn nacc_on_refusal(&self) -> bool;

    /// Master side: drives `request` and asserts valid.
    fn drive_request(&self, request: &Request, out: &mut SignalBank);

    /// Master side: moves a driven request into its access phase.
    fn enter_access(&self, out: &mut SignalBank) {
        let _ = out;
    }

    /// Master side: deasserts the request signals.
    fn release_request(&self, out: &mut SignalBank);

    /// Master side: `true` if the slave accepted the driven `request`.
    fn request_ready(&self, request: &Request, inp: &SignalBank) -> bool;

    /// Master side: drives response ready.
    fn drive_response_ready(&self, out: &mut SignalBank, ready: bool);

    /// Master side: responses transferred on handshake channels this cycle.
    fn sample_responses(&self, out: &SignalBank, inp: &SignalBank) -> Vec<WireResponse>;

    /// Master side: the response completing `request` without a handshake.
    fn sample_completion(&self, request: &Request, inp: &SignalBank) -> Response {
        let lane = (request.address % u64::from(self.byte_width())) as usize;
        let mut response = Response::from_request(request, ResponseStatus::Ok);
        if request.kind.is_read() {
            response.buffer = inp.bytes(self.read_data_signal(), lane, request.size as usize);
        }
        response
    }

    /// Name of the read data bus.
    fn read_data_signal(&self) -> &'static str;

    /// Slave side: decodes the request currently driven, if any.
    ///
    /// `open` is the last accepted transfer of an unfinished multi-transfer write on this port.
    fn decode_request(&self, out: &SignalBank, open: Option<&Request>) -> Option<Request>;

    /// Slave side: drives request ready for the decoded `request`.
    fn drive_request_ready(&self, inp: &mut SignalBank, request: &Request, ready: bool);

    /// Slave side: drives `response` on its channel (`write` selects the write channel).
    fn drive_response(&self, inp: &mut SignalBank, response: &Response, write: bool);

    /// Slave side: deasserts every response channel.
    fn release_response(&self, inp: &mut SignalBank);

    /// Slave side: `true` if the master is ready for a response on the given channel.
    fn response_ready(&self, out: &SignalBank, write: bool) -> bool;
}

/// Builds the interface family selected by `config`.
pub fn interface_for(config: &TransactorConfig) -> Box<dyn PinInterface> {
    let width = config.byte_width;
    match config.protocol {
        PinProtocol::LocalMemory => Box::new(local_mem::LocalMemoryPins::new(
            width,
            config.has_busy,
            config.read_delay,
        )),
        PinProtocol::Pif => Box::new(pif::PifPins::new(width)),
        PinProtocol::Axi => Box::new(axi::AxiPins::new(width)),
        PinProtocol::Apb => Box::new(apb::ApbPins::new(width)),
    }
}

/// Slave-side model evaluated at every sample point.
pub trait PinTarget {
    /// Observes `outputs` (master driven) of `port` and updates `inputs` (slave driven).
    fn evaluate(
        &mut self,
        now: Time,
        port: usize,
        outputs: &SignalBank,
        inputs: &mut SignalBank,
    ) -> Result<(), ProtocolError>;
}

/// Request-side state of one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    /// Nothing driven.
    Idle,
    /// The head request is driven; `cycles` edges have passed since it was first driven.
    Driving {
        /// Completed cycles of the current attempt.
        cycles: u32,
    },
    /// The head request was accepted; signals are held until the next edge.
    Holding,
    /// The head request was refused and the port drained; signals drop at the next edge.
    Refused,
}

#[derive(Debug, Clone)]
struct Outstanding {
    request: Request,
    beats: u32,
}

#[derive(Debug)]
struct PinPort {
    fifo: VecDeque<Request>,
    state: PinState,
    out: SignalBank,
    inp: SignalBank,
    outstanding: MatchTable<MatchKey, Outstanding>,
    fixed: VecDeque<(Time, Request)>,
    upstream: VecDeque<Response>,
}

/// Counters kept by the transactor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactorStats {
    /// Requests accepted into a port FIFO.
    pub queued: u64,
    /// Requests accepted on the pins.
    pub accepted: u64,
    /// Requests NACCed after a pin-level refusal (including drained ones).
    pub naccs: u64,
    /// Responses matched and queued upstream.
    pub responses: u64,
    /// Unknown responses dropped.
    pub discarded: u64,
}

/// Multi-port envelope to pin transactor.
#[derive(Debug)]
pub struct Transactor {
    config: TransactorConfig,
    clock: Clock,
    sample_phase: Time,
    interface: Box<dyn PinInterface>,
    ports: Vec<PinPort>,
    cursor: Time,
    fault: Option<ProtocolError>,
    stats: TransactorStats,
}

impl Transactor {
    /// Builds a transactor from validated configuration.
    pub fn new(config: TransactorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let interface = interface_for(&config);
        let ports = (0..config.num_ports)
            .map(|_| {
                let (out, inp) = interface.declare();
                PinPort {
                    fifo: VecDeque::with_capacity(config.request_fifo_depth),
                    state: PinState::Idle,
                    out,
                    inp,
                    outstanding: MatchTable::new(),
                    fixed: VecDeque::new(),
                    upstream: VecDeque::new(),
                }
            })
            .collect();
        Ok(Self {
            clock: Clock::new(&config.clock),
            sample_phase: config.sample_phase(),
            interface,
            ports,
            cursor: 0,
            fault: None,
            stats: TransactorStats::default(),
            config,
        })
    }

    /// Active configuration.
    pub const fn config(&self) -> &TransactorConfig {
        &self.config
    }

    /// Protocol family in use.
    pub fn interface(&self) -> &dyn PinInterface {
        self.interface.as_ref()
    }

    /// Number of ports.
    pub fn num_ports(&self) -> usize {
        self.ports.len()
    }

    /// Counters.
    pub const fn stats(&self) -> &TransactorStats {
        &self.stats
    }

    /// Request-side state of `port`.
    pub fn pin_state(&self, port: usize) -> Option<PinState> {
        self.ports.get(port).map(|p| p.state)
    }

    /// Signals driven by the transactor on `port`.
    pub fn outputs(&self, port: usize) -> Option<&SignalBank> {
        self.ports.get(port).map(|p| &p.out)
    }

    /// Signals last driven by the target on `port`.
    pub fn inputs(&self, port: usize) -> Option<&SignalBank> {
        self.ports.get(port).map(|p| &p.inp)
    }

    /// Requests queued on `port`, including the one being driven.
    pub fn queued(&self, port: usize) -> usize {
        self.ports.get(port).map_or(0, |p| p.fifo.len())
    }

    /// Transactions waiting for a response on `port`.
    pub fn outstanding(&self, port: usize) -> usize {
        self.ports
            .get(port)
            .map_or(0, |p| p.outstanding.len() + p.fixed.len())
    }

    /// Returns a [`RequestSink`] feeding `port`.
    pub fn port(&mut self, port: usize) -> TransactorPort<'_> {
        TransactorPort {
            transactor: self,
            port,
        }
    }

    fn check_port(&self, port: usize) -> Result<(), ProtocolError> {
        if port < self.ports.len() {
            Ok(())
        } else {
            Err(ProtocolError::InvalidPort {
                port,
                num_ports: self.ports.len(),
            })
        }
    }

    /// Address and route ID must survive the trip through the pin fields unchanged.
    fn check_fits_pins(&self, request: &Request) -> Result<(), ProtocolError> {
        let fail = |reason: String| ProtocolError::MalformedRequest {
            tag: request.tag,
            reason,
        };
        let end = request.address.checked_add(request.total_bytes());
        if end.is_none_or(|end| end > 1_u64 << ADDRESS_BITS) {
            return Err(fail(format!(
                "address {:#x} does not fit the {ADDRESS_BITS}-bit address bus",
                request.address
            )));
        }
        if let Some(bits) = self.interface.route_id_bits() {
            if u64::from(request.route_id) >> bits != 0 {
                return Err(fail(format!(
                    "route ID {:#x} does not fit the {bits}-bit route field",
                    request.route_id
                )));
            }
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.fault.is_some()
            || self.ports.iter().any(|p| {
                !p.fifo.is_empty()
                    || p.state != PinState::Idle
                    || !p.outstanding.is_empty()
                    || !p.fixed.is_empty()
                    || !p.upstream.is_empty()
            })
    }

    /// Queues `request` on `port`.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when the port FIFO is full.
    pub fn nb_request(&mut self, now: Time, port: usize, request: &Request) -> Result<bool, ProtocolError> {
        self.check_port(port)?;
        if !self.interface.supports(request.kind) {
            let e = ProtocolError::UnsupportedConversion {
                port,
                kind: request.kind,
                reason: format!("{:?} pins cannot carry it", self.interface.protocol()),
            };
            error!(error = %e, "request rejected by transactor");
            return Err(e);
        }
        request
            .validate(self.interface.byte_width())
            .and_then(|()| self.check_fits_pins(request))
            .inspect_err(|e| error!(port, error = %e, "malformed request"))?;
        if self.ports[port].fifo.len() >= self.config.request_fifo_depth {
            trace!(port, "transactor FIFO full");
            return Ok(false);
        }
        if !self.is_active() {
            self.cursor = self.cursor.max(now);
        }
        self.ports[port].fifo.push_back(request.clone());
        self.stats.queued += 1;
        trace!(port, %request, "transactor queued request");
        Ok(true)
    }

    /// Next edge or sample point, while anything is in progress.
    pub fn next_wakeup(&self) -> Option<Time> {
        if !self.is_active() {
            return None;
        }
        if self.fault.is_some() {
            return Some(self.cursor);
        }
        let edge = self.clock.at_phase(self.cursor, 0);
        let sample = self.clock.at_phase(self.cursor, self.sample_phase);
        Some(edge.min(sample))
    }

    /// Processes every edge and sample point up to `now`.
    pub fn advance(
        &mut self,
        now: Time,
        target: &mut dyn PinTarget,
        upstream: &mut dyn UpstreamPorts,
    ) -> Result<(), ProtocolError> {
        if let Some(e) = self.fault.take() {
            return Err(e);
        }
        while self.is_active() {
            let edge = self.clock.at_phase(self.cursor, 0);
            let sample = self.clock.at_phase(self.cursor, self.sample_phase);
            let at = edge.min(sample);
            if at > now {
                break;
            }
            if at == edge {
                self.rising_edge();
            }
            if at == sample {
                self.sample(at, target, upstream)?;
            }
            self.cursor = at + 1;
        }
        Ok(())
    }

    fn rising_edge(&mut self) {
        let interface = self.interface.as_ref();
        for port in &mut self.ports {
            match port.state {
                PinState::Holding | PinState::Refused => {
                    interface.release_request(&mut port.out);
                    port.state = PinState::Idle;
                }
                PinState::Driving { cycles } => {
                    let cycles = cycles + 1;
                    if cycles == interface.setup_cycles() {
                        interface.enter_access(&mut port.out);
                    }
                    port.state = PinState::Driving { cycles };
                }
                PinState::Idle => {}
            }
            if port.state == PinState::Idle {
                if let Some(request) = port.fifo.front() {
                    interface.drive_request(request, &mut port.out);
                    if interface.setup_cycles() == 0 {
                        interface.enter_access(&mut port.out);
                    }
                    port.state = PinState::Driving { cycles: 0 };
                }
            }
            interface.drive_response_ready(&mut port.out, port.upstream.len() < RESPONSE_BACKLOG);
        }
    }

    fn sample(
        &mut self,
        now: Time,
        target: &mut dyn PinTarget,
        upstream: &mut dyn UpstreamPorts,
    ) -> Result<(), ProtocolError> {
        for index in 0..self.ports.len() {
            {
                let port = &mut self.ports[index];
                target.evaluate(now, index, &port.out, &mut port.inp)?;
            }
            self.sample_handshakes(index)?;
            self.sample_request(now, index);
            self.sample_fixed(now, index);
            self.deliver(now, index, upstream);
        }
        Ok(())
    }

    fn sample_handshakes(&mut self, index: usize) -> Result<(), ProtocolError> {
        let width = u64::from(self.interface.byte_width());
        let port = &mut self.ports[index];
        for wire in self.interface.sample_responses(&port.out, &port.inp) {
            let Some(open) = port.outstanding.lookup_mut(&wire.key) else {
                let e = ProtocolError::UnknownResponse {
                    tag: 0,
                    id: wire.key.id,
                    route_id: wire.key.route_id,
                };
                if self.config.discard_unknown_responses {
                    warn!(port = index, error = %e, "discarding unknown response");
                    self.stats.discarded += 1;
                    continue;
                }
                error!(port = index, error = %e, "unknown response");
                return Err(e);
            };
            let request = &open.request;
            let mut response = Response::from_request(request, wire.status);
            response.transfer_number = open.beats + 1;
            response.last_transfer = wire.last;
            if request.kind.is_read() || request.kind == RequestType::Rcw {
                response.address = request.beat_address(open.beats);
                let lane = (response.address % width) as usize;
                response.buffer = wire.data[lane..lane + request.size as usize].to_vec();
            }
            open.beats += 1;
            trace!(port = index, %response, "pin response matched");
            port.upstream.push_back(response);
            self.stats.responses += 1;
            if wire.last {
                let _ = port.outstanding.retire(&wire.key);
            }
        }
        Ok(())
    }

    fn sample_request(&mut self, now: Time, index: usize) {
        let interface = self.interface.as_ref();
        let port = &mut self.ports[index];
        let PinState::Driving { cycles } = port.state else {
            return;
        };
        if cycles < interface.setup_cycles() {
            return;
        }
        let Some(request) = port.fifo.front() else {
            port.state = PinState::Idle;
            return;
        };
        if interface.request_ready(request, &port.inp) {
            let Some(request) = port.fifo.pop_front() else {
                return;
            };
            trace!(port = index, %request, "pin request accepted");
            self.stats.accepted += 1;
            port.state = PinState::Holding;
            let expects_response = request.kind.is_read() || request.last_transfer;
            if !expects_response {
                return;
            }
            match interface.completion(&request) {
                Completion::Handshake => {
                    port.outstanding.register(interface.match_key(&request), Outstanding { request, beats: 0 });
                }
                Completion::OnAccept => {
                    let response = interface.sample_completion(&request, &port.inp);
                    port.upstream.push_back(response);
                    self.stats.responses += 1;
                }
                Completion::AfterCycles(cycles) => {
                    port.fixed.push_back((now + self.clock.cycles(cycles), request));
                }
            }
        } else if interface.nacc_on_refusal() {
            debug!(port = index, drained = port.fifo.len(), "pin request refused, draining port");
            for request in port.fifo.drain(..) {
                port.upstream.push_back(Response::nacc(&request));
                self.stats.naccs += 1;
            }
            port.state = PinState::Refused;
        }
    }

    fn sample_fixed(&mut self, now: Time, index: usize) {
        let interface = self.interface.as_ref();
        let port = &mut self.ports[index];
        while port.fixed.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, request)) = port.fixed.pop_front() {
                let response = interface.sample_completion(&request, &port.inp);
                port.upstream.push_back(response);
                self.stats.responses += 1;
            }
        }
    }

    fn deliver(&mut self, now: Time, index: usize, upstream: &mut dyn UpstreamPorts) {
        let port = &mut self.ports[index];
        while let Some(response) = port.upstream.front() {
            if !upstream.nb_respond(index, now, response) {
                trace!(port = index, "upstream refused response");
                break;
            }
            let _ = port.upstream.pop_front();
        }
    }

    /// Drops every queued request, outstanding transaction and pending response.
    pub fn reset(&mut self) {
        for port in &mut self.ports {
            port.fifo.clear();
            port.state = PinState::Idle;
            port.out.clear_all();
            port.inp.clear_all();
            port.outstanding.clear();
            port.fixed.clear();
            port.upstream.clear();
        }
        self.fault = None;
        self.stats = TransactorStats::default();
    }
}

/// One transactor port seen as a downstream [`RequestSink`].
///
/// Protocol errors are held by the transactor and returned from its next `advance`.
#[derive(Debug)]
pub struct TransactorPort<'a> {
    transactor: &'a mut Transactor,
    port: usize,
}

impl RequestSink for TransactorPort<'_> {
    fn nb_request(&mut self, now: Time, request: &Request) -> bool {
        match self.transactor.nb_request(now, self.port, request) {
            Ok(accepted) => accepted,
            Err(e) => {
                self.transactor.cursor = self.transactor.cursor.max(now);
                self.transactor.fault = Some(e);
                false
            }
        }
    }
}
