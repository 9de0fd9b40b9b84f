//! Multi-port bus arbiter.
//!
//! The arbiter accepts requests from several masters and forwards them, one at a time, to a
//! single downstream target. It is built from the following pieces:
//! 1. **Admission:** per-port bounded FIFOs; refusals are answered synchronously with NACC.
//! 2. **Request thread:** arbitration at the arbitration phase, dispatch after the request
//!    delay, a not-accepted window after each dispatch, and retry on downstream NACC.
//! 3. **Response threads:** one per port, pacing responses by response delay, repeat and
//!    recovery time, and retrying when the master refuses.
//! 4. **Width conversion, routing, translation, fault injection:** see the submodules.
//!
//! The threads are explicit state machines. `next_wakeup` reports the earliest time any
//! of them needs to run; `advance` runs every thread whose wake time has been reached.

/// Runtime command surface.
pub mod command;

/// Deterministic fault injection.
pub mod fault;

/// Arbitration engine and priority policies.
pub mod policy;

/// Bus-width conversion.
pub mod pwc;

/// Per-port queues and pooled transaction records.
pub mod queue;

/// Route-ID rewriting and the autonomous route table.
pub mod routing;

/// Address translation tables.
pub mod translation;

use std::collections::VecDeque;

use tracing::{debug, error, info, trace, warn};

use self::fault::FaultInjector;
use self::policy::{ArbitrationEngine, Contender};
use self::pwc::{Conversion, WidthConverter};
use self::queue::{Admission, PortQueue, RejectCause, RequestInfo, ResponseInfo};
use self::routing::Routing;
use self::translation::AddressTranslator;
use crate::bus::{BusProtocol, FastAccess, Request, RequestSink, Response, UpstreamPorts};
use crate::common::{ConfigError, Handle, Pool, ProtocolError, Time};
use crate::config::ArbiterConfig;
use crate::sim::clock::Clock;
use crate::stats::{ArbiterStats, BufferProfile};

/// State of the request thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Nothing to arbitrate; woken by admission, lock release or a grant.
    Idle,
    /// Arbitration happens at `at`.
    WaitingArbitrationPhase {
        /// Wake time.
        at: Time,
    },
    /// A granted request is dispatched at `at`.
    WaitingRequestDelay {
        /// Wake time.
        at: Time,
    },
    /// A dispatched request may still be refused until `until`.
    WaitingNaccWindow {
        /// End of the window.
        until: Time,
    },
    /// A refused request is offered again at `at`.
    WaitingRetry {
        /// Wake time.
        at: Time,
    },
}

impl RequestState {
    /// Wake time of the state, if any.
    pub const fn wake(self) -> Option<Time> {
        match self {
            Self::Idle => None,
            Self::WaitingArbitrationPhase { at }
            | Self::WaitingRequestDelay { at }
            | Self::WaitingNaccWindow { until: at }
            | Self::WaitingRetry { at } => Some(at),
        }
    }
}

/// State of one response thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// Response FIFO empty.
    Idle,
    /// The head response is offered upstream at `at`.
    WaitingDelay {
        /// Wake time.
        at: Time,
    },
    /// The master refused the head response; it is offered again at `at`.
    WaitingRetry {
        /// Wake time.
        at: Time,
    },
}

impl ResponseState {
    /// Wake time of the state, if any.
    pub const fn wake(self) -> Option<Time> {
        match self {
            Self::Idle => None,
            Self::WaitingDelay { at } | Self::WaitingRetry { at } => Some(at),
        }
    }
}

#[derive(Debug)]
struct Dispatch {
    handle: Handle<RequestInfo>,
    port: usize,
    pieces: VecDeque<Request>,
    sent_at: Time,
    nacc_received: bool,
}

#[derive(Debug, Clone, Copy)]
struct ResponseThread {
    state: ResponseState,
    last_completion: Option<Time>,
    previous_was_last: bool,
}

impl ResponseThread {
    const IDLE: Self = Self {
        state: ResponseState::Idle,
        last_completion: None,
        previous_was_last: true,
    };
}

/// Multi-port arbiter component.
#[derive(Debug)]
pub struct Arbiter {
    config: ArbiterConfig,
    clock: Clock,
    request_pool: Pool<RequestInfo>,
    response_pool: Pool<ResponseInfo>,
    request_fifos: Vec<PortQueue<RequestInfo>>,
    response_fifos: Vec<PortQueue<ResponseInfo>>,
    engine: ArbitrationEngine,
    routing: Routing,
    translator: AddressTranslator,
    faults: FaultInjector,
    pwc: Option<WidthConverter>,
    request_state: RequestState,
    dispatch: Option<Dispatch>,
    last_dispatch: Option<Time>,
    response_threads: Vec<ResponseThread>,
    in_flight: Vec<bool>,
    pending_lock: Option<(Time, bool)>,
    stats: ArbiterStats,
}

impl Arbiter {
    /// Builds an arbiter, validating `config` and loading its translation script.
    pub fn new(config: ArbiterConfig) -> Result<Self, ConfigError> {
        config.validate().inspect_err(|e| error!(error = %e, "arbiter configuration rejected"))?;
        let translator = match &config.translation_file {
            Some(path) => AddressTranslator::from_file(path)?,
            None => AddressTranslator::default(),
        };
        let ports = config.num_masters;

        let mut engine = ArbitrationEngine::new(ports)
            .with_lock_groups(config.lock_groups()?)
            .with_duplex_pairing(config.external_cbox)
            .with_xfer_en_port(config.xfer_en_port);
        if let Some(policies) = config.port_policies()? {
            engine = engine.with_policies(policies);
        }
        if config.external_order {
            engine = engine.with_external_order();
        }

        let routing = if config.num_route_ids > 0 {
            Routing::autonomous(config.num_route_ids)
        } else {
            Routing::port_bits(config.route_id_lsb, config.route_id_bits())
        };
        let pwc = config.width_conversion_enabled().then(|| {
            WidthConverter::new(
                config.slave_byte_width,
                (0..ports).map(|p| config.master_width_of(p)).collect(),
                config.use_block_requests,
            )
        });
        let request_capacity: usize = (0..ports).map(|p| config.request_fifo_depth_of(p)).sum();

        info!(
            num_masters = ports,
            clock_period = config.clock.clock_period,
            width_conversion = pwc.is_some(),
            "arbiter configured"
        );
        Ok(Self {
            clock: Clock::new(&config.clock),
            request_pool: Pool::with_capacity(request_capacity),
            response_pool: Pool::with_capacity(ports * config.response_fifo_depth),
            request_fifos: (0..ports)
                .map(|p| PortQueue::new(config.request_fifo_depth_of(p)))
                .collect(),
            response_fifos: (0..ports)
                .map(|_| PortQueue::new(config.response_fifo_depth))
                .collect(),
            engine,
            routing,
            translator,
            faults: FaultInjector::new(&config.fault),
            pwc,
            request_state: RequestState::Idle,
            dispatch: None,
            last_dispatch: None,
            response_threads: vec![ResponseThread::IDLE; ports],
            in_flight: vec![false; ports],
            pending_lock: None,
            stats: ArbiterStats::new(ports),
            config,
        })
    }

    /// Replaces the address translation table.
    #[must_use]
    pub fn with_translator(mut self, translator: AddressTranslator) -> Self {
        self.translator = translator;
        self
    }

    /// Active configuration.
    pub const fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    /// Current clock.
    pub const fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Number of master ports.
    pub fn num_ports(&self) -> usize {
        self.request_fifos.len()
    }

    /// Traffic counters.
    pub const fn stats(&self) -> &ArbiterStats {
        &self.stats
    }

    /// State of the request thread.
    pub const fn request_state(&self) -> RequestState {
        self.request_state
    }

    /// State of the response thread of `port`.
    pub fn response_state(&self, port: usize) -> Option<ResponseState> {
        self.response_threads.get(port).map(|t| t.state)
    }

    /// Requests queued on `port` (not counting the one being dispatched).
    pub fn queued_requests(&self, port: usize) -> usize {
        self.request_fifos.get(port).map_or(0, PortQueue::len)
    }

    /// Responses queued for `port`.
    pub fn queued_responses(&self, port: usize) -> usize {
        self.response_fifos.get(port).map_or(0, PortQueue::len)
    }

    /// Port holding the arbitration lock.
    pub const fn lock_owner(&self) -> Option<usize> {
        self.engine.lock_owner()
    }

    /// Port served most recently.
    pub const fn token(&self) -> usize {
        self.engine.token()
    }

    /// Current priority of every port under priority arbitration.
    pub fn priorities(&self) -> Option<Vec<u32>> {
        self.engine.priorities()
    }

    /// Route IDs owned by in-flight transactions (autonomous routing).
    pub fn route_ids_in_use(&self) -> usize {
        self.routing.in_use()
    }

    /// Transactions currently open in the width converter.
    pub fn open_conversions(&self) -> usize {
        self.pwc.as_ref().map_or(0, WidthConverter::open_transactions)
    }

    /// Request records currently owned by queues or the dispatch stage.
    pub const fn request_records_in_use(&self) -> usize {
        self.request_pool.in_use()
    }

    /// Returns `true` when no request or response is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.dispatch.is_none()
            && self.request_fifos.iter().all(PortQueue::is_empty)
            && self.response_fifos.iter().all(PortQueue::is_empty)
    }

    /// Buffer occupancy snapshot.
    pub fn buffer_profile(&self) -> BufferProfile {
        BufferProfile {
            request_fifo_depths: self.request_fifos.iter().map(PortQueue::depth).collect(),
            request_fifo_high_water: self.request_fifos.iter().map(PortQueue::high_water).collect(),
            response_fifo_high_water: self.response_fifos.iter().map(PortQueue::high_water).collect(),
            request_pool_high_water: self.request_pool.high_water(),
            response_pool_high_water: self.response_pool.high_water(),
            route_id_high_water: self.routing.high_water(),
            converter_high_water: self.pwc.as_ref().map_or(0, WidthConverter::high_water),
        }
    }

    fn check_port(&self, port: usize) -> Result<(), ProtocolError> {
        if port < self.num_ports() {
            Ok(())
        } else {
            Err(ProtocolError::InvalidPort {
                port,
                num_ports: self.num_ports(),
            })
        }
    }

    fn nacc_window(&self) -> Time {
        self.config.nacc_wait_time.unwrap_or(self.clock.period())
    }

    /// Earliest time any thread or pending lock change needs to run.
    pub fn next_wakeup(&self) -> Option<Time> {
        self.response_threads
            .iter()
            .filter_map(|t| t.state.wake())
            .chain(self.request_state.wake())
            .chain(self.pending_lock.map(|(at, _)| at))
            .min()
    }

    /// Raises the arbitration wake if the request thread is idle and work is queued.
    fn rearm(&mut self, now: Time) {
        if self.request_state == RequestState::Idle
            && self.request_fifos.iter().any(|q| !q.is_empty())
        {
            let at = self.clock.at_phase(now, self.config.arbitration_phase);
            self.request_state = RequestState::WaitingArbitrationPhase { at };
        }
    }

    /// Offers an upstream request on `port`.
    ///
    /// # Returns
    ///
    /// `Admission::Accepted` when queued, otherwise the inline NACC and its cause. Malformed
    /// requests and invalid ports are protocol errors.
    pub fn nb_request(&mut self, now: Time, port: usize, request: &Request) -> Result<Admission, ProtocolError> {
        self.check_port(port)?;
        request
            .validate(self.config.master_width_of(port))
            .inspect_err(|e| error!(port, error = %e, "malformed request"))?;

        if let Some(cause) = self.admission_refusal(port, request) {
            self.stats.record_reject(cause);
            debug!(port, %request, %cause, "request refused");
            return Ok(Admission::Rejected {
                response: Response::nacc(request),
                cause,
            });
        }

        let handle = self.request_pool.insert(RequestInfo {
            request: request.clone(),
            arrived_at: now,
            port,
        });
        self.request_fifos[port].push_back(handle);
        self.stats.accepted[port] += 1;
        if self.config.one_at_a_time {
            self.in_flight[port] = true;
        }
        trace!(port, %request, "request accepted");
        self.rearm(now);
        Ok(Admission::Accepted)
    }

    fn admission_refusal(&mut self, port: usize, request: &Request) -> Option<RejectCause> {
        let apb_port = self.config.protocol_of(port) == BusProtocol::Apb;
        if apb_port != (request.protocol == BusProtocol::Apb) {
            return Some(RejectCause::ProtocolMismatch);
        }
        if self.config.dram_lock && !self.engine.may_serve(port) {
            return Some(RejectCause::Locked);
        }
        if self.config.one_at_a_time && self.in_flight[port] {
            return Some(RejectCause::Busy);
        }
        if self.request_fifos[port].is_full() {
            return Some(RejectCause::QueueFull);
        }
        if self.faults.should_fail(port) {
            return Some(RejectCause::Injected);
        }
        if !self.routing.admit(port, request) {
            return Some(RejectCause::RouteIdsExhausted);
        }
        None
    }

    /// Appends `port` to the externally supplied grant order.
    pub fn push_grant(&mut self, now: Time, port: usize) -> Result<(), ProtocolError> {
        self.check_port(port)?;
        self.engine.push_grant(port);
        self.rearm(now);
        Ok(())
    }

    /// Explicit lock request from `port`.
    ///
    /// With `dram_lock` the lock steers arbitration; in every mode the lock state is
    /// forwarded downstream on the next `advance`.
    pub fn nb_lock(&mut self, now: Time, port: usize, lock: bool) -> Result<(), ProtocolError> {
        self.check_port(port)?;
        if self.config.dram_lock {
            match (lock, self.engine.lock_owner()) {
                (true, None) => self.engine.lock(port),
                (true, Some(owner)) if owner != port => {
                    warn!(port, owner, "lock request while another port holds the lock");
                    return Ok(());
                }
                (false, Some(owner)) if owner == port => {
                    self.engine.unlock();
                    self.rearm(now);
                }
                _ => {}
            }
        }
        self.pending_lock = Some((now, lock));
        Ok(())
    }

    /// Runs every thread whose wake time is at or before `now`.
    pub fn advance(
        &mut self,
        now: Time,
        downstream: &mut dyn RequestSink,
        upstream: &mut dyn UpstreamPorts,
    ) -> Result<(), ProtocolError> {
        if let Some((at, lock)) = self.pending_lock {
            if at <= now {
                downstream.nb_lock(lock);
                self.pending_lock = None;
            }
        }
        loop {
            match self.request_state.wake() {
                Some(at) if at <= now => self.step_request(now, downstream)?,
                _ => break,
            }
        }
        for port in 0..self.num_ports() {
            loop {
                match self.response_threads[port].state.wake() {
                    Some(at) if at <= now => self.step_response(port, now, upstream),
                    _ => break,
                }
            }
        }
        Ok(())
    }

    fn step_request(&mut self, now: Time, downstream: &mut dyn RequestSink) -> Result<(), ProtocolError> {
        match self.request_state {
            RequestState::Idle => {}
            RequestState::WaitingArbitrationPhase { .. } => self.arbitrate(now)?,
            RequestState::WaitingRequestDelay { .. } | RequestState::WaitingRetry { .. } => {
                self.send_piece(now, downstream);
            }
            RequestState::WaitingNaccWindow { .. } => self.close_nacc_window(now),
        }
        Ok(())
    }

    fn contender(&self, handle: &Handle<RequestInfo>) -> Contender {
        let info = self.request_pool.get(handle);
        Contender {
            kind: info.request.kind,
            address: info.request.address,
            total_bytes: info.request.total_bytes(),
            arrival_cycle: self.clock.cycle_of(info.arrived_at),
            xfer_en: info.request.xfer_en,
        }
    }

    fn dispatch_time(&self, arrived_at: Time, now: Time) -> Time {
        let deadline = Clock::deadline(
            arrived_at,
            self.clock.cycles(self.config.request_delay),
            self.last_dispatch,
            self.clock.period(),
        )
        .max(now);
        if self.config.align_request_phase {
            self.clock.at_phase(deadline, self.config.arbitration_phase)
        } else {
            deadline
        }
    }

    fn arbitrate(&mut self, now: Time) -> Result<(), ProtocolError> {
        let heads: Vec<Option<Contender>> = self
            .request_fifos
            .iter()
            .map(|q| q.front().map(|h| self.contender(h)))
            .collect();
        let Some(port) = self.engine.select(&heads) else {
            trace!("no eligible port");
            self.request_state = RequestState::Idle;
            return Ok(());
        };
        let Some(handle) = self.request_fifos[port].pop_front() else {
            self.request_state = RequestState::Idle;
            return Ok(());
        };
        self.stats.arbitrations += 1;
        let (request, arrived_at) = {
            let info = self.request_pool.get(&handle);
            (info.request.clone(), info.arrived_at)
        };
        debug!(port, %request, "granted");

        if !self.config.dram_lock {
            if request.last_transfer {
                self.engine.unlock();
            } else {
                self.engine.lock(port);
            }
        }

        let conversion = match self.pwc.as_mut() {
            Some(pwc) => pwc.convert_request(port, &request),
            None => Ok(Conversion::PassThrough),
        };
        let pieces = match conversion {
            Ok(Conversion::PassThrough) => vec![request],
            Ok(Conversion::Pieces(pieces)) => {
                self.stats.converted += 1;
                self.stats.converted_pieces += pieces.len() as u64;
                pieces
            }
            Err(e) => {
                error!(port, error = %e, "width conversion failed");
                self.request_pool.release(handle);
                self.in_flight[port] = false;
                return Err(e);
            }
        };
        let pieces: VecDeque<Request> = pieces
            .into_iter()
            .map(|mut piece| {
                piece.address = self.translator.translate(piece.address);
                self.routing.outbound(port, &mut piece);
                piece
            })
            .collect();

        if pieces.is_empty() {
            trace!(port, "transfer absorbed by width converter");
            self.request_pool.release(handle);
            self.in_flight[port] = false;
            self.request_state = if self.request_fifos.iter().any(|q| !q.is_empty()) {
                RequestState::WaitingArbitrationPhase {
                    at: self.clock.after_phase(now, self.config.arbitration_phase),
                }
            } else {
                RequestState::Idle
            };
            return Ok(());
        }

        self.dispatch = Some(Dispatch {
            handle,
            port,
            pieces,
            sent_at: now,
            nacc_received: false,
        });
        self.request_state = RequestState::WaitingRequestDelay {
            at: self.dispatch_time(arrived_at, now),
        };
        Ok(())
    }

    fn send_piece(&mut self, now: Time, downstream: &mut dyn RequestSink) {
        let retry = matches!(self.request_state, RequestState::WaitingRetry { .. });
        let Some(dispatch) = self.dispatch.as_mut() else {
            self.request_state = RequestState::Idle;
            return;
        };
        let Some(piece) = dispatch.pieces.front() else {
            self.request_state = RequestState::Idle;
            return;
        };
        self.stats.dispatched += 1;
        self.last_dispatch = Some(now);
        dispatch.sent_at = now;
        dispatch.nacc_received = false;
        if downstream.nb_request(now, piece) {
            trace!(port = dispatch.port, %piece, retry, "dispatched");
            self.request_state = RequestState::WaitingNaccWindow {
                until: now + self.nacc_window(),
            };
        } else {
            debug!(port = dispatch.port, %piece, "downstream refused request");
            self.stats.downstream_naccs += 1;
            self.request_state = RequestState::WaitingRetry {
                at: now + self.clock.period(),
            };
        }
    }

    fn close_nacc_window(&mut self, now: Time) {
        let period = self.clock.period();
        let Some(dispatch) = self.dispatch.as_mut() else {
            self.request_state = RequestState::Idle;
            return;
        };
        if dispatch.nacc_received {
            self.stats.downstream_naccs += 1;
            self.request_state = RequestState::WaitingRetry {
                at: (dispatch.sent_at + period).max(now),
            };
            return;
        }
        let _ = dispatch.pieces.pop_front();
        if !dispatch.pieces.is_empty() {
            let arrived_at = self.request_pool.get(&dispatch.handle).arrived_at;
            self.request_state = RequestState::WaitingRequestDelay {
                at: self.dispatch_time(arrived_at, now),
            };
            return;
        }
        if let Some(dispatch) = self.dispatch.take() {
            self.in_flight[dispatch.port] = false;
            self.request_pool.release(dispatch.handle);
        }
        self.request_state = RequestState::Idle;
        self.rearm(now);
    }

    /// Accepts a response from downstream.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when the destination port's response FIFO is full ("try again"). NACC
    /// responses outside the not-accepted window and responses that route to no port are
    /// protocol errors.
    pub fn nb_respond(&mut self, now: Time, response: &Response) -> Result<bool, ProtocolError> {
        if response.is_nacc() {
            if let (RequestState::WaitingNaccWindow { .. }, Some(dispatch)) =
                (self.request_state, self.dispatch.as_mut())
            {
                if dispatch.pieces.front().is_some_and(|p| p.tag == response.tag) {
                    debug!(port = dispatch.port, tag = response.tag, "NACC inside not-accepted window");
                    dispatch.nacc_received = true;
                    return Ok(true);
                }
            }
            let e = ProtocolError::UnexpectedNacc { tag: response.tag };
            error!(error = %e, "unexpected NACC");
            return Err(e);
        }

        let Some(port) = self.routing.port_of(response).filter(|p| *p < self.num_ports()) else {
            let e = ProtocolError::UnknownResponse {
                tag: response.tag,
                id: response.id,
                route_id: response.route_id,
            };
            error!(error = %e, "unroutable response");
            return Err(e);
        };
        if self.response_fifos[port].is_full() {
            trace!(port, "response FIFO full");
            return Ok(false);
        }

        let mut response = response.clone();
        let _ = self.routing.inbound(&mut response, true);
        self.stats.responses_received += 1;
        let upstream = match self.pwc.as_mut() {
            Some(pwc) => pwc.convert_response(port, &response),
            None => None,
        }
        .unwrap_or_else(|| vec![response]);
        for response in upstream {
            trace!(port, %response, "response queued");
            let handle = self.response_pool.insert(ResponseInfo {
                response,
                arrived_at: now,
                port,
            });
            self.response_fifos[port].push_back(handle);
        }
        if self.response_threads[port].state == ResponseState::Idle {
            self.schedule_response(port, now);
        }
        Ok(true)
    }

    fn schedule_response(&mut self, port: usize, now: Time) {
        let thread = self.response_threads[port];
        let Some(head) = self.response_fifos[port].front() else {
            self.response_threads[port].state = ResponseState::Idle;
            return;
        };
        let arrived_at = self.response_pool.get(head).arrived_at;
        let spacing = if thread.previous_was_last {
            self.config.recovery_time
        } else {
            self.config.response_repeat
        };
        let at = Clock::deadline(
            arrived_at,
            self.clock.cycles(self.config.response_delay),
            thread.last_completion,
            self.clock.cycles(spacing),
        )
        .max(now);
        self.response_threads[port].state = ResponseState::WaitingDelay { at };
    }

    fn step_response(&mut self, port: usize, now: Time, upstream: &mut dyn UpstreamPorts) {
        let Some(head) = self.response_fifos[port].front() else {
            self.response_threads[port].state = ResponseState::Idle;
            return;
        };
        let response = &self.response_pool.get(head).response;
        if upstream.nb_respond(port, now, response) {
            trace!(port, %response, "response delivered");
            let last = response.last_transfer;
            if let Some(handle) = self.response_fifos[port].pop_front() {
                self.response_pool.release(handle);
            }
            let thread = &mut self.response_threads[port];
            thread.last_completion = Some(now);
            thread.previous_was_last = last;
            self.stats.responses_delivered += 1;
            self.schedule_response(port, now);
        } else {
            trace!(port, "upstream refused response");
            self.stats.upstream_retries += 1;
            self.response_threads[port].state = ResponseState::WaitingRetry {
                at: now + self.clock.period(),
            };
        }
    }

    /// Debug read through the arbiter (translated, no timing).
    pub fn nb_peek(
        &mut self,
        port: usize,
        address: u64,
        buffer: &mut [u8],
        downstream: &mut dyn RequestSink,
    ) -> Result<(), ProtocolError> {
        self.check_port(port)?;
        downstream.nb_peek(self.translator.translate(address), buffer);
        Ok(())
    }

    /// Debug write through the arbiter (translated, no timing).
    pub fn nb_poke(
        &mut self,
        port: usize,
        address: u64,
        data: &[u8],
        downstream: &mut dyn RequestSink,
    ) -> Result<(), ProtocolError> {
        self.check_port(port)?;
        downstream.nb_poke(self.translator.translate(address), data);
        Ok(())
    }

    /// Negotiates direct access for `port`.
    ///
    /// Denied on width-converting ports. Otherwise the downstream grant is mapped back
    /// through the translation window containing `access.address`.
    pub fn nb_fast_access(
        &mut self,
        port: usize,
        access: &mut FastAccess,
        downstream: &mut dyn RequestSink,
    ) -> Result<bool, ProtocolError> {
        self.check_port(port)?;
        if self.pwc.as_ref().is_some_and(|pwc| pwc.converts_port(port)) {
            access.deny();
            return Ok(false);
        }
        let (low, high, down_low) = self.translator.window(access.address);
        let down_high = down_low + (high - low);
        let mut down = FastAccess::new(self.translator.translate(access.address));
        let granted = downstream.nb_fast_access(&mut down);
        down.clamp(down_low, down_high);
        access.clamp(
            low + down.start.saturating_sub(down_low),
            low + down.end.saturating_sub(down_low),
        );
        if !granted {
            access.deny();
        }
        Ok(granted)
    }

    /// Drains every queue and restores initial lock, token, priority and route state.
    ///
    /// A hard reset also clears statistics, restores the configured clock and restarts the
    /// fault-injection sequence.
    pub fn reset(&mut self, hard: bool) {
        for fifo in &mut self.request_fifos {
            for handle in fifo.drain().collect::<Vec<_>>() {
                self.request_pool.release(handle);
            }
            fifo.reset_high_water();
        }
        for fifo in &mut self.response_fifos {
            for handle in fifo.drain().collect::<Vec<_>>() {
                self.response_pool.release(handle);
            }
            fifo.reset_high_water();
        }
        if let Some(dispatch) = self.dispatch.take() {
            self.request_pool.release(dispatch.handle);
        }
        self.engine.reset();
        self.routing.reset();
        if let Some(pwc) = self.pwc.as_mut() {
            pwc.reset();
        }
        self.request_state = RequestState::Idle;
        self.last_dispatch = None;
        self.response_threads.fill(ResponseThread::IDLE);
        self.in_flight.fill(false);
        self.pending_lock = None;
        if hard {
            self.stats = ArbiterStats::new(self.num_ports());
            self.clock = Clock::new(&self.config.clock);
            self.faults.reseed();
            self.request_pool.reset_high_water();
            self.response_pool.reset_high_water();
        }
        info!(hard, "arbiter reset");
    }
}
