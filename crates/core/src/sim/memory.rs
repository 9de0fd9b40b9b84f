//! Behavioural memory slave.
//!
//! A sparse byte-addressed memory that answers bus requests after configurable latencies.
//! It provides:
//! 1. **Timed access:** reads answer `read_delay` cycles after acceptance, one beat per
//!    `block_read_repeat` cycles; writes answer on their last transfer after `write_delay`.
//! 2. **Address decoding:** accesses outside `[start_address, start_address + size)` are
//!    answered with an address error.
//! 3. **Debug access:** peek, poke and fast-access over the whole decoded range.
//! 4. **Refusal injection:** the first `nacc_first` requests are refused.

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::bus::{FastAccess, Request, RequestSink, RequestType, Response, ResponseStatus};
use crate::common::Time;
use crate::config::MemoryModelConfig;

const PAGE_SIZE: u64 = 4096;

#[derive(Debug, Clone)]
struct PendingResponse {
    at: Time,
    response: Response,
}

/// Sparse behavioural memory.
#[derive(Debug, Clone)]
pub struct Memory {
    config: MemoryModelConfig,
    period: Time,
    pages: HashMap<u64, Box<[u8]>>,
    pending: VecDeque<PendingResponse>,
    nacc_remaining: u32,
    rcw_compare: HashMap<u64, Vec<u8>>,
    accepted: Vec<(Time, Request)>,
    refused: u64,
    locked: bool,
}

impl Memory {
    /// Creates an empty memory clocked with `period`.
    pub fn new(config: MemoryModelConfig, period: Time) -> Self {
        Self {
            nacc_remaining: config.nacc_first,
            config,
            period,
            pages: HashMap::new(),
            pending: VecDeque::new(),
            rcw_compare: HashMap::new(),
            accepted: Vec::new(),
            refused: 0,
            locked: false,
        }
    }

    /// Requests accepted so far, with their acceptance time.
    pub fn accepted(&self) -> &[(Time, Request)] {
        &self.accepted
    }

    /// Number of requests refused.
    pub const fn refused(&self) -> u64 {
        self.refused
    }

    /// Current state of the bus lock as last set by the initiator.
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// Responses waiting to be delivered.
    pub fn pending_responses(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if `[address, address + len)` lies inside the decoded range.
    pub fn decodes(&self, address: u64, len: u64) -> bool {
        address >= self.config.start_address
            && address
                .checked_add(len)
                .is_some_and(|end| end <= self.config.start_address + self.config.size)
    }

    fn read_byte(&self, address: u64) -> u8 {
        self.pages
            .get(&(address / PAGE_SIZE))
            .map_or(0, |page| page[(address % PAGE_SIZE) as usize])
    }

    fn write_byte(&mut self, address: u64, value: u8) {
        let page = self
            .pages
            .entry(address / PAGE_SIZE)
            .or_insert_with(|| vec![0; PAGE_SIZE as usize].into_boxed_slice());
        page[(address % PAGE_SIZE) as usize] = value;
    }

    fn read_bytes(&self, address: u64, len: u32) -> Vec<u8> {
        (0..u64::from(len)).map(|i| self.read_byte(address + i)).collect()
    }

    fn schedule(&mut self, at: Time, response: Response) {
        let at = self.pending.back().map_or(at, |last| at.max(last.at));
        trace!(at, %response, "memory response scheduled");
        self.pending.push_back(PendingResponse { at, response });
    }

    /// Earliest time a response is due.
    pub fn next_wakeup(&self) -> Option<Time> {
        self.pending.front().map(|p| p.at)
    }

    /// The oldest response if it is due at `now`.
    pub fn due(&self, now: Time) -> Option<&Response> {
        self.pending
            .front()
            .filter(|p| p.at <= now)
            .map(|p| &p.response)
    }

    /// Removes the oldest response after it was accepted.
    pub fn pop_front(&mut self) -> Option<Response> {
        self.pending.pop_front().map(|p| p.response)
    }

    /// Removes the oldest response if it is due at `now`.
    pub fn pop_due(&mut self, now: Time) -> Option<Response> {
        if self.due(now).is_some() { self.pop_front() } else { None }
    }

    /// Postpones the oldest response to `at` after it was refused.
    pub fn defer_front(&mut self, at: Time) {
        if let Some(front) = self.pending.front_mut() {
            front.at = at;
        }
    }

    fn respond_read(&mut self, now: Time, request: &Request) {
        let beats = if request.kind.is_block() || request.kind.is_burst() {
            request.num_transfers.max(1)
        } else {
            1
        };
        let first = now + self.period * self.config.read_delay;
        for beat in 0..beats {
            let data = self.read_bytes(request.beat_address(beat), request.size);
            let at = first + self.period * self.config.block_read_repeat * u64::from(beat);
            self.schedule(at, Response::read_beat(request, beat, data));
        }
    }

    fn store(&mut self, request: &Request) {
        for (lane, byte) in request.buffer.iter().enumerate() {
            if request.byte_enables >> lane & 1 == 1 {
                self.write_byte(request.address + lane as u64, *byte);
            }
        }
    }

    fn respond_write(&mut self, now: Time, request: &Request) {
        if request.kind == RequestType::Rcw {
            if !request.last_transfer {
                let _ = self.rcw_compare.insert(request.tag, request.buffer.clone());
                return;
            }
            let current = self.read_bytes(request.address, request.size);
            let matches = self
                .rcw_compare
                .remove(&request.tag)
                .is_some_and(|compare| compare == current);
            if matches {
                self.store(request);
            }
            let mut response = Response::from_request(request, ResponseStatus::Ok);
            response.buffer = current;
            self.schedule(now + self.period * self.config.write_delay, response);
            return;
        }
        self.store(request);
        if request.last_transfer {
            let response = Response::from_request(request, ResponseStatus::Ok);
            self.schedule(now + self.period * self.config.write_delay, response);
        }
    }
}

impl RequestSink for Memory {
    fn nb_request(&mut self, now: Time, request: &Request) -> bool {
        if self.nacc_remaining > 0 {
            self.nacc_remaining -= 1;
            self.refused += 1;
            trace!(%request, "memory refused request");
            return false;
        }
        self.accepted.push((now, request.clone()));
        if !self.decodes(request.address, request.total_bytes()) {
            if request.last_transfer || request.kind.is_read() {
                let response = Response::from_request(request, ResponseStatus::AddressError);
                self.schedule(now + self.period * self.config.read_delay, response);
            }
            return true;
        }
        if request.kind.is_read() {
            self.respond_read(now, request);
        } else {
            self.respond_write(now, request);
        }
        true
    }

    fn nb_peek(&mut self, address: u64, buffer: &mut [u8]) {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.read_byte(address + i as u64);
        }
    }

    fn nb_poke(&mut self, address: u64, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_byte(address + i as u64, *byte);
        }
    }

    fn nb_fast_access(&mut self, access: &mut FastAccess) -> bool {
        let end = self.config.start_address + self.config.size.saturating_sub(1);
        access.clamp(self.config.start_address, end);
        if !self.decodes(access.address, 1) {
            access.deny();
        }
        access.granted
    }

    fn nb_lock(&mut self, lock: bool) {
        self.locked = lock;
    }
}
