//! Non-blocking port traits.
//!
//! Components never call each other while suspended: every call below returns its
//! accept/reject answer synchronously. A rejected request or response is simply offered
//! again later by the caller.
//! 1. **`RequestSink`:** the downstream side of a request port (plus debug access and lock).
//! 2. **`ResponseSink`:** the upstream side of a response port.
//! 3. **`UpstreamPorts`:** a bank of response sinks indexed by port number.

use crate::common::Time;

use super::request::Request;
use super::response::Response;

/// Result of a fast-access negotiation: the address window the initiator may access
/// directly without going through timed transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastAccess {
    /// Address that triggered the negotiation.
    pub address: u64,
    /// First address of the granted window.
    pub start: u64,
    /// Last address (inclusive) of the granted window.
    pub end: u64,
    /// `false` when direct access is denied.
    pub granted: bool,
}

impl FastAccess {
    /// Starts a negotiation for `address` with the widest possible window.
    pub const fn new(address: u64) -> Self {
        Self {
            address,
            start: 0,
            end: u64::MAX,
            granted: true,
        }
    }

    /// Denies direct access, keeping the window as a hint for the initiator.
    pub const fn deny(&mut self) {
        self.granted = false;
    }

    /// Narrows the window to `[start, end]`.
    pub fn clamp(&mut self, start: u64, end: u64) {
        self.start = self.start.max(start);
        self.end = self.end.min(end);
    }
}

/// Downstream target of request traffic.
pub trait RequestSink {
    /// Offers `request`; returns `true` if it is accepted, `false` for NACC.
    fn nb_request(&mut self, now: Time, request: &Request) -> bool;

    /// Reads `buffer.len()` bytes at `address` without timing side effects.
    fn nb_peek(&mut self, address: u64, buffer: &mut [u8]) {
        let _ = address;
        buffer.fill(0);
    }

    /// Writes `data` at `address` without timing side effects.
    fn nb_poke(&mut self, address: u64, data: &[u8]) {
        let _ = (address, data);
    }

    /// Negotiates direct access around `access.address`; returns `access.granted`.
    fn nb_fast_access(&mut self, access: &mut FastAccess) -> bool {
        access.deny();
        false
    }

    /// Asserts or releases the downstream bus lock.
    fn nb_lock(&mut self, lock: bool) {
        let _ = lock;
    }
}

/// Upstream receiver of response traffic.
pub trait ResponseSink {
    /// Offers `response`; returns `true` if accepted, `false` to be offered again later.
    fn nb_respond(&mut self, now: Time, response: &Response) -> bool;
}

/// A bank of upstream response sinks indexed by port number.
pub trait UpstreamPorts {
    /// Offers `response` to port `port`.
    fn nb_respond(&mut self, port: usize, now: Time, response: &Response) -> bool;
}

impl<S: ResponseSink> UpstreamPorts for [S] {
    fn nb_respond(&mut self, port: usize, now: Time, response: &Response) -> bool {
        self.get_mut(port)
            .is_some_and(|sink| sink.nb_respond(now, response))
    }
}

impl<S: ResponseSink> UpstreamPorts for Vec<S> {
    fn nb_respond(&mut self, port: usize, now: Time, response: &Response) -> bool {
        self.as_mut_slice().nb_respond(port, now, response)
    }
}
