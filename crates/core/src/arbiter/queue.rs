//! Per-port ingress and egress queues.
//!
//! Queues hold pool handles, never wrappers: the wrapper itself lives in the arbiter's
//! pool and a handle moves from queue to queue as the transaction progresses.

use std::collections::VecDeque;
use std::fmt;

use crate::bus::{Request, Response};
use crate::common::{Handle, Time};

/// Pooled record pairing an upstream request with its arrival time and port.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// The request as received (routing and translation are applied at dispatch).
    pub request: Request,
    /// Time the request was accepted.
    pub arrived_at: Time,
    /// Port the request arrived on.
    pub port: usize,
}

/// Pooled record pairing a response with its arrival time and destination port.
#[derive(Debug, Clone, Default)]
pub struct ResponseInfo {
    /// The response as it will be delivered upstream.
    pub response: Response,
    /// Time the response (or the downstream response it was built from) arrived.
    pub arrived_at: Time,
    /// Destination port.
    pub port: usize,
}

/// Why an upstream request was answered with NACC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectCause {
    /// The port's request FIFO is at its configured depth.
    QueueFull,
    /// `one_at_a_time` and the port already has a request in flight.
    Busy,
    /// Randomized fault injection.
    Injected,
    /// APB payload on a non-APB port or the reverse.
    ProtocolMismatch,
    /// Another port holds the explicit lock.
    Locked,
    /// Autonomous routing has no free route ID.
    RouteIdsExhausted,
}

impl RejectCause {
    /// Every cause, in reporting order.
    pub const ALL: [Self; 6] = [
        Self::QueueFull,
        Self::Busy,
        Self::Injected,
        Self::ProtocolMismatch,
        Self::Locked,
        Self::RouteIdsExhausted,
    ];

    /// Dense index for per-cause counters.
    pub const fn index(self) -> usize {
        match self {
            Self::QueueFull => 0,
            Self::Busy => 1,
            Self::Injected => 2,
            Self::ProtocolMismatch => 3,
            Self::Locked => 4,
            Self::RouteIdsExhausted => 5,
        }
    }
}

impl fmt::Display for RejectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::QueueFull => "queue full",
            Self::Busy => "busy",
            Self::Injected => "fault injected",
            Self::ProtocolMismatch => "protocol mismatch",
            Self::Locked => "locked by another port",
            Self::RouteIdsExhausted => "route IDs exhausted",
        })
    }
}

/// Synchronous answer to an upstream `nb_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The request was queued and the arbitration wake raised.
    Accepted,
    /// The request was refused; `response` is the inline NACC.
    Rejected {
        /// NACC response carrying the request's identity.
        response: Response,
        /// Reason for the refusal.
        cause: RejectCause,
    },
}

impl Admission {
    /// Returns `true` for [`Admission::Accepted`].
    #[inline]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Returns the rejection cause, if any.
    pub const fn cause(&self) -> Option<RejectCause> {
        match self {
            Self::Accepted => None,
            Self::Rejected { cause, .. } => Some(*cause),
        }
    }
}

/// Bounded FIFO of pool handles.
#[derive(Debug)]
pub struct PortQueue<T> {
    entries: VecDeque<Handle<T>>,
    depth: usize,
    high_water: usize,
}

impl<T> PortQueue<T> {
    /// Creates an empty queue admitting at most `depth` entries.
    pub fn new(depth: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(depth),
            depth,
            high_water: 0,
        }
    }

    /// Configured depth.
    #[inline]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Current occupancy.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` when occupancy has reached the depth.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.depth
    }

    /// Appends `handle`. Callers check `is_full` first; the queue itself never refuses.
    pub fn push_back(&mut self, handle: Handle<T>) {
        self.entries.push_back(handle);
        self.high_water = self.high_water.max(self.entries.len());
    }

    /// Returns the oldest handle.
    #[inline]
    pub fn front(&self) -> Option<&Handle<T>> {
        self.entries.front()
    }

    /// Removes the oldest handle.
    #[inline]
    pub fn pop_front(&mut self) -> Option<Handle<T>> {
        self.entries.pop_front()
    }

    /// Removes every handle, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Handle<T>> + '_ {
        self.entries.drain(..)
    }

    /// Largest occupancy seen since the last reset.
    #[inline]
    pub const fn high_water(&self) -> usize {
        self.high_water
    }

    /// Clears the high-water mark back to the current occupancy.
    pub fn reset_high_water(&mut self) {
        self.high_water = self.entries.len();
    }
}
