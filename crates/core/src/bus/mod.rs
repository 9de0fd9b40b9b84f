//! Transaction envelopes and port plumbing.
//!
//! This module organizes the value types and interfaces that every component shares:
//! request and response envelopes, the non-blocking port traits, and the table used to
//! match responses to outstanding requests.

/// Outstanding-transaction table.
pub mod matching;

/// Non-blocking request/response port traits.
pub mod ports;

/// Request envelope and request types.
pub mod request;

/// Response envelope and status codes.
pub mod response;

pub use matching::MatchTable;
pub use ports::{FastAccess, RequestSink, ResponseSink, UpstreamPorts};
pub use request::{BurstType, BusProtocol, Request, RequestType, full_enables, next_tag};
pub use response::{Response, ResponseStatus};
