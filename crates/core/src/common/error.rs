//! Error definitions.
//!
//! This module defines the error handling for the bus model. It provides:
//! 1. **Configuration errors:** Malformed or contradictory parameters, reported at
//!    construction time with the offending parameter name.
//! 2. **Protocol errors:** Runtime violations that abort the simulation (duplicate tags,
//!    unsupported width conversions, responses nobody is waiting for).
//! 3. **Command errors:** Failures of the textual runtime command surface.
//!
//! Transient flow-control conditions (full queues, injected faults, locks held elsewhere)
//! are not errors; they are reported as NACC responses.

use std::path::PathBuf;

use thiserror::Error;

use crate::bus::RequestType;

/// Invalid or contradictory configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter has an illegal value or conflicts with another parameter.
    #[error("invalid parameter `{param}`: {reason}")]
    Invalid {
        /// Name of the offending parameter.
        param: &'static str,
        /// Human readable explanation.
        reason: String,
    },

    /// A line of the address translation script could not be parsed or overlaps another.
    #[error("translation_file line {line}: {reason}")]
    Translation {
        /// One-based line number within the script.
        line: usize,
        /// Human readable explanation.
        reason: String,
    },

    /// A line of a traffic script could not be parsed.
    #[error("traffic script line {line}: {reason}")]
    Script {
        /// One-based line number within the script.
        line: usize,
        /// Human readable explanation.
        reason: String,
    },

    /// A configuration or script file could not be read.
    #[error("cannot read `{}`: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// JSON configuration failed to deserialize.
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            param,
            reason: reason.into(),
        }
    }
}

/// Fatal protocol violation detected while the simulation runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A port index outside the configured range was used.
    #[error("port {port} out of range (component has {num_ports} ports)")]
    InvalidPort {
        /// The port that was addressed.
        port: usize,
        /// Number of configured ports.
        num_ports: usize,
    },

    /// A new transaction reused the tag of a transaction still open in the width converter.
    #[error("port {port}: tag {tag} is already open in the width converter")]
    DuplicateTag {
        /// Originating port.
        port: usize,
        /// The reused tag.
        tag: u64,
    },

    /// The width converter cannot transform this request type.
    #[error("port {port}: {kind} cannot be width converted ({reason})")]
    UnsupportedConversion {
        /// Originating port.
        port: usize,
        /// Request type that was rejected.
        kind: RequestType,
        /// Why the conversion is impossible.
        reason: String,
    },

    /// A request does not satisfy the envelope invariants.
    #[error("malformed request (tag {tag}): {reason}")]
    MalformedRequest {
        /// Tag of the offending request.
        tag: u64,
        /// Violated invariant.
        reason: String,
    },

    /// A response arrived that matches no outstanding transaction.
    #[error("response with tag {tag}, id {id}, route_id {route_id} matches no outstanding request")]
    UnknownResponse {
        /// Response tag.
        tag: u64,
        /// Response transaction ID.
        id: u8,
        /// Response route ID.
        route_id: u32,
    },

    /// A NACC response arrived outside the not-accepted window of the dispatched request.
    #[error("NACC for tag {tag} arrived outside the not-accepted window")]
    UnexpectedNacc {
        /// Tag carried by the NACC.
        tag: u64,
    },
}

/// Failure while executing a runtime command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command word is not recognized.
    #[error("unknown command `{0}`")]
    Unknown(String),

    /// A required argument was not supplied.
    #[error("`{command}` requires argument <{argument}>")]
    MissingArgument {
        /// Command word.
        command: &'static str,
        /// Name of the missing argument.
        argument: &'static str,
    },

    /// An argument could not be parsed or is out of range.
    #[error("`{command}`: bad argument `{value}`")]
    BadArgument {
        /// Command word.
        command: &'static str,
        /// Offending text.
        value: String,
    },

    /// The command would leave the component misconfigured.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Umbrella error for simulator construction and execution.
#[derive(Debug, Error)]
pub enum SimError {
    /// Construction failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The simulation hit a fatal protocol violation.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A runtime command failed.
    #[error(transparent)]
    Command(#[from] CommandError),
}
