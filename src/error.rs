// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-06-18

//! Caller-facing error taxonomy for management-port exchanges.
//!
//! Every operation in this crate resolves to exactly one of these kinds;
//! nothing is swallowed. `Timeout` is the only kind that changes endpoint
//! state (the sticky-failure latch), and `Topology` only occurs during
//! startup.

use thiserror::Error;

use crate::port::AccessError;
use crate::topology::TopologyError;

/// Result of a management-port request.
#[derive(Debug, Error)]
pub enum SmpError {
    /// Malformed exchange record: oversized counts, out-of-range message
    /// id, or an access-mode mismatch. Rejected before any hardware access.
    #[error("invalid request: {0}")]
    InvalidInput(&'static str),

    /// The socket index does not correspond to a discovered endpoint.
    #[error("no endpoint for socket {0}")]
    NoSuchEndpoint(u16),

    /// The endpoint lock could not be obtained within the poll budget.
    /// The caller may retry later.
    #[error("endpoint busy")]
    Busy,

    /// No status transition observed within the poll budget. Latches the
    /// endpoint as failed; never retried by the engine.
    #[error("mailbox exchange timed out")]
    Timeout,

    /// The controller rejected the message id as unsupported by its
    /// protocol version.
    #[error("controller does not support this message")]
    InvalidCommand,

    /// The controller accepted the message but rejected the input or the
    /// operation itself.
    #[error("controller rejected the request")]
    RequestFailed,

    /// Any other terminal status word, preserved for diagnostics.
    #[error("controller returned unknown status {0:#x}")]
    UnknownFailure(u32),

    /// The underlying register transaction failed. Fatal to the current
    /// exchange.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Discovery could not build a consistent bus/socket/tile map. Fatal
    /// to startup.
    #[error(transparent)]
    Topology(#[from] TopologyError),
}
