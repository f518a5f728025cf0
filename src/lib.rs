// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.6
// Date Modified: 2026-07-29
// Author: Lukas Bower

//! Mailbox access to the per-socket platform management controller.
//!
//! Server CPUs expose power, clock, link and thermal management through a
//! narrow mailbox reached over PCI config space. This crate implements
//! the request/response protocol engine with per-endpoint serialization
//! and sticky-failure handling, the one-shot topology discovery that maps
//! bus numbers to (socket, io-hub tile), and thin typed façades on top.

/// Indirect register access through the index/data pair.
pub mod port;

/// Mailbox request/response state machine.
pub mod mbox;

/// Per-socket endpoint serialization and health.
pub mod endpoint;

/// One-shot platform topology discovery and routing.
pub mod topology;

/// Message catalog, capability gate, and packed-field transforms.
pub mod msg;

/// Constructed-once platform context and dispatch.
pub mod platform;

/// Caller-facing error taxonomy.
pub mod error;

/// Runtime configuration knobs.
pub mod config;

/// Typed scalar accessors.
pub mod metrics;

/// Power sensor channels.
pub mod sensor;

pub use endpoint::{Endpoint, Health};
pub use error::SmpError;
pub use mbox::{Generation, PollPolicy};
pub use msg::{AccessMode, Message, MsgId};
pub use platform::Platform;
pub use port::{AccessError, RegisterPort};
pub use topology::{SubUnit, Topology, TopologyError};

/// Bring up the platform over the live PCI tree with default-generation
/// mailbox placement.
pub fn probe() -> Result<Platform, SmpError> {
    Platform::probe_system(Generation::default())
}
