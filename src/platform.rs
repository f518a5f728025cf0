// CLASSIFICATION: COMMUNITY
// Filename: platform.rs v0.6
// Author: Lukas Bower
// Date Modified: 2026-07-27

//! Constructed-once platform context and request dispatch.
//!
//! `Platform` owns one endpoint per socket plus the topology table, and is
//! passed explicitly to every operation. Startup is fail-fast and ordered:
//! discovery, endpoint construction, per-endpoint self-test, protocol
//! version cache. Nothing caller-facing exists on a platform that did not
//! finish that sequence.

use log::info;

use crate::endpoint::Endpoint;
use crate::error::SmpError;
use crate::mbox::{Generation, MailboxLayout, PollPolicy};
use crate::msg::{self, AccessMode, Message, MsgId};
use crate::topology::{self, PlatformBackend, Topology};

/// The management-port context for one running system.
pub struct Platform {
    endpoints: Vec<Endpoint>,
    topology: Topology,
    proto_ver: u32,
}

impl Platform {
    /// Bring up the platform: discover topology, build and self-test
    /// every endpoint, and cache the controller protocol version. Any
    /// failure aborts the whole bring-up.
    pub fn probe(backend: &dyn PlatformBackend, gen: Generation) -> Result<Self, SmpError> {
        let discovery = topology::discover(backend)?;
        let layout = MailboxLayout::for_generation(gen);
        let policy = PollPolicy::for_generation(gen);

        let endpoints: Vec<Endpoint> = discovery
            .ports
            .into_iter()
            .enumerate()
            .map(|(i, port)| Endpoint::new(i as u16, port, layout, policy.clone()))
            .collect();

        for ep in &endpoints {
            ep.self_test()?;
        }

        // One protocol version governs the whole platform; read it
        // through socket 0 once the self-tests have passed.
        let mut ver = Message::new(MsgId::ProtocolVersion, 0);
        endpoints[0].send(&mut ver)?;
        let proto_ver = ver.response[0];

        info!(
            "management port ready: {} socket(s), protocol version {}",
            endpoints.len(),
            proto_ver
        );

        Ok(Self { endpoints, topology: discovery.topology, proto_ver })
    }

    /// Platform over the live sysfs PCI tree.
    pub fn probe_system(gen: Generation) -> Result<Self, SmpError> {
        Platform::probe(&topology::SysfsPci::new(), gen)
    }

    pub fn num_sockets(&self) -> u16 {
        self.endpoints.len() as u16
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn protocol_version(&self) -> u32 {
        self.proto_ver
    }

    pub fn endpoint(&self, socket: u16) -> Result<&Endpoint, SmpError> {
        self.endpoints
            .get(socket as usize)
            .ok_or(SmpError::NoSuchEndpoint(socket))
    }

    /// Validate and dispatch one exchange record. This is the single
    /// entry point behind every façade: capability-gate validation,
    /// endpoint lookup, serialized exchange.
    pub fn send(&self, msg: &mut Message, mode: AccessMode) -> Result<(), SmpError> {
        msg::validate(msg, mode, self.proto_ver)?;
        self.endpoint(msg.socket_id)?.send(msg)
    }

    /// Dispatch a bus-scoped I/O P-state request: the bus number is routed
    /// through the topology table and the owning tile index is packed into
    /// the argument word.
    pub fn set_io_pstate(&self, bus: u8, level: u8) -> Result<(), SmpError> {
        if level > 3 {
            return Err(SmpError::InvalidInput("io p-state level out of range"));
        }
        let (socket, tile) = self
            .topology
            .route(bus)
            .ok_or(SmpError::InvalidInput("bus is not owned by any io-hub tile"))?;
        let mut msg =
            Message::with_arg(MsgId::SetIoPstate, socket, msg::encode_io_pstate(tile, level));
        self.send(&mut msg, AccessMode::WRITE)
    }
}
