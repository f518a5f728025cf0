// CLASSIFICATION: COMMUNITY
// Filename: msg.rs v0.7
// Author: Lukas Bower
// Date Modified: 2026-07-21

//! Message catalog and capability gate for the management port.
//!
//! Every message the controller understands is described once in a static
//! table: its required argument and response word counts, whether it
//! monitors or configures, and the minimum protocol version that makes it
//! legal. Requests are validated against the table before any register
//! access happens. Packed response words are decoded by small pure
//! transforms kept next to the table rather than by per-message wrappers.

use std::collections::HashMap;

use bitflags::bitflags;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::SmpError;

/// Fixed capacity of the argument and response buffers, in 32-bit words.
pub const MAX_MSG_WORDS: usize = 8;

/// Message identifiers accepted by the controller. Id 19 is reserved and
/// carries no descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MsgId {
    /// Conformance check: one argument, response is argument plus one.
    Test = 1,
    FirmwareVersion = 2,
    ProtocolVersion = 3,
    SocketPower = 4,
    SetSocketPowerLimit = 5,
    SocketPowerLimit = 6,
    SocketPowerLimitMax = 7,
    SetCoreBoostLimit = 8,
    SetSocketBoostLimit = 9,
    CoreBoostLimit = 10,
    ProcHot = 11,
    SetLinkWidth = 12,
    SetFabricPstate = 13,
    AutoFabricPstate = 14,
    FabricMemClocks = 15,
    CoreClockThrottleLimit = 16,
    C0Residency = 17,
    SetIoPstate = 18,
    DdrBandwidth = 20,
    TempMonitor = 21,
}

/// Exclusive upper bound of the message id space.
pub const MSG_ID_MAX: u32 = 22;

impl MsgId {
    /// Map a raw identifier to a known message, if any.
    pub fn from_raw(raw: u32) -> Option<Self> {
        DESCRIPTORS.get(&raw).map(|d| d.id)
    }

    pub fn raw(self) -> u32 {
        self as u32
    }
}

/// Whether a message monitors state or configures it. Every message id
/// belongs to exactly one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Get,
    Set,
}

bitflags! {
    /// Access mode of the channel a request arrives on. A `Get` message
    /// needs READ, a `Set` message needs WRITE.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessMode: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
    }
}

impl Direction {
    fn permitted(self, mode: AccessMode) -> bool {
        match self {
            Direction::Get => mode.contains(AccessMode::READ),
            Direction::Set => mode.contains(AccessMode::WRITE),
        }
    }
}

/// Static catalog entry for one message id.
#[derive(Debug, Clone, Copy)]
pub struct MsgDescriptor {
    pub id: MsgId,
    pub num_args: u16,
    pub response_sz: u16,
    pub direction: Direction,
    /// Minimum controller protocol version that legalizes this message.
    pub min_proto: u32,
}

const fn desc(
    id: MsgId,
    num_args: u16,
    response_sz: u16,
    direction: Direction,
    min_proto: u32,
) -> MsgDescriptor {
    MsgDescriptor { id, num_args, response_sz, direction, min_proto }
}

static DESCRIPTOR_LIST: &[MsgDescriptor] = &[
    desc(MsgId::Test, 1, 1, Direction::Get, 1),
    desc(MsgId::FirmwareVersion, 0, 1, Direction::Get, 1),
    desc(MsgId::ProtocolVersion, 0, 1, Direction::Get, 1),
    desc(MsgId::SocketPower, 0, 1, Direction::Get, 1),
    desc(MsgId::SetSocketPowerLimit, 1, 0, Direction::Set, 1),
    desc(MsgId::SocketPowerLimit, 0, 1, Direction::Get, 1),
    desc(MsgId::SocketPowerLimitMax, 0, 1, Direction::Get, 1),
    desc(MsgId::SetCoreBoostLimit, 1, 0, Direction::Set, 1),
    desc(MsgId::SetSocketBoostLimit, 1, 0, Direction::Set, 1),
    desc(MsgId::CoreBoostLimit, 1, 1, Direction::Get, 1),
    desc(MsgId::ProcHot, 0, 1, Direction::Get, 1),
    // Link-width control arrived with protocol version 2.
    desc(MsgId::SetLinkWidth, 1, 0, Direction::Set, 2),
    desc(MsgId::SetFabricPstate, 1, 0, Direction::Set, 1),
    desc(MsgId::AutoFabricPstate, 0, 0, Direction::Set, 1),
    desc(MsgId::FabricMemClocks, 0, 2, Direction::Get, 1),
    desc(MsgId::CoreClockThrottleLimit, 0, 1, Direction::Get, 1),
    desc(MsgId::C0Residency, 0, 1, Direction::Get, 1),
    desc(MsgId::SetIoPstate, 1, 0, Direction::Set, 1),
    // Bandwidth query arrived with protocol version 3, the thermal
    // monitor with version 4.
    desc(MsgId::DdrBandwidth, 0, 1, Direction::Get, 3),
    desc(MsgId::TempMonitor, 0, 1, Direction::Get, 4),
];

static DESCRIPTORS: Lazy<HashMap<u32, MsgDescriptor>> = Lazy::new(|| {
    DESCRIPTOR_LIST.iter().map(|d| (d.id.raw(), *d)).collect()
});

/// Look up the descriptor for a raw message id.
pub fn descriptor(raw: u32) -> Option<&'static MsgDescriptor> {
    DESCRIPTORS.get(&raw)
}

/// The unit of exchange with the controller. Fixed layout shared across
/// the request/response boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Raw message identifier, 1..[`MSG_ID_MAX`] exclusive.
    pub msg_id: u32,
    /// Number of leading argument words actually used.
    pub num_args: u16,
    /// Number of response words expected on success.
    pub response_sz: u16,
    /// Argument words; unused slots must be zero.
    pub args: [u32; MAX_MSG_WORDS],
    /// Response words, populated only on success.
    pub response: [u32; MAX_MSG_WORDS],
    /// Target socket index.
    pub socket_id: u16,
}

impl Message {
    /// Build a message for `id` against `socket` with the catalog's
    /// required word counts and zeroed buffers.
    pub fn new(id: MsgId, socket: u16) -> Self {
        // The id came from the enum, so the descriptor always exists.
        let d = &DESCRIPTORS[&id.raw()];
        Self {
            msg_id: id.raw(),
            num_args: d.num_args,
            response_sz: d.response_sz,
            args: [0; MAX_MSG_WORDS],
            response: [0; MAX_MSG_WORDS],
            socket_id: socket,
        }
    }

    /// Same as [`Message::new`] with the first argument word filled in.
    pub fn with_arg(id: MsgId, socket: u16, arg: u32) -> Self {
        let mut msg = Self::new(id, socket);
        msg.args[0] = arg;
        msg
    }
}

/// Validate a request against the catalog before dispatch.
///
/// Checks, in order: buffer capacity, id range, catalog membership,
/// required word counts, channel access mode, and protocol version. The
/// first failing check wins; nothing has touched hardware yet.
pub fn validate(
    msg: &Message,
    mode: AccessMode,
    proto_ver: u32,
) -> Result<&'static MsgDescriptor, SmpError> {
    if msg.num_args as usize > MAX_MSG_WORDS || msg.response_sz as usize > MAX_MSG_WORDS {
        return Err(SmpError::InvalidInput("word count exceeds buffer capacity"));
    }
    if msg.msg_id == 0 || msg.msg_id >= MSG_ID_MAX {
        return Err(SmpError::InvalidInput("message id out of range"));
    }
    let d = descriptor(msg.msg_id)
        .ok_or(SmpError::InvalidInput("message id is reserved"))?;
    if msg.num_args != d.num_args || msg.response_sz != d.response_sz {
        return Err(SmpError::InvalidInput("word counts do not match message"));
    }
    if !d.direction.permitted(mode) {
        return Err(SmpError::InvalidInput("access mode does not permit this message"));
    }
    if proto_ver < d.min_proto {
        return Err(SmpError::InvalidCommand);
    }
    Ok(d)
}

/// Pack a per-core boost limit: APIC id in the high half, limit in MHz in
/// the low half.
pub fn encode_core_boost(apic_id: u16, limit_mhz: u16) -> u32 {
    (u32::from(apic_id) << 16) | u32::from(limit_mhz)
}

/// Pack a link width range: minimum in bits 15:8, maximum in bits 7:0.
pub fn encode_link_width(min: u8, max: u8) -> u32 {
    (u32::from(min) << 8) | u32::from(max)
}

/// Pack an I/O P-state request: tile index in bits 23:16, level in 7:0.
pub fn encode_io_pstate(tile: u8, level: u8) -> u32 {
    (u32::from(tile) << 16) | u32::from(level)
}

/// Decoded DDR bandwidth response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DdrBandwidth {
    /// Theoretical maximum, GB/s.
    pub max_gbps: u32,
    /// Current utilization, GB/s.
    pub utilized_gbps: u32,
    /// Current utilization as a percentage of the maximum.
    pub utilized_pct: u32,
}

/// Split the packed bandwidth word: maximum in bits 31:20, utilized
/// bandwidth in 19:8, percentage in 6:0.
pub fn decode_ddr_bandwidth(raw: u32) -> DdrBandwidth {
    DdrBandwidth {
        max_gbps: raw >> 20,
        utilized_gbps: (raw >> 8) & 0xFFF,
        utilized_pct: raw & 0x7F,
    }
}

/// Decode the fixed-point thermal monitor word into millidegrees
/// Celsius: whole degrees in bits 15:8, eighths of a degree in 7:5.
pub fn decode_temp_monitor(raw: u32) -> u32 {
    let whole = (raw >> 8) & 0xFF;
    let eighths = (raw >> 5) & 0x7;
    whole * 1000 + eighths * 125
}

/// The PROCHOT status word carries the assertion flag in bit 0.
pub fn decode_proc_hot(raw: u32) -> bool {
    raw & 1 != 0
}
