// CLASSIFICATION: COMMUNITY
// Filename: metrics.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-07-29

//! Typed scalar accessors over the generic dispatch path.
//!
//! Each accessor pairs one catalog message with its transform; none of
//! them talk to the engine directly. Socket indices are bounds-checked
//! fail-closed before a message is built.

use crate::error::SmpError;
use crate::msg::{self, AccessMode, DdrBandwidth, Message, MsgId};
use crate::platform::Platform;

fn check_socket(p: &Platform, socket: u16) -> Result<(), SmpError> {
    if socket >= p.num_sockets() {
        return Err(SmpError::NoSuchEndpoint(socket));
    }
    Ok(())
}

fn get(p: &Platform, id: MsgId, socket: u16) -> Result<u32, SmpError> {
    check_socket(p, socket)?;
    let mut msg = Message::new(id, socket);
    p.send(&mut msg, AccessMode::READ)?;
    Ok(msg.response[0])
}

fn get_with_arg(p: &Platform, id: MsgId, socket: u16, arg: u32) -> Result<u32, SmpError> {
    check_socket(p, socket)?;
    let mut msg = Message::with_arg(id, socket, arg);
    p.send(&mut msg, AccessMode::READ)?;
    Ok(msg.response[0])
}

fn set(p: &Platform, id: MsgId, socket: u16, arg: u32) -> Result<(), SmpError> {
    check_socket(p, socket)?;
    let mut msg = Message::with_arg(id, socket, arg);
    p.send(&mut msg, AccessMode::WRITE)
}

/// Controller firmware version word.
pub fn firmware_version(p: &Platform, socket: u16) -> Result<u32, SmpError> {
    get(p, MsgId::FirmwareVersion, socket)
}

/// Current socket power draw, milliwatts.
pub fn socket_power(p: &Platform, socket: u16) -> Result<u32, SmpError> {
    get(p, MsgId::SocketPower, socket)
}

/// Current socket power limit, milliwatts.
pub fn socket_power_limit(p: &Platform, socket: u16) -> Result<u32, SmpError> {
    get(p, MsgId::SocketPowerLimit, socket)
}

/// Highest settable socket power limit, milliwatts.
pub fn socket_power_limit_max(p: &Platform, socket: u16) -> Result<u32, SmpError> {
    get(p, MsgId::SocketPowerLimitMax, socket)
}

/// Set the socket power limit, milliwatts.
pub fn set_socket_power_limit(p: &Platform, socket: u16, mw: u32) -> Result<(), SmpError> {
    set(p, MsgId::SetSocketPowerLimit, socket, mw)
}

/// Boost limit of one core, MHz. The core is named by its APIC id.
pub fn core_boost_limit(p: &Platform, socket: u16, apic_id: u16) -> Result<u32, SmpError> {
    get_with_arg(p, MsgId::CoreBoostLimit, socket, u32::from(apic_id))
}

/// Set one core's boost limit, MHz.
pub fn set_core_boost_limit(
    p: &Platform,
    socket: u16,
    apic_id: u16,
    mhz: u16,
) -> Result<(), SmpError> {
    set(p, MsgId::SetCoreBoostLimit, socket, msg::encode_core_boost(apic_id, mhz))
}

/// Set the boost limit for every core on a socket, MHz.
pub fn set_socket_boost_limit(p: &Platform, socket: u16, mhz: u16) -> Result<(), SmpError> {
    set(p, MsgId::SetSocketBoostLimit, socket, u32::from(mhz))
}

/// Whether the socket is currently PROCHOT-asserted.
pub fn proc_hot(p: &Platform, socket: u16) -> Result<bool, SmpError> {
    get(p, MsgId::ProcHot, socket).map(msg::decode_proc_hot)
}

/// Constrain the socket link width to a [min, max] range. Width codes
/// run 0..=2; requires controller protocol version 2.
pub fn set_link_width(p: &Platform, socket: u16, min: u8, max: u8) -> Result<(), SmpError> {
    if min > max || max > 2 {
        return Err(SmpError::InvalidInput("link width range out of bounds"));
    }
    set(p, MsgId::SetLinkWidth, socket, msg::encode_link_width(min, max))
}

/// Pin the fabric P-state, 0..=3.
pub fn set_fabric_pstate(p: &Platform, socket: u16, pstate: u8) -> Result<(), SmpError> {
    if pstate > 3 {
        return Err(SmpError::InvalidInput("fabric p-state out of range"));
    }
    set(p, MsgId::SetFabricPstate, socket, u32::from(pstate))
}

/// Return fabric P-state selection to automatic.
pub fn auto_fabric_pstate(p: &Platform, socket: u16) -> Result<(), SmpError> {
    check_socket(p, socket)?;
    let mut msg = Message::new(MsgId::AutoFabricPstate, socket);
    p.send(&mut msg, AccessMode::WRITE)
}

/// Current fabric and memory clocks, MHz.
pub fn fabric_mem_clocks(p: &Platform, socket: u16) -> Result<(u32, u32), SmpError> {
    check_socket(p, socket)?;
    let mut msg = Message::new(MsgId::FabricMemClocks, socket);
    p.send(&mut msg, AccessMode::READ)?;
    Ok((msg.response[0], msg.response[1]))
}

/// Core clock limit currently imposed by throttling, MHz.
pub fn core_clock_throttle_limit(p: &Platform, socket: u16) -> Result<u32, SmpError> {
    get(p, MsgId::CoreClockThrottleLimit, socket)
}

/// Average C0 residency over all cores on the socket, percent.
pub fn c0_residency(p: &Platform, socket: u16) -> Result<u32, SmpError> {
    get(p, MsgId::C0Residency, socket)
}

/// DDR bandwidth snapshot. Requires controller protocol version 3.
pub fn ddr_bandwidth(p: &Platform, socket: u16) -> Result<DdrBandwidth, SmpError> {
    get(p, MsgId::DdrBandwidth, socket).map(msg::decode_ddr_bandwidth)
}

/// Socket temperature, millidegrees Celsius. Requires controller
/// protocol version 4.
pub fn temp_monitor(p: &Platform, socket: u16) -> Result<u32, SmpError> {
    get(p, MsgId::TempMonitor, socket).map(msg::decode_temp_monitor)
}
