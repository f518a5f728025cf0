// CLASSIFICATION: COMMUNITY
// Filename: common/mod.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-08-02

//! Scripted controller and backend shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::ThreadId;
use std::time::Duration;

use smport::mbox::{MailboxLayout, PollPolicy, MBOX_BASE, MBOX_DATA_OFF, MBOX_MSG_ID_OFF, MBOX_STATUS_OFF};
use smport::topology::{DeviceRecord, PlatformBackend, TopologyError, TILE_BUS_BASE_REG, TILE_DEVICE, TILE_REG_STRIDE, TILE_VENDOR};
use smport::{AccessError, RegisterPort};

pub const STATUS_NOT_READY: u32 = 0x00;
pub const STATUS_OK: u32 = 0x01;
pub const STATUS_INVALID_MSG: u32 = 0xFE;
pub const STATUS_INVALID_INPUT: u32 = 0xFF;

/// One recorded register access, tagged with the issuing thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    WriteStatus,
    WriteArg(usize),
    WriteId,
    ReadStatus,
    ReadData(usize),
    ReadTileReg(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct Op {
    pub thread: ThreadId,
    pub kind: OpKind,
}

#[derive(Debug)]
struct SmuState {
    data: [u32; 8],
    ready_status: u32,
    polls_left: u32,
    last_msg_id: u32,
    power_cap_mw: u32,
    boost_mhz: u32,
}

/// Scripted management controller behind one socket's mailbox.
pub struct FakeSmu {
    state: Mutex<SmuState>,
    ops: Mutex<Vec<Op>>,
    /// Status reads before the terminal status becomes visible.
    pub respond_after_polls: u32,
    /// Never leave the not-ready sentinel.
    pub wedged: Mutex<bool>,
    /// Milliseconds to stall inside every status read.
    pub stall_status_ms: u64,
    /// Value added to the self-test argument; a conforming controller
    /// adds one.
    pub test_increment: u32,
    /// Protocol version the controller reports.
    pub proto_ver: u32,
    /// Reported bus base per physical tile index.
    pub tile_bases: [u8; 4],
    /// Terminal status override for every message.
    pub force_status: Option<u32>,
}

impl FakeSmu {
    pub fn new(tile_bases: [u8; 4]) -> Self {
        Self {
            state: Mutex::new(SmuState {
                data: [0; 8],
                ready_status: STATUS_OK,
                polls_left: 0,
                last_msg_id: 0,
                power_cap_mw: 200_000,
                boost_mhz: 3400,
            }),
            ops: Mutex::new(Vec::new()),
            respond_after_polls: 0,
            wedged: Mutex::new(false),
            stall_status_ms: 0,
            test_increment: 1,
            proto_ver: 5,
            tile_bases,
            force_status: None,
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn op_count(&self) -> usize {
        self.ops.lock().unwrap().len()
    }

    pub fn set_wedged(&self, wedged: bool) {
        *self.wedged.lock().unwrap() = wedged;
    }

    pub fn last_msg_id(&self) -> u32 {
        self.state.lock().unwrap().last_msg_id
    }

    pub fn last_arg(&self) -> u32 {
        // Set messages leave their argument in data[0]; the fake does not
        // overwrite it unless the message produces a response.
        self.state.lock().unwrap().data[0]
    }

    fn record(&self, kind: OpKind) {
        self.ops.lock().unwrap().push(Op { thread: std::thread::current().id(), kind });
    }

    fn execute(&self, state: &mut MutexGuard<'_, SmuState>, msg_id: u32) {
        state.last_msg_id = msg_id;
        state.polls_left = self.respond_after_polls;
        if let Some(status) = self.force_status {
            state.ready_status = status;
            return;
        }
        let arg = state.data[0];
        state.ready_status = STATUS_OK;
        match msg_id {
            1 => state.data[0] = arg.wrapping_add(self.test_increment),
            2 => state.data[0] = 0x0045_0012,
            3 => state.data[0] = self.proto_ver,
            4 => state.data[0] = 125_000,
            5 => state.power_cap_mw = arg,
            6 => state.data[0] = state.power_cap_mw,
            7 => state.data[0] = 240_000,
            8 | 9 => state.boost_mhz = arg & 0xFFFF,
            10 => state.data[0] = state.boost_mhz,
            11 => state.data[0] = 0,
            12 | 13 | 14 | 18 => {}
            15 => {
                state.data[0] = 1467;
                state.data[1] = 1333;
            }
            16 => state.data[0] = 3000,
            17 => state.data[0] = 87,
            20 => state.data[0] = (25 << 20) | (13 << 8) | 52,
            21 => state.data[0] = (67 << 8) | (3 << 5),
            _ => state.ready_status = STATUS_INVALID_MSG,
        }
    }
}

const STATUS_ADDR: u32 = MBOX_BASE + MBOX_STATUS_OFF;
const MSG_ID_ADDR: u32 = MBOX_BASE + MBOX_MSG_ID_OFF;
const DATA_ADDR: u32 = MBOX_BASE + MBOX_DATA_OFF;

/// Port view of a [`FakeSmu`].
pub struct SmuPort(pub Arc<FakeSmu>);

impl RegisterPort for SmuPort {
    fn write(&self, addr: u32, value: u32) -> Result<(), AccessError> {
        let smu = &self.0;
        let mut state = smu.state.lock().unwrap();
        if addr == STATUS_ADDR {
            smu.record(OpKind::WriteStatus);
            state.ready_status = value;
            state.polls_left = 0;
        } else if addr == MSG_ID_ADDR {
            smu.record(OpKind::WriteId);
            smu.execute(&mut state, value);
        } else if addr >= DATA_ADDR && addr < DATA_ADDR + 32 {
            let slot = ((addr - DATA_ADDR) / 4) as usize;
            smu.record(OpKind::WriteArg(slot));
            state.data[slot] = value;
        } else {
            return Err(AccessError::Unreachable);
        }
        Ok(())
    }

    fn read(&self, addr: u32) -> Result<u32, AccessError> {
        let smu = &self.0;
        let mut state = smu.state.lock().unwrap();
        if addr == STATUS_ADDR {
            smu.record(OpKind::ReadStatus);
            if smu.stall_status_ms > 0 {
                std::thread::sleep(Duration::from_millis(smu.stall_status_ms));
            }
            if *smu.wedged.lock().unwrap() {
                return Ok(STATUS_NOT_READY);
            }
            if state.polls_left > 0 {
                state.polls_left -= 1;
                return Ok(STATUS_NOT_READY);
            }
            Ok(state.ready_status)
        } else if addr >= DATA_ADDR && addr < DATA_ADDR + 32 {
            let slot = ((addr - DATA_ADDR) / 4) as usize;
            smu.record(OpKind::ReadData(slot));
            Ok(state.data[slot])
        } else if let Some(tile) = addr
            .checked_sub(TILE_BUS_BASE_REG)
            .filter(|off| off % TILE_REG_STRIDE == 0)
            .map(|off| (off / TILE_REG_STRIDE) as usize)
            .filter(|tile| *tile < 4)
        {
            smu.record(OpKind::ReadTileReg(tile));
            Ok(u32::from(smu.tile_bases[tile]))
        } else {
            Err(AccessError::Unreachable)
        }
    }
}

/// Backend over a fixed device list and one scripted controller per
/// socket. Tile device handles carry the socket index.
pub struct FakeBackend {
    pub devices: Vec<DeviceRecord>,
    pub smus: Vec<Arc<FakeSmu>>,
}

impl PlatformBackend for FakeBackend {
    fn enumerate(&self) -> Result<Vec<DeviceRecord>, TopologyError> {
        Ok(self.devices.clone())
    }

    fn open_port(&self, dev: &DeviceRecord) -> Result<Box<dyn RegisterPort>, AccessError> {
        let name = dev.handle.to_string_lossy();
        let socket: usize = name
            .strip_prefix("smu/")
            .and_then(|s| s.parse().ok())
            .ok_or(AccessError::Unreachable)?;
        Ok(Box::new(SmuPort(self.smus[socket].clone())))
    }
}

pub fn tile_record(bus: u8, socket: usize) -> DeviceRecord {
    DeviceRecord {
        vendor: TILE_VENDOR,
        device: TILE_DEVICE,
        bus,
        handle: PathBuf::from(format!("smu/{socket}")),
    }
}

pub fn plain_record(vendor: u16, device: u16, bus: u8) -> DeviceRecord {
    DeviceRecord { vendor, device, bus, handle: PathBuf::from("dev") }
}

/// The standard eight-tile, two-socket device list plus client-visible
/// and filtered functions.
pub fn eight_tile_devices() -> Vec<DeviceRecord> {
    vec![
        tile_record(0x00, 0),
        tile_record(0x20, 0),
        tile_record(0x40, 0),
        tile_record(0x60, 0),
        tile_record(0x80, 1),
        tile_record(0xA0, 1),
        tile_record(0xC0, 1),
        tile_record(0xE0, 1),
        // Client-visible endpoints behind the tiles.
        plain_record(0x8086, 0x0953, 0x21),
        plain_record(0x15B3, 0x1017, 0x81),
        // Internal functions filtered out of the client bus list.
        plain_record(0x1022, 0x1490, 0x05),
        plain_record(0x1022, 0x1485, 0x41),
    ]
}

pub fn backend_with_smus(smu0: FakeSmu, smu1: FakeSmu) -> FakeBackend {
    FakeBackend {
        devices: eight_tile_devices(),
        smus: vec![Arc::new(smu0), Arc::new(smu1)],
    }
}

/// Two sockets, eight tiles. Socket 0's physical tile order is a
/// permutation of its bus order; socket 1's is the identity.
pub fn two_socket_backend() -> FakeBackend {
    backend_with_smus(
        FakeSmu::new([0x25, 0x60, 0x00, 0x40]),
        FakeSmu::new([0x80, 0xA0, 0xC0, 0xE0]),
    )
}

/// Fast policy so timeout paths finish in milliseconds.
pub fn fast_policy() -> PollPolicy {
    PollPolicy {
        short_window: Duration::from_millis(1),
        short_interval: Duration::from_micros(10),
        long_interval: Duration::from_micros(200),
        budget: Duration::from_millis(8),
    }
}

pub fn gen1_layout() -> MailboxLayout {
    MailboxLayout::for_generation(smport::Generation::Gen1)
}

/// Assert that the recorded mailbox accesses form whole, non-interleaved
/// exchanges of the self-test shape (one argument, one response word).
pub fn assert_serialized(ops: &[Op]) {
    let mut i = 0;
    while i < ops.len() {
        assert_eq!(ops[i].kind, OpKind::WriteStatus, "exchange must open with a status clear");
        let owner = ops[i].thread;
        i += 1;
        assert_eq!(ops[i].kind, OpKind::WriteArg(0));
        assert_eq!(ops[i].thread, owner, "argument write interleaved");
        i += 1;
        assert_eq!(ops[i].kind, OpKind::WriteId);
        assert_eq!(ops[i].thread, owner, "trigger write interleaved");
        i += 1;
        assert_eq!(ops[i].kind, OpKind::ReadStatus);
        assert_eq!(ops[i].thread, owner, "status poll interleaved");
        i += 1;
        while i < ops.len() && ops[i].kind == OpKind::ReadStatus {
            assert_eq!(ops[i].thread, owner, "status poll interleaved");
            i += 1;
        }
        assert_eq!(ops[i].kind, OpKind::ReadData(0));
        assert_eq!(ops[i].thread, owner, "response drain interleaved");
        i += 1;
    }
}
