// CLASSIFICATION: COMMUNITY
// Filename: topology.rs v0.8
// Author: Lukas Bower
// Date Modified: 2026-07-27

//! One-shot platform topology discovery.
//!
//! Each socket carries four I/O-hub tiles, and each tile owns a
//! contiguous, non-overlapping range of PCI bus numbers. Discovery
//! enumerates the PCI tree once, partitions the tile devices into
//! per-socket groups, computes the bus ranges, and asks each tile for its
//! own bus base through the register port to pin down which physical tile
//! (0..3) each range belongs to. The resulting table is immutable; a
//! partial table is never published.

use std::fs;
use std::path::PathBuf;

use log::{debug, info};
use thiserror::Error;

use crate::port::{AccessError, PciConfigPort, RegisterPort};

/// Vendor id of the platform's management-capable root devices.
pub const TILE_VENDOR: u16 = 0x1022;
/// Device id of a base I/O-hub tile; one per tile, four per socket.
pub const TILE_DEVICE: u16 = 0x1480;
/// Tiles per socket; the enumerated tile count must be a positive
/// multiple of this.
pub const TILES_PER_SOCKET: usize = 4;
/// Highest bus number in the observed space.
pub const MAX_BUS: u8 = 0xFF;

/// Internal and virtual functions that never own a client-visible bus;
/// their bus numbers are irrelevant to routing and are filtered out.
const FILTERED_DEVICES: &[u16] = &[
    0x1485, 0x148A, 0x1490, 0x1491, 0x1492, 0x1493, 0x1494, 0x1495, 0x1496,
    0x1497, 0x1498, 0x1499,
];

/// Control register holding a tile's own bus base, replicated per tile at
/// a fixed stride.
pub const TILE_BUS_BASE_REG: u32 = 0x13B1_0044;
/// Address stride between consecutive tiles' control registers.
pub const TILE_REG_STRIDE: u32 = 0x0010_0000;

/// One enumerated PCI function.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub vendor: u16,
    pub device: u16,
    pub bus: u8,
    /// Opaque handle a register port can be opened from.
    pub handle: PathBuf,
}

/// Discovery failure. Fatal to startup; the platform never comes up on a
/// partial topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("device enumeration failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no management-capable devices found")]
    NoDevices,
    #[error("found {0} io-hub tiles, expected a multiple of {TILES_PER_SOCKET}")]
    TileCount(usize),
    #[error("io-hub tiles share bus base {0:#x}")]
    OverlappingRanges(u8),
    #[error("tile reported bus base {0:#x} outside every computed range")]
    UnmatchedTile(u8),
    #[error("tile at bus {0:#x} resolved to the wrong socket")]
    SocketMismatch(u8),
    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Enumeration plus port construction, abstracted so discovery can run
/// against scripted hardware in tests.
pub trait PlatformBackend: Send + Sync {
    /// Enumerate every PCI function on the platform.
    fn enumerate(&self) -> Result<Vec<DeviceRecord>, TopologyError>;
    /// Open a register port through the given device.
    fn open_port(&self, dev: &DeviceRecord) -> Result<Box<dyn RegisterPort>, AccessError>;
}

/// Production backend over the sysfs PCI tree.
pub struct SysfsPci {
    root: PathBuf,
}

impl SysfsPci {
    /// Backend rooted at the configured PCI device directory.
    pub fn new() -> Self {
        let root = crate::config::get_config()
            .map(|c| c.pci_root)
            .unwrap_or_else(|_| PathBuf::from("/sys/bus/pci/devices"));
        Self { root }
    }
}

impl Default for SysfsPci {
    fn default() -> Self {
        Self::new()
    }
}

fn read_hex_attr(dir: &std::path::Path, name: &str) -> Result<u16, std::io::Error> {
    let text = fs::read_to_string(dir.join(name))?;
    u16::from_str_radix(text.trim().trim_start_matches("0x"), 16)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl PlatformBackend for SysfsPci {
    fn enumerate(&self) -> Result<Vec<DeviceRecord>, TopologyError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // Addresses look like 0000:40:01.1; the bus is the second field.
            let Some(bus_text) = name.split(':').nth(1) else {
                continue;
            };
            let Ok(bus) = u8::from_str_radix(bus_text, 16) else {
                continue;
            };
            let dir = entry.path();
            let vendor = read_hex_attr(&dir, "vendor")?;
            let device = read_hex_attr(&dir, "device")?;
            records.push(DeviceRecord { vendor, device, bus, handle: dir });
        }
        Ok(records)
    }

    fn open_port(&self, dev: &DeviceRecord) -> Result<Box<dyn RegisterPort>, AccessError> {
        Ok(Box::new(PciConfigPort::open(&dev.handle)?))
    }
}

/// One I/O-hub tile and its resolved place in the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubUnit {
    /// Inclusive bus range owned by this tile.
    pub bus_base: u8,
    pub bus_limit: u8,
    /// Socket the tile sits on.
    pub socket_id: u16,
    /// Tile index within the socket, 0..3.
    pub local_id: u8,
}

/// Immutable routing table built once at startup.
#[derive(Debug, Clone)]
pub struct Topology {
    tiles: Vec<SubUnit>,
    visible_buses: Vec<u8>,
    num_sockets: u16,
}

impl Topology {
    pub fn num_sockets(&self) -> u16 {
        self.num_sockets
    }

    pub fn tiles(&self) -> &[SubUnit] {
        &self.tiles
    }

    /// Bus numbers that carry client-visible functions.
    pub fn visible_buses(&self) -> &[u8] {
        &self.visible_buses
    }

    /// Route a bus number to its owning (socket, tile). Buses below the
    /// lowest discovered base belong to no tile.
    pub fn route(&self, bus: u8) -> Option<(u16, u8)> {
        self.tiles
            .iter()
            .find(|t| t.bus_base <= bus && bus <= t.bus_limit)
            .map(|t| (t.socket_id, t.local_id))
    }
}

/// Everything discovery hands to platform construction: the routing table
/// and one open port per socket, through that socket's representative
/// device.
pub struct Discovery {
    pub topology: Topology,
    pub ports: Vec<Box<dyn RegisterPort>>,
}

struct TileSlot {
    bus_base: u8,
    bus_limit: u8,
    handle: PathBuf,
    local_id: Option<u8>,
}

/// Build the topology table. Runs once, before any endpoint accepts
/// traffic; any inconsistency fails the whole discovery.
pub fn discover(backend: &dyn PlatformBackend) -> Result<Discovery, TopologyError> {
    let records = backend.enumerate()?;
    if records.is_empty() {
        return Err(TopologyError::NoDevices);
    }

    let mut tiles: Vec<TileSlot> = Vec::new();
    let mut visible: Vec<u8> = Vec::new();
    for rec in &records {
        if rec.vendor == TILE_VENDOR && rec.device == TILE_DEVICE {
            tiles.push(TileSlot {
                bus_base: rec.bus,
                bus_limit: MAX_BUS,
                handle: rec.handle.clone(),
                local_id: None,
            });
        } else if !FILTERED_DEVICES.contains(&rec.device) {
            visible.push(rec.bus);
        }
    }
    visible.sort_unstable();
    visible.dedup();

    if tiles.is_empty() {
        return Err(TopologyError::NoDevices);
    }
    if tiles.len() % TILES_PER_SOCKET != 0 {
        return Err(TopologyError::TileCount(tiles.len()));
    }
    let num_sockets = tiles.len() / TILES_PER_SOCKET;

    tiles.sort_by_key(|t| t.bus_base);
    for i in 0..tiles.len() - 1 {
        if tiles[i].bus_base == tiles[i + 1].bus_base {
            // Ranges are non-overlapping by construction; a shared base
            // means the enumeration itself is suspect.
            return Err(TopologyError::OverlappingRanges(tiles[i].bus_base));
        }
        tiles[i].bus_limit = tiles[i + 1].bus_base - 1;
    }

    // Ask every tile for its own bus base and pin its physical index.
    let mut ports = Vec::with_capacity(num_sockets);
    for socket in 0..num_sockets {
        let rep = &tiles[socket * TILES_PER_SOCKET];
        let port = backend.open_port(&DeviceRecord {
            vendor: TILE_VENDOR,
            device: TILE_DEVICE,
            bus: rep.bus_base,
            handle: rep.handle.clone(),
        })?;
        for local in 0..TILES_PER_SOCKET {
            let raw = port.read(TILE_BUS_BASE_REG + local as u32 * TILE_REG_STRIDE)?;
            let reported = (raw & 0xFF) as u8;
            let idx = tiles
                .iter()
                .position(|t| t.bus_base <= reported && reported <= t.bus_limit)
                .ok_or(TopologyError::UnmatchedTile(reported))?;
            if idx / TILES_PER_SOCKET != socket || tiles[idx].local_id.is_some() {
                return Err(TopologyError::SocketMismatch(tiles[idx].bus_base));
            }
            tiles[idx].local_id = Some(local as u8);
            debug!(
                "socket {socket}: tile {local} owns buses {:#x}..={:#x}",
                tiles[idx].bus_base, tiles[idx].bus_limit
            );
        }
        ports.push(port);
    }

    let tiles: Vec<SubUnit> = tiles
        .iter()
        .enumerate()
        .map(|(i, t)| SubUnit {
            bus_base: t.bus_base,
            bus_limit: t.bus_limit,
            socket_id: (i / TILES_PER_SOCKET) as u16,
            // Every slot was filled above or discovery already failed.
            local_id: t.local_id.unwrap_or_default(),
        })
        .collect();

    info!(
        "discovered {} socket(s), {} io-hub tile(s), {} client bus(es)",
        num_sockets,
        tiles.len(),
        visible.len()
    );

    Ok(Discovery {
        topology: Topology {
            tiles,
            visible_buses: visible,
            num_sockets: num_sockets as u16,
        },
        ports,
    })
}
