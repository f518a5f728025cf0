// CLASSIFICATION: COMMUNITY
// Filename: port.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-07-14

//! Indirect register access to the management controller.
//!
//! The controller's register space is not memory mapped. Software posts
//! the target register address to an index register in the root device's
//! PCI configuration space, then moves the value through the adjacent
//! data register. Both transactions must succeed; there is no
//! partial-success state.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use thiserror::Error;

/// Config-space offset of the index register on the root device.
pub const CFG_INDEX_REG: u64 = 0xC4;
/// Config-space offset of the data register on the root device.
pub const CFG_DATA_REG: u64 = 0xC8;

/// Failure of a physical config-space transaction. Always fatal to the
/// exchange in progress; never retried inline.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("config space i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("management device unreachable")]
    Unreachable,
}

/// One endpoint's window into the controller register space.
///
/// A port is bound to a single socket's root device. Exclusive use during
/// an exchange is the caller's responsibility; the port itself is
/// stateless.
pub trait RegisterPort: Send + Sync {
    /// Write a 32-bit value to a controller register address.
    fn write(&self, addr: u32, value: u32) -> Result<(), AccessError>;
    /// Read a 32-bit value from a controller register address.
    fn read(&self, addr: u32) -> Result<u32, AccessError>;
}

/// Production port over a PCI device's sysfs `config` node.
pub struct PciConfigPort {
    cfg: File,
}

impl PciConfigPort {
    /// Open the config space of the device rooted at `device_dir`.
    pub fn open(device_dir: &Path) -> Result<Self, AccessError> {
        let cfg = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device_dir.join("config"))?;
        Ok(Self { cfg })
    }
}

impl RegisterPort for PciConfigPort {
    fn write(&self, addr: u32, value: u32) -> Result<(), AccessError> {
        self.cfg.write_all_at(&addr.to_le_bytes(), CFG_INDEX_REG)?;
        self.cfg.write_all_at(&value.to_le_bytes(), CFG_DATA_REG)?;
        Ok(())
    }

    fn read(&self, addr: u32) -> Result<u32, AccessError> {
        self.cfg.write_all_at(&addr.to_le_bytes(), CFG_INDEX_REG)?;
        let mut word = [0u8; 4];
        self.cfg.read_exact_at(&mut word, CFG_DATA_REG)?;
        Ok(u32::from_le_bytes(word))
    }
}
