// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-07-02

use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::RwLock;
use thiserror::Error;

/// Runtime configurable management-port paths and budgets.
#[derive(Clone)]
pub struct PortConfig {
    /// Root of the PCI device tree used for enumeration.
    pub pci_root: PathBuf,
    /// Override for the mailbox poll budget, in milliseconds. `None`
    /// keeps the per-generation default.
    pub poll_budget_ms: Option<u64>,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            pci_root: std::env::var("SMPORT_PCI_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/sys/bus/pci/devices")),
            poll_budget_ms: std::env::var("SMPORT_POLL_BUDGET_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

static CONFIG: Lazy<RwLock<PortConfig>> = Lazy::new(|| RwLock::new(PortConfig::default()));

/// Errors produced by config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("port config lock poisoned")]
    LockPoisoned,
}

/// Replace the global port configuration.
pub fn set_config(cfg: PortConfig) -> Result<(), ConfigError> {
    let mut guard = CONFIG.write().map_err(|_| ConfigError::LockPoisoned)?;
    *guard = cfg;
    Ok(())
}

/// Get a clone of the current configuration.
pub fn get_config() -> Result<PortConfig, ConfigError> {
    CONFIG
        .read()
        .map_err(|_| ConfigError::LockPoisoned)
        .map(|g| g.clone())
}
