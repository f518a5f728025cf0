// CLASSIFICATION: COMMUNITY
// Filename: sensor.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-07-29

//! Power sensor channels for one socket.
//!
//! The controller accounts power in milliwatts; sensor consumers expect
//! microwatts. This façade converts at the boundary and nothing else.

use crate::error::SmpError;
use crate::metrics;
use crate::platform::Platform;

const UW_PER_MW: u64 = 1000;

/// Sensor view of one socket's power channels.
pub struct PowerSensor<'a> {
    platform: &'a Platform,
    socket: u16,
}

impl<'a> PowerSensor<'a> {
    pub fn new(platform: &'a Platform, socket: u16) -> Self {
        Self { platform, socket }
    }

    /// Instantaneous power draw, microwatts.
    pub fn input_uw(&self) -> Result<u64, SmpError> {
        metrics::socket_power(self.platform, self.socket).map(|mw| u64::from(mw) * UW_PER_MW)
    }

    /// Active power cap, microwatts.
    pub fn cap_uw(&self) -> Result<u64, SmpError> {
        metrics::socket_power_limit(self.platform, self.socket)
            .map(|mw| u64::from(mw) * UW_PER_MW)
    }

    /// Highest settable power cap, microwatts.
    pub fn cap_max_uw(&self) -> Result<u64, SmpError> {
        metrics::socket_power_limit_max(self.platform, self.socket)
            .map(|mw| u64::from(mw) * UW_PER_MW)
    }

    /// Set the power cap, microwatts. Sub-milliwatt precision is
    /// truncated, matching the controller's unit.
    pub fn set_cap_uw(&self, uw: u64) -> Result<(), SmpError> {
        let mw = (uw / UW_PER_MW).min(u64::from(u32::MAX)) as u32;
        metrics::set_socket_power_limit(self.platform, self.socket, mw)
    }
}
