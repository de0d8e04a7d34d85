//! Operator-facing configuration, passed explicitly into the components
//! instead of living in ambient globals.

use core::fmt::Write;
use core::net::Ipv4Addr;

use heapless::String;

use crate::error::SensorError;
use crate::onewire::SensorAddress;

/// Station-mode credentials.
#[derive(Clone, Copy)]
pub struct NetConfig {
    pub ssid: &'static str,
    pub password: &'static str,
}

/// HomeSeer endpoint.
#[derive(Clone, Copy)]
pub struct ServerConfig {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl ServerConfig {
    /// Value for the HTTP Host header, `address:port`.
    pub fn host_header(&self) -> Result<String<24>, SensorError> {
        let mut host = String::new();
        write!(host, "{}:{}", self.address, self.port).map_err(|_| SensorError::BufferOverflow)?;
        Ok(host)
    }
}

/// One attached sensor and the HomeSeer device it feeds.
#[derive(Clone, Copy)]
pub struct DeviceEntry {
    /// Operator label, only used in diagnostics.
    pub label: &'static str,
    pub address: SensorAddress,
    /// HomeSeer device reference to write the value to.
    pub device_ref: u32,
}

/// Immutable sensor-to-device mapping. Reports go out in entry order.
pub struct DeviceTable<'a> {
    entries: &'a [DeviceEntry],
}

impl<'a> DeviceTable<'a> {
    pub fn new(entries: &'a [DeviceEntry]) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a DeviceEntry> {
        self.entries.iter()
    }

    /// Checks the table against the addresses found on the bus. Every entry
    /// must be present on the bus and every bus device must have an entry;
    /// either mismatch is a fatal configuration error.
    pub fn validate(&self, discovered: &[SensorAddress]) -> Result<(), SensorError> {
        for entry in self.entries {
            if !discovered.contains(&entry.address) {
                return Err(SensorError::SensorMissing(entry.label));
            }
        }
        for address in discovered {
            if !self.entries.iter().any(|e| e.address == *address) {
                return Err(SensorError::UnknownSensor(*address));
            }
        }
        Ok(())
    }
}
