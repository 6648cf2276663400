//! Linux userspace I2C transport (`/dev/i2c-N`)

use std::path::Path;

use hal::{Transport, TransportError};
use linux_embedded_hal::I2cdev;
use log::{error, info};

use crate::claim::ClaimRegistry;
use crate::i2c::I2cBus;

/// Opens `/dev/i2c-<bus_id>` character devices
///
/// Exclusivity is enforced between handles opened through the same
/// transport; the kernel itself allows several openers.
///
/// The per-transaction timeout of [`I2cBus`] is only checked once a
/// transfer returns. A transfer that hangs blocks the caller (and the
/// polling loop tick) until the kernel adapter gives up, so the adapter's
/// own timeout is the real upper bound on a stalled read.
pub struct LinuxTransport {
    address: u8,
    claims: ClaimRegistry,
}

impl LinuxTransport {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            claims: ClaimRegistry::new(),
        }
    }

    fn device_path(bus_id: u8) -> String {
        format!("/dev/i2c-{bus_id}")
    }
}

impl Transport for LinuxTransport {
    type Handle = I2cBus<I2cdev>;

    fn open(&mut self, bus_id: u8) -> Result<Self::Handle, TransportError> {
        let path = Self::device_path(bus_id);
        if !Path::new(&path).exists() {
            return Err(TransportError::NotFound(bus_id));
        }
        let claim = self.claims.claim(bus_id)?;
        let device = I2cdev::new(&path).map_err(|e| {
            error!("Failed to open {}: {}", path, e);
            TransportError::Open(bus_id)
        })?;
        info!("Opened {} for device {:#04x}", path, self.address);
        Ok(I2cBus::with_claim(device, self.address, claim))
    }
}
