//! Register access over any embedded-hal I2C bus

use std::time::{Duration, Instant};

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use hal::{BusError, RegisterBus, DEFAULT_BUS_TIMEOUT};
use log::warn;

use crate::claim::BusClaim;

/// A single device on an I2C bus, addressed by its 7-bit address
///
/// embedded-hal transactions cannot be aborted, so the timeout is enforced
/// after the fact: a transaction that took longer than the timeout is
/// reported as `BusError::Timeout` and its data is dropped.
pub struct I2cBus<I> {
    i2c: I,
    address: u8,
    timeout: Duration,
    _claim: Option<BusClaim>,
}

impl<I: I2c> I2cBus<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            timeout: DEFAULT_BUS_TIMEOUT,
            _claim: None,
        }
    }

    /// Bus handle holding a transport claim until it is dropped
    pub fn with_claim(i2c: I, address: u8, claim: BusClaim) -> Self {
        Self {
            _claim: Some(claim),
            ..Self::new(i2c, address)
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    fn guarded<T>(
        &mut self,
        op: impl FnOnce(&mut I, u8) -> Result<T, I::Error>,
    ) -> Result<T, BusError> {
        let started = Instant::now();
        let result = op(&mut self.i2c, self.address).map_err(|e| map_error_kind(e.kind()))?;
        let elapsed = started.elapsed();
        if elapsed > self.timeout {
            warn!(
                "I2C transaction to {:#04x} took {:?} (timeout {:?})",
                self.address, elapsed, self.timeout
            );
            return Err(BusError::Timeout);
        }
        Ok(result)
    }
}

impl<I: I2c> RegisterBus for I2cBus<I> {
    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.guarded(|i2c, addr| i2c.write_read(addr, &[reg], buf))
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), BusError> {
        self.guarded(|i2c, addr| i2c.write(addr, &[reg, value]))
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn map_error_kind(kind: ErrorKind) -> BusError {
    match kind {
        ErrorKind::Bus => BusError::Bus,
        ErrorKind::ArbitrationLoss => BusError::ArbitrationLost,
        ErrorKind::NoAcknowledge(_) => BusError::Nack,
        ErrorKind::Overrun => BusError::Overrun,
        _ => BusError::Other,
    }
}
