/// Register bus and transport interfaces
use core::time::Duration;
use thiserror::Error;

/// Default upper bound for a single bus transaction
pub const DEFAULT_BUS_TIMEOUT: Duration = Duration::from_millis(5);

/// Failure of a single register read or write
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("device did not acknowledge")]
    Nack,

    #[error("bus error")]
    Bus,

    #[error("bus arbitration lost")]
    ArbitrationLost,

    #[error("data overrun")]
    Overrun,

    #[error("transaction exceeded its timeout")]
    Timeout,

    #[error("unspecified bus failure")]
    Other,
}

/// Failure to obtain a bus handle
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("bus {0} does not exist")]
    NotFound(u8),

    #[error("bus {0} is already claimed by another handle")]
    Busy(u8),

    #[error("bus {0} could not be opened")]
    Open(u8),
}

/// Register-level access to a single device on an opened bus
///
/// A handle has exactly one owner. Dropping it releases the bus.
pub trait RegisterBus {
    /// Read `buf.len()` consecutive registers starting at `reg`
    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), BusError>;

    /// Write a single register
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), BusError>;

    /// Read a single register
    fn read_register(&mut self, reg: u8) -> Result<u8, BusError> {
        let mut buffer = [0u8; 1];
        self.read_registers(reg, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Set the upper bound for each transaction
    ///
    /// A transaction that overruns reports `BusError::Timeout` and its data
    /// is discarded.
    fn set_timeout(&mut self, timeout: Duration);

    /// Current transaction timeout
    fn timeout(&self) -> Duration;
}

/// Factory for exclusive bus handles
pub trait Transport {
    type Handle: RegisterBus;

    /// Open the bus with the given id
    ///
    /// Fails with `TransportError::Busy` while another handle for the same
    /// bus is alive.
    fn open(&mut self, bus_id: u8) -> Result<Self::Handle, TransportError>;
}
