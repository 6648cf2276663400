//! Bus transports and sensor drivers

pub mod claim;
pub mod clock;
pub mod error;
pub mod i2c;
#[cfg(feature = "linux")]
pub mod linux;
pub mod mpu6050;
pub mod sim;

pub use claim::{BusClaim, ClaimRegistry};
pub use clock::MonotonicClock;
pub use error::{CalibrationError, DriverError};
pub use i2c::I2cBus;
#[cfg(feature = "linux")]
pub use linux::LinuxTransport;
pub use mpu6050::{Mpu6050, Mpu6050Config};
pub use sim::{SimBus, SimClock, SimTransport, SimulatedMpu6050};
