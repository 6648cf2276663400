use hal::BusError;
use thiserror::Error;

/// Errors raised by the sensor drivers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("bus I/O failed: {0}")]
    Io(#[from] BusError),

    #[error("calibration failed: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("unexpected device identity {0:#04x}")]
    UnknownDevice(u8),

    #[error("device has not been initialized")]
    NotInitialized,
}

/// Reasons still-pose calibration can fail
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("register {register:#04x} rejected write: wrote {expected:#04x}, read back {actual:#04x}")]
    WriteRejected { register: u8, expected: u8, actual: u8 },

    #[error("sensor moved during calibration (gyro spread {gyro_spread_dps:.2} °/s, mean rate {gyro_rate_dps:.2} °/s, accel magnitude {accel_magnitude_g:.3} g)")]
    NotStill {
        gyro_spread_dps: f32,
        gyro_rate_dps: f32,
        accel_magnitude_g: f32,
    },

    #[error("accelerometer bias {magnitude_g:.3} g exceeds the level calibration limit")]
    BiasOutOfRange { magnitude_g: f32 },

    #[error("calibration sample read failed: {0}")]
    SampleRead(BusError),
}
