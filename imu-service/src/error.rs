use std::path::PathBuf;

use ahrs::AhrsError;
use driver::DriverError;
use hal::TransportError;
use thiserror::Error;

/// Reasons a session could not be started or driven
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("failed to open bus: {0}")]
    Transport(#[from] TransportError),

    #[error("no MPU6050 answering on bus {bus_id}")]
    DeviceNotFound { bus_id: u8 },

    #[error("sensor driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("fusion error: {0}")]
    Fusion(#[from] AhrsError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("polling thread panicked")]
    WorkerPanicked,
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("fusion settings: {0}")]
    Fusion(AhrsError),
}
