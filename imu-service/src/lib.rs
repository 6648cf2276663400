//! IMU orientation service
//!
//! [`ImuService`] is an explicit session over one MPU-6050: it opens the bus,
//! configures and calibrates the chip, fuses every polled sample and publishes
//! the orientation for any number of [`OrientationReader`]s. Polling is driven
//! by the caller or by a [`PollingLoop`].

mod config;
mod error;
mod reader;
mod runner;
mod service;

pub use ahrs::{AhrsConfig, Attitude, EulerAngles, OrientationEstimate, Quaternion};
pub use config::ServiceConfig;
pub use driver::Mpu6050Config;
pub use error::{ConfigError, ServiceError};
pub use hal::ImuStatus;
pub use reader::OrientationReader;
pub use runner::PollingLoop;
pub use service::{ImuService, PollOutcome, PollStats};
