//! # AHRS - Attitude and Heading Reference System
//!
//! Fuses gyroscope, accelerometer and optional magnetometer samples into a
//! unit quaternion orientation estimate.
//!
//! ## Features
//!
//! - Complementary filter: gyro integration corrected toward gravity and
//!   magnetic north
//! - Explicit lifecycle (`Uninitialized -> Calibrating -> Steady`); estimates
//!   are only available once the filter has been seeded
//! - Accelerometer rejection while the device is accelerating
//! - Euler angle, attitude and Euler rate outputs in degrees
//!
//! ## Platform Support
//!
//! - **desktop**: For desktop applications and SITL (Software In The Loop) simulation

use serde::Deserialize;

pub mod complementary;
pub mod error;
pub mod estimate;
pub mod sensors;
pub mod utils;

pub use complementary::FusionEngine;
pub use error::{helpers, AhrsError, AhrsResult, SensorType};
pub use estimate::{Attitude, EulerAngles, OrientationEstimate, Quaternion};

/// Lifecycle of the fusion engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionState {
    /// No reference yet; nothing can be read
    Uninitialized,

    /// Sensor calibration is in progress
    Calibrating,

    /// Seeded and updating; estimates are valid
    Steady,
}

/// Configuration for the AHRS system
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AhrsConfig {
    /// Proportional gain pulling the estimate toward gravity (rad/s per unit error)
    pub accel_gain: f32,

    /// Gain pulling the heading toward magnetic north (1/s)
    pub mag_gain: f32,

    /// Largest time step integrated in one update, in seconds
    pub max_dt: f32,

    /// Accelerometer readings further than this from 1 g are not used as gravity
    pub accel_rejection_g: f32,

    /// Nominal update rate for the filter in Hz
    pub update_rate: f32,
}

impl Default for AhrsConfig {
    fn default() -> Self {
        Self {
            accel_gain: 1.0,
            mag_gain: 0.5,
            max_dt: 0.1,
            accel_rejection_g: 0.2,
            update_rate: 100.0,
        }
    }
}

impl AhrsConfig {
    pub fn validate(&self) -> AhrsResult<()> {
        let positive = [
            ("accel_gain", self.accel_gain),
            ("mag_gain", self.mag_gain),
            ("max_dt", self.max_dt),
            ("accel_rejection_g", self.accel_rejection_g),
            ("update_rate", self.update_rate),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(helpers::config_error(
                    format!("{} must be positive, got {}", name, value),
                    Some(name),
                ));
            }
        }
        Ok(())
    }
}
