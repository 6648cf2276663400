//! MPU-6050 configuration

use core::time::Duration;

use serde::Deserialize;

use super::registers::{FS_SEL_MASK, FS_SEL_SHIFT, MPU6050_ADDR};

/// Gyroscope full-scale range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GyroRange {
    /// ±250 °/s
    Dps250,
    /// ±500 °/s
    Dps500,
    /// ±1000 °/s
    Dps1000,
    /// ±2000 °/s
    Dps2000,
}

impl GyroRange {
    /// Value for the GYRO_CONFIG register
    pub fn register_value(self) -> u8 {
        (self as u8) << FS_SEL_SHIFT
    }

    /// Decode the FS_SEL field of GYRO_CONFIG
    pub fn from_register(value: u8) -> Self {
        match (value & FS_SEL_MASK) >> FS_SEL_SHIFT {
            0 => GyroRange::Dps250,
            1 => GyroRange::Dps500,
            2 => GyroRange::Dps1000,
            _ => GyroRange::Dps2000,
        }
    }

    /// Sensitivity in LSB per °/s
    pub fn lsb_per_dps(self) -> f32 {
        match self {
            GyroRange::Dps250 => 131.0,
            GyroRange::Dps500 => 65.5,
            GyroRange::Dps1000 => 32.8,
            GyroRange::Dps2000 => 16.4,
        }
    }

    /// Scale factor from raw counts to rad/s
    pub fn scale_to_rad_s(self) -> f32 {
        (1.0 / self.lsb_per_dps()).to_radians()
    }
}

/// Accelerometer full-scale range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccelRange {
    /// ±2 g
    G2,
    /// ±4 g
    G4,
    /// ±8 g
    G8,
    /// ±16 g
    G16,
}

impl AccelRange {
    /// Value for the ACCEL_CONFIG register
    pub fn register_value(self) -> u8 {
        (self as u8) << FS_SEL_SHIFT
    }

    /// Decode the AFS_SEL field of ACCEL_CONFIG
    pub fn from_register(value: u8) -> Self {
        match (value & FS_SEL_MASK) >> FS_SEL_SHIFT {
            0 => AccelRange::G2,
            1 => AccelRange::G4,
            2 => AccelRange::G8,
            _ => AccelRange::G16,
        }
    }

    /// Sensitivity in LSB per g
    pub fn lsb_per_g(self) -> f32 {
        match self {
            AccelRange::G2 => 16384.0,
            AccelRange::G4 => 8192.0,
            AccelRange::G8 => 4096.0,
            AccelRange::G16 => 2048.0,
        }
    }

    /// Scale factor from raw counts to g
    pub fn scale_to_g(self) -> f32 {
        1.0 / self.lsb_per_g()
    }
}

/// Digital low pass filter bandwidth (accelerometer / gyroscope)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DlpfBandwidth {
    Hz260,
    Hz184,
    Hz94,
    Hz44,
    Hz21,
    Hz10,
    Hz5,
}

impl DlpfBandwidth {
    /// Value for the DLPF_CFG field of the CONFIG register
    pub fn register_value(self) -> u8 {
        self as u8
    }

    /// Gyroscope output rate before the sample rate divider
    pub fn gyro_output_rate_hz(self) -> f32 {
        match self {
            DlpfBandwidth::Hz260 => 8000.0,
            _ => 1000.0,
        }
    }
}

/// MPU-6050 driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Mpu6050Config {
    /// 7-bit I2C address (0x68 or 0x69)
    pub address: u8,

    /// Sample rate divider written to SMPLRT_DIV
    pub sample_rate_div: u8,

    /// Low pass filter bandwidth
    pub dlpf: DlpfBandwidth,

    /// Gyroscope full-scale range
    pub gyro_range: GyroRange,

    /// Accelerometer full-scale range
    pub accel_range: AccelRange,

    /// Number of still-pose samples averaged during calibration
    pub calibration_samples: u16,

    /// Delay between calibration samples in milliseconds
    pub calibration_interval_ms: u64,

    /// Largest gyro spread (max - min, °/s) on any axis still considered stationary
    pub still_gyro_tolerance_dps: f32,

    /// Largest deviation of the mean accel magnitude from 1 g still considered stationary
    pub still_accel_tolerance_g: f32,

    /// Assume the device lies level with +Z up and fold the tilt into the accel bias
    pub level_calibration: bool,

    /// Largest accel bias accepted by level calibration, in g
    pub max_accel_bias_g: f32,

    /// Largest mean gyro rate (°/s) accepted as bias; anything above is a steady turn
    pub max_gyro_bias_dps: f32,

    /// Upper bound for a single bus transaction in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for Mpu6050Config {
    fn default() -> Self {
        Self {
            address: MPU6050_ADDR,
            sample_rate_div: 9, // 100 Hz with the DLPF enabled
            dlpf: DlpfBandwidth::Hz44,
            gyro_range: GyroRange::Dps2000,
            accel_range: AccelRange::G2,
            calibration_samples: 100,
            calibration_interval_ms: 10,
            still_gyro_tolerance_dps: 3.0,
            still_accel_tolerance_g: 0.1,
            level_calibration: true,
            max_accel_bias_g: 0.25,
            max_gyro_bias_dps: 10.0,
            read_timeout_ms: 5,
        }
    }
}

impl Mpu6050Config {
    /// Configured output data rate in Hz
    pub fn sample_rate_hz(&self) -> f32 {
        self.dlpf.gyro_output_rate_hz() / (1.0 + self.sample_rate_div as f32)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn calibration_interval(&self) -> Duration {
        Duration::from_millis(self.calibration_interval_ms)
    }
}
