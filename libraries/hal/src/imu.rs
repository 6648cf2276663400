/// IMU (Inertial Measurement Unit) sensor interface
use core::time::Duration;

use crate::types::Vector3d;

/// One timestamped, scaled and bias-corrected IMU reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    /// Time the sample was read, relative to the clock origin
    pub timestamp: Duration,

    /// Specific force in body frame, in g (reads +1 on Z when lying level)
    pub accel: Vector3d,

    /// Angular rate in body frame, in rad/s
    pub gyro: Vector3d,

    /// Magnetic field in body frame, in μT, if the device provides one
    pub mag: Option<Vector3d>,

    /// Die temperature in Celsius
    pub temperature: f32,
}

impl ImuSample {
    pub fn new(timestamp: Duration, accel: Vector3d, gyro: Vector3d) -> Self {
        Self {
            timestamp,
            accel,
            gyro,
            mag: None,
            temperature: 0.0,
        }
    }

    pub fn with_mag(mut self, mag: Vector3d) -> Self {
        self.mag = Some(mag);
        self
    }
}

/// Per-axis bias established by still-pose calibration
///
/// Built once by the sensor driver during initialization and never modified
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOffsets {
    accel_bias: Vector3d,
    gyro_bias: Vector3d,
    samples: u16,
}

impl CalibrationOffsets {
    pub fn new(accel_bias: Vector3d, gyro_bias: Vector3d, samples: u16) -> Self {
        Self {
            accel_bias,
            gyro_bias,
            samples,
        }
    }

    /// Accelerometer bias in g
    pub fn accel_bias(&self) -> Vector3d {
        self.accel_bias
    }

    /// Gyroscope bias in rad/s
    pub fn gyro_bias(&self) -> Vector3d {
        self.gyro_bias
    }

    /// Number of samples averaged to obtain the bias
    pub fn samples(&self) -> u16 {
        self.samples
    }

    /// Remove the accelerometer bias from a scaled reading
    pub fn correct_accel(&self, accel: Vector3d) -> Vector3d {
        accel - self.accel_bias
    }

    /// Remove the gyroscope bias from a scaled reading
    pub fn correct_gyro(&self, gyro: Vector3d) -> Vector3d {
        gyro - self.gyro_bias
    }
}

/// IMU (Inertial Measurement Unit) interface
pub trait ImuSensor {
    type Error;

    /// Check that the expected device answers on the bus
    fn test_connection(&mut self) -> Result<bool, Self::Error>;

    /// Configure the device and run still-pose calibration
    ///
    /// The device must remain stationary during this process.
    fn initialize(&mut self) -> Result<CalibrationOffsets, Self::Error>;

    /// Read one bias-corrected sample
    fn read_sample(&mut self, offsets: &CalibrationOffsets) -> Result<ImuSample, Self::Error>;

    /// Get detailed information about the IMU status
    fn get_status(&self) -> ImuStatus;
}

/// IMU sensor status information
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuStatus {
    /// Whether the last read succeeded
    pub healthy: bool,

    /// Failed reads since the last successful one
    pub consecutive_errors: u32,

    /// Temperature of the sensor in Celsius
    pub temperature: f32,

    /// Measured sample rate in Hz, once enough samples were read
    pub sample_rate: Option<f32>,

    /// Timestamp of the last successful reading
    pub last_reading: Option<Duration>,

    /// Whether still-pose calibration has completed
    pub calibrated: bool,
}

impl Default for ImuStatus {
    fn default() -> Self {
        Self {
            healthy: false,
            consecutive_errors: 0,
            temperature: 0.0,
            sample_rate: None,
            last_reading: None,
            calibrated: false,
        }
    }
}
