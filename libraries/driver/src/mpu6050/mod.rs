//! MPU-6050 register driver
//!
//! Configures the chip with a fixed register sequence, runs still-pose
//! calibration and turns burst reads of the data registers into scaled,
//! bias-corrected [`ImuSample`]s.

pub mod config;
pub mod registers;

use core::time::Duration;

use hal::{
    BusError, CalibrationOffsets, Clock, ImuSample, ImuSensor, ImuStatus, RegisterBus, Vector3d,
};
use heapless::HistoryBuffer;
use log::{debug, info, warn};

use crate::error::{CalibrationError, DriverError};
pub use config::{AccelRange, DlpfBandwidth, GyroRange, Mpu6050Config};

/// Time to wait after a device reset before touching the registers again
const RESET_DELAY: Duration = Duration::from_millis(100);

/// Time for the gyro PLL to settle after wake-up
const WAKE_DELAY: Duration = Duration::from_millis(10);

/// Number of sample intervals used for the measured sample rate
const RATE_WINDOW: usize = 16;

/// Raw counts of one burst read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub accel: [i16; 3],
    pub temperature: i16,
    pub gyro: [i16; 3],
}

impl RawSample {
    pub fn from_bytes(data: &[u8; registers::DATA_BURST_LEN]) -> Self {
        let word = |i: usize| i16::from_be_bytes([data[2 * i], data[2 * i + 1]]);
        Self {
            accel: [word(0), word(1), word(2)],
            temperature: word(3),
            gyro: [word(4), word(5), word(6)],
        }
    }
}

/// MPU-6050 I2C driver
pub struct Mpu6050<B, C> {
    /// Register bus handle
    bus: B,

    /// Time source for timestamps and delays
    clock: C,

    /// Driver configuration
    config: Mpu6050Config,

    /// Accel scale factor (raw to g)
    accel_scale: f32,

    /// Gyro scale factor (raw to rad/s)
    gyro_scale: f32,

    /// Register sequence has been written
    configured: bool,

    /// Still-pose calibration has completed
    calibrated: bool,

    /// Failed reads since the last successful one
    consecutive_errors: u32,

    /// Last die temperature in Celsius
    temperature: f32,

    /// Timestamp of the last successful sample
    last_reading: Option<Duration>,

    /// Recent sample intervals in seconds
    intervals: HistoryBuffer<f32, RATE_WINDOW>,
}

impl<B: RegisterBus, C: Clock> Mpu6050<B, C> {
    pub fn new(mut bus: B, config: Mpu6050Config, clock: C) -> Self {
        bus.set_timeout(config.read_timeout());
        Self {
            bus,
            clock,
            config,
            accel_scale: config.accel_range.scale_to_g(),
            gyro_scale: config.gyro_range.scale_to_rad_s(),
            configured: false,
            calibrated: false,
            consecutive_errors: 0,
            temperature: 0.0,
            last_reading: None,
            intervals: HistoryBuffer::new(),
        }
    }

    pub fn config(&self) -> &Mpu6050Config {
        &self.config
    }

    /// Give the bus handle back, releasing the device
    pub fn release(self) -> B {
        self.bus
    }

    /// Check WHO_AM_I for the MPU-6050 identity
    pub fn test_connection(&mut self) -> Result<bool, DriverError> {
        let whoami = self.bus.read_register(registers::WHO_AM_I)?;
        if whoami == registers::MPU6050_WHO_AM_I_VALUE {
            info!("MPU6050 connection successful (WHO_AM_I: {:#04x})", whoami);
            Ok(true)
        } else {
            warn!("MPU6050 connection failed (WHO_AM_I: {:#04x})", whoami);
            Ok(false)
        }
    }

    /// Write the configuration sequence, then calibrate
    pub fn initialize(&mut self) -> Result<CalibrationOffsets, DriverError> {
        let whoami = self.bus.read_register(registers::WHO_AM_I)?;
        if whoami != registers::MPU6050_WHO_AM_I_VALUE {
            return Err(DriverError::UnknownDevice(whoami));
        }

        self.configured = false;
        self.calibrated = false;
        self.configure()?;
        self.configured = true;

        let offsets = self.calibrate()?;
        self.calibrated = true;
        Ok(offsets)
    }

    fn configure(&mut self) -> Result<(), DriverError> {
        info!("Resetting MPU6050");
        self.bus
            .write_register(registers::PWR_MGMT_1, registers::PWR_MGMT_1_DEVICE_RESET)?;
        self.clock.delay(RESET_DELAY);

        self.write_verified(registers::PWR_MGMT_1, registers::PWR_MGMT_1_CLKSEL_PLL_XGYRO)?;
        self.clock.delay(WAKE_DELAY);

        self.write_verified(registers::SMPLRT_DIV, self.config.sample_rate_div)?;
        self.write_verified(registers::CONFIG, self.config.dlpf.register_value())?;
        self.write_verified(registers::GYRO_CONFIG, self.config.gyro_range.register_value())?;
        self.write_verified(registers::ACCEL_CONFIG, self.config.accel_range.register_value())?;

        info!(
            "MPU6050 configured: {:.1} Hz, gyro {:?}, accel {:?}, DLPF {:?}",
            self.config.sample_rate_hz(),
            self.config.gyro_range,
            self.config.accel_range,
            self.config.dlpf
        );
        Ok(())
    }

    fn write_verified(&mut self, register: u8, value: u8) -> Result<(), DriverError> {
        self.bus.write_register(register, value)?;
        let actual = self.bus.read_register(register)?;
        if actual != value {
            return Err(CalibrationError::WriteRejected {
                register,
                expected: value,
                actual,
            }
            .into());
        }
        Ok(())
    }

    /// Average a still-pose burst into per-axis bias
    fn calibrate(&mut self) -> Result<CalibrationOffsets, DriverError> {
        let count = self.config.calibration_samples.max(1);
        info!("Calibrating MPU6050 with {} still samples", count);

        let mut accel_sum = Vector3d::zeros();
        let mut gyro_sum = Vector3d::zeros();
        let mut gyro_min = Vector3d::repeat(f32::MAX);
        let mut gyro_max = Vector3d::repeat(f32::MIN);

        for i in 0..count {
            if i > 0 {
                self.clock.delay(self.config.calibration_interval());
            }
            let raw = self
                .read_raw_with_retry()
                .map_err(CalibrationError::SampleRead)?;
            let (accel, gyro) = self.scale(&raw);
            accel_sum += accel;
            gyro_sum += gyro;
            gyro_min = gyro_min.inf(&gyro);
            gyro_max = gyro_max.sup(&gyro);
        }

        let n = count as f32;
        let accel_mean = accel_sum / n;
        let gyro_mean = gyro_sum / n;
        let gyro_spread_dps = (gyro_max - gyro_min).max().to_degrees();
        let gyro_rate_dps = gyro_mean.norm().to_degrees();
        let accel_magnitude_g = accel_mean.norm();

        // a steady turn has no spread, so the mean rate is bounded too
        if gyro_spread_dps > self.config.still_gyro_tolerance_dps
            || gyro_rate_dps > self.config.max_gyro_bias_dps
            || (accel_magnitude_g - 1.0).abs() > self.config.still_accel_tolerance_g
        {
            return Err(CalibrationError::NotStill {
                gyro_spread_dps,
                gyro_rate_dps,
                accel_magnitude_g,
            }
            .into());
        }

        let accel_bias = if self.config.level_calibration {
            let bias = accel_mean - Vector3d::z();
            if bias.norm() > self.config.max_accel_bias_g {
                return Err(CalibrationError::BiasOutOfRange {
                    magnitude_g: bias.norm(),
                }
                .into());
            }
            bias
        } else {
            Vector3d::zeros()
        };

        let offsets = CalibrationOffsets::new(accel_bias, gyro_mean, count);
        info!(
            "MPU6050 calibrated: gyro bias [{:.4}, {:.4}, {:.4}] rad/s, accel bias [{:.4}, {:.4}, {:.4}] g",
            gyro_mean.x, gyro_mean.y, gyro_mean.z, accel_bias.x, accel_bias.y, accel_bias.z
        );
        Ok(offsets)
    }

    /// Read one sample, retrying a single transient failure
    pub fn read_sample(&mut self, offsets: &CalibrationOffsets) -> Result<ImuSample, DriverError> {
        if !self.configured {
            return Err(DriverError::NotInitialized);
        }
        let raw = self.read_raw_with_retry()?;
        let timestamp = self.clock.now();
        let (accel, gyro) = self.scale(&raw);
        self.temperature =
            raw.temperature as f32 / registers::TEMP_SENSITIVITY + registers::TEMP_OFFSET;

        if let Some(last) = self.last_reading {
            if timestamp > last {
                self.intervals.write((timestamp - last).as_secs_f32());
            }
        }
        self.last_reading = Some(timestamp);

        let sample = ImuSample {
            timestamp,
            accel: offsets.correct_accel(accel),
            gyro: offsets.correct_gyro(gyro),
            mag: None,
            temperature: self.temperature,
        };
        debug!(
            "sample t={:?} accel={:?} gyro={:?}",
            sample.timestamp, sample.accel, sample.gyro
        );
        Ok(sample)
    }

    fn read_raw_with_retry(&mut self) -> Result<RawSample, BusError> {
        match self.read_raw() {
            Ok(raw) => Ok(raw),
            Err(first) => {
                warn!("IMU read failed ({}), retrying once", first);
                self.read_raw().map_err(|second| {
                    warn!("IMU read failed again ({}), skipping this cycle", second);
                    second
                })
            }
        }
    }

    fn read_raw(&mut self) -> Result<RawSample, BusError> {
        let mut data = [0u8; registers::DATA_BURST_LEN];
        match self.bus.read_registers(registers::ACCEL_XOUT_H, &mut data) {
            Ok(()) => {
                self.consecutive_errors = 0;
                Ok(RawSample::from_bytes(&data))
            }
            Err(e) => {
                self.consecutive_errors += 1;
                Err(e)
            }
        }
    }

    fn scale(&self, raw: &RawSample) -> (Vector3d, Vector3d) {
        let accel = Vector3d::new(
            raw.accel[0] as f32,
            raw.accel[1] as f32,
            raw.accel[2] as f32,
        ) * self.accel_scale;
        let gyro = Vector3d::new(raw.gyro[0] as f32, raw.gyro[1] as f32, raw.gyro[2] as f32)
            * self.gyro_scale;
        (accel, gyro)
    }

    /// Mean sample rate over the recent window
    pub fn sample_rate(&self) -> Option<f32> {
        let intervals = self.intervals.as_slice();
        if intervals.is_empty() {
            return None;
        }
        let mean = intervals.iter().sum::<f32>() / intervals.len() as f32;
        if mean > 0.0 {
            Some(1.0 / mean)
        } else {
            None
        }
    }

    pub fn get_status(&self) -> ImuStatus {
        ImuStatus {
            healthy: self.configured && self.consecutive_errors == 0,
            consecutive_errors: self.consecutive_errors,
            temperature: self.temperature,
            sample_rate: self.sample_rate(),
            last_reading: self.last_reading,
            calibrated: self.calibrated,
        }
    }
}

impl<B: RegisterBus, C: Clock> ImuSensor for Mpu6050<B, C> {
    type Error = DriverError;

    fn test_connection(&mut self) -> Result<bool, DriverError> {
        Mpu6050::test_connection(self)
    }

    fn initialize(&mut self) -> Result<CalibrationOffsets, DriverError> {
        Mpu6050::initialize(self)
    }

    fn read_sample(&mut self, offsets: &CalibrationOffsets) -> Result<ImuSample, DriverError> {
        Mpu6050::read_sample(self, offsets)
    }

    fn get_status(&self) -> ImuStatus {
        Mpu6050::get_status(self)
    }
}
