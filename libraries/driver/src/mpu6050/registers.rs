//! MPU-6050 Register Definitions
//!
//! Based on the MPU-6000/MPU-6050 Register Map and Descriptions, revision 4.2.

/// MPU-6050 I2C address when AD0 pin is low
pub const MPU6050_ADDR: u8 = 0x68;

/// MPU-6050 I2C address when AD0 pin is high
pub const MPU6050_ADDR_ALT: u8 = 0x69;

/// Sample rate divider: SAMPLE_RATE = Gyro_Output_Rate / (1 + SMPLRT_DIV)
pub const SMPLRT_DIV: u8 = 0x19;

/// Configuration register (DLPF, FSYNC)
pub const CONFIG: u8 = 0x1A;

/// Gyroscope configuration (full-scale range, self-test)
pub const GYRO_CONFIG: u8 = 0x1B;

/// Accelerometer configuration (full-scale range, self-test)
pub const ACCEL_CONFIG: u8 = 0x1C;

/// First of the 14 data registers: accel XYZ, temperature, gyro XYZ
pub const ACCEL_XOUT_H: u8 = 0x3B;

/// Temperature output, high byte
pub const TEMP_OUT_H: u8 = 0x41;

/// Gyroscope output, X axis high byte
pub const GYRO_XOUT_H: u8 = 0x43;

/// Last data register
pub const GYRO_ZOUT_L: u8 = 0x48;

/// Power management 1 (reset, sleep, clock source)
pub const PWR_MGMT_1: u8 = 0x6B;

/// Device identity register
pub const WHO_AM_I: u8 = 0x75;

/// WHO_AM_I value reported by the MPU-6050
pub const MPU6050_WHO_AM_I_VALUE: u8 = 0x68;

/// PWR_MGMT_1: reset all registers to their defaults (self-clearing)
pub const PWR_MGMT_1_DEVICE_RESET: u8 = 0x80;

/// PWR_MGMT_1: sleep mode, set after reset
pub const PWR_MGMT_1_SLEEP: u8 = 0x40;

/// PWR_MGMT_1: PLL with X axis gyroscope reference
pub const PWR_MGMT_1_CLKSEL_PLL_XGYRO: u8 = 0x01;

/// Full-scale range field position in GYRO_CONFIG / ACCEL_CONFIG
pub const FS_SEL_SHIFT: u8 = 3;

/// Full-scale range field mask in GYRO_CONFIG / ACCEL_CONFIG
pub const FS_SEL_MASK: u8 = 0x18;

/// Length of one accel + temperature + gyro burst read
pub const DATA_BURST_LEN: usize = 14;

/// Temperature sensitivity (LSB per degree Celsius)
pub const TEMP_SENSITIVITY: f32 = 340.0;

/// Temperature offset in degrees Celsius
pub const TEMP_OFFSET: f32 = 36.53;
