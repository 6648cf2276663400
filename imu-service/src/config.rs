use std::fs;
use std::path::Path;
use std::time::Duration;

use ahrs::AhrsConfig;
use driver::mpu6050::registers::{MPU6050_ADDR, MPU6050_ADDR_ALT};
use driver::Mpu6050Config;
use log::info;
use serde::Deserialize;

use crate::error::ConfigError;

/// Settings for one IMU session
///
/// Every field has a default, so an empty document is a valid configuration:
///
/// ```toml
/// bus_id = 1
/// poll_period_ms = 10
///
/// [sensor]
/// gyro_range = "dps500"
///
/// [fusion]
/// accel_gain = 2.0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bus number (`/dev/i2c-<bus_id>` on Linux)
    pub bus_id: u8,

    /// Period of the polling loop in milliseconds
    pub poll_period_ms: u64,

    pub sensor: Mpu6050Config,

    pub fusion: AhrsConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bus_id: 1,
            poll_period_ms: 10,
            sensor: Mpu6050Config::default(),
            fusion: AhrsConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_period_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_period_ms",
                reason: "must be at least 1".into(),
            });
        }
        if self.sensor.calibration_samples == 0 {
            return Err(ConfigError::Invalid {
                field: "sensor.calibration_samples",
                reason: "must be at least 1".into(),
            });
        }
        if self.sensor.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "sensor.read_timeout_ms",
                reason: "must be at least 1".into(),
            });
        }
        let limit = self.sensor.max_gyro_bias_dps;
        if limit.is_nan() || limit <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "sensor.max_gyro_bias_dps",
                reason: "must be positive".into(),
            });
        }
        if !matches!(self.sensor.address, MPU6050_ADDR | MPU6050_ADDR_ALT) {
            return Err(ConfigError::Invalid {
                field: "sensor.address",
                reason: format!("{:#04x} is not an MPU6050 address", self.sensor.address),
            });
        }
        self.fusion.validate().map_err(ConfigError::Fusion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver::mpu6050::{DlpfBandwidth, GyroRange};

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(ServiceConfig::from_toml_str("").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = ServiceConfig::from_toml_str(
            r#"
            bus_id = 3
            poll_period_ms = 20

            [sensor]
            gyro_range = "dps500"
            dlpf = "hz21"
            calibration_samples = 50

            [fusion]
            accel_gain = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(config.bus_id, 3);
        assert_eq!(config.poll_period(), Duration::from_millis(20));
        assert_eq!(config.sensor.gyro_range, GyroRange::Dps500);
        assert_eq!(config.sensor.dlpf, DlpfBandwidth::Hz21);
        assert_eq!(config.sensor.calibration_samples, 50);
        assert_eq!(config.sensor.accel_range, Mpu6050Config::default().accel_range);
        assert_eq!(config.fusion.accel_gain, 2.5);
        assert_eq!(config.fusion.max_dt, AhrsConfig::default().max_dt);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            ServiceConfig::from_toml_str("poll_period_ms = 0"),
            Err(ConfigError::Invalid { field: "poll_period_ms", .. })
        ));
        assert!(matches!(
            ServiceConfig::from_toml_str("[sensor]\ncalibration_samples = 0"),
            Err(ConfigError::Invalid { field: "sensor.calibration_samples", .. })
        ));
        assert!(matches!(
            ServiceConfig::from_toml_str("[sensor]\nmax_gyro_bias_dps = 0.0"),
            Err(ConfigError::Invalid { field: "sensor.max_gyro_bias_dps", .. })
        ));
        assert!(matches!(
            ServiceConfig::from_toml_str("[sensor]\naddress = 0x20"),
            Err(ConfigError::Invalid { field: "sensor.address", .. })
        ));
        assert!(matches!(
            ServiceConfig::from_toml_str("[fusion]\nmax_dt = -1.0"),
            Err(ConfigError::Fusion(_))
        ));
        assert!(matches!(
            ServiceConfig::from_toml_str("bus_id = \"one\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ServiceConfig::load("/nonexistent/imu.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}
