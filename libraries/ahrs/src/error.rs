use std::fmt;

use thiserror::Error;

use crate::FusionState;

/// Primary error type for the AHRS crate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AhrsError {
    /// An operation that needs a steady estimate was called too early
    #[error("Estimator not ready (state {state:?})")]
    NotReady {
        /// State the engine was in
        state: FusionState,
    },

    /// State transition that is not allowed from the current state
    #[error("Invalid transition from {from:?}: {message}")]
    InvalidTransition {
        /// State the engine was in
        from: FusionState,
        /// Detailed error message
        message: String,
    },

    /// Error from sensor measurements or processing
    #[error("Sensor error: {message}")]
    SensorError {
        /// Detailed error message
        message: String,
        /// The sensor type that caused the error
        sensor_type: SensorType,
    },

    /// State became invalid (containing NaN or infinite values)
    #[error("Invalid state detected in {component}: {message}")]
    InvalidState {
        /// Detailed error message
        message: String,
        /// Component where invalid state was detected
        component: String,
    },

    /// Timing-related errors (negative or invalid time deltas)
    #[error("Timing error: {message}")]
    TimingError {
        /// Detailed error message
        message: String,
        /// Time value that caused the error if available
        time_value: Option<f32>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Detailed error message
        message: String,
        /// Configuration parameter that caused the error
        parameter: Option<String>,
    },
}

/// Types of sensors that could generate errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    Accelerometer,
    Gyroscope,
    Magnetometer,
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorType::Accelerometer => write!(f, "Accelerometer"),
            SensorType::Gyroscope => write!(f, "Gyroscope"),
            SensorType::Magnetometer => write!(f, "Magnetometer"),
        }
    }
}

/// Helper functions for creating common errors
pub mod helpers {
    use super::*;

    /// Create a sensor error
    pub fn sensor_error(message: impl Into<String>, sensor_type: SensorType) -> AhrsError {
        AhrsError::SensorError {
            message: message.into(),
            sensor_type,
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>, component: impl Into<String>) -> AhrsError {
        AhrsError::InvalidState {
            message: message.into(),
            component: component.into(),
        }
    }

    /// Create a timing error
    pub fn timing_error(message: impl Into<String>, time_value: Option<f32>) -> AhrsError {
        AhrsError::TimingError {
            message: message.into(),
            time_value,
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>, parameter: Option<impl Into<String>>) -> AhrsError {
        AhrsError::ConfigurationError {
            message: message.into(),
            parameter: parameter.map(|p| p.into()),
        }
    }

    /// Check if a vector contains invalid values (NaN or infinite)
    pub fn check_vector_valid(
        vec: &nalgebra::Vector3<f32>,
        sensor_type: SensorType,
    ) -> Result<(), AhrsError> {
        if vec.iter().any(|v| !v.is_finite()) {
            Err(sensor_error(
                format!("{} reading contains NaN or infinite values", sensor_type),
                sensor_type,
            ))
        } else {
            Ok(())
        }
    }

    /// Check if a time delta is valid
    pub fn check_time_delta(dt: f32) -> Result<(), AhrsError> {
        if dt <= 0.0 || !dt.is_finite() {
            Err(timing_error(format!("Invalid time delta: {}", dt), Some(dt)))
        } else {
            Ok(())
        }
    }
}

/// Type alias for Result with AhrsError
pub type AhrsResult<T> = Result<T, AhrsError>;
