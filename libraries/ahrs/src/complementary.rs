//! Complementary filter on a unit quaternion
//!
//! The gyroscope is integrated every step. The accelerometer pulls the
//! estimate toward gravity through a proportional correction on the body
//! rates, and a magnetometer (when present) pulls the heading toward magnetic
//! north with a rotation about the world Z axis.

use hal::ImuSample;
use log::{debug, info, trace, warn};
use nalgebra as na;

use crate::error::helpers::{self, check_time_delta, check_vector_valid};
use crate::sensors::{
    accel_within_band, body_to_world, heading_from_mag, horizontal_angle, tilt_from_accel,
    world_to_body,
};
use crate::utils::{euler_to_quaternion, is_finite_quaternion, rad_to_deg, yaw_rotation};
use crate::{AhrsConfig, AhrsError, AhrsResult, FusionState, OrientationEstimate, SensorType};

/// Orientation estimator with an explicit lifecycle
#[derive(Debug, Clone)]
pub struct FusionEngine {
    /// Filter configuration
    config: AhrsConfig,

    /// Lifecycle state
    state: FusionState,

    /// Body to world rotation
    attitude: na::UnitQuaternion<f32>,

    /// Timestamp of the last accepted sample
    last_timestamp: Option<core::time::Duration>,

    /// Last published estimate, only `Some` while steady
    estimate: Option<OrientationEstimate>,

    /// Steps that skipped the gravity correction
    rejected_accel: u64,
}

impl FusionEngine {
    pub fn new(config: AhrsConfig) -> AhrsResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: FusionState::Uninitialized,
            attitude: na::UnitQuaternion::identity(),
            last_timestamp: None,
            estimate: None,
            rejected_accel: 0,
        })
    }

    pub fn config(&self) -> &AhrsConfig {
        &self.config
    }

    pub fn state(&self) -> FusionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == FusionState::Steady
    }

    /// Current estimate; `None` unless the engine is steady
    pub fn estimate(&self) -> Option<OrientationEstimate> {
        match self.state {
            FusionState::Steady => self.estimate,
            _ => None,
        }
    }

    /// Number of updates that ran without the gravity correction
    pub fn rejected_accel_updates(&self) -> u64 {
        self.rejected_accel
    }

    pub fn begin_calibration(&mut self) -> AhrsResult<()> {
        if self.state != FusionState::Uninitialized {
            return Err(AhrsError::InvalidTransition {
                from: self.state,
                message: "calibration can only start from an uninitialized engine".into(),
            });
        }
        self.state = FusionState::Calibrating;
        debug!("Fusion engine calibrating");
        Ok(())
    }

    pub fn abort_calibration(&mut self) -> AhrsResult<()> {
        if self.state != FusionState::Calibrating {
            return Err(AhrsError::InvalidTransition {
                from: self.state,
                message: "no calibration in progress".into(),
            });
        }
        self.reset();
        Ok(())
    }

    /// Seed the attitude from a still reference sample and start updating
    pub fn complete_calibration(&mut self, reference: &ImuSample) -> AhrsResult<()> {
        if self.state != FusionState::Calibrating {
            return Err(AhrsError::InvalidTransition {
                from: self.state,
                message: "calibration has not been started".into(),
            });
        }
        check_vector_valid(&reference.accel, SensorType::Accelerometer)?;

        let (roll, pitch) = tilt_from_accel(&reference.accel).ok_or_else(|| {
            helpers::sensor_error(
                "reference accelerometer reading has no direction",
                SensorType::Accelerometer,
            )
        })?;
        let yaw = match reference.mag {
            Some(mag) if mag.iter().all(|v| v.is_finite()) => {
                heading_from_mag(&mag, roll, pitch).unwrap_or(0.0)
            }
            _ => 0.0,
        };

        self.attitude = euler_to_quaternion(&na::Vector3::new(roll, pitch, yaw));
        self.last_timestamp = Some(reference.timestamp);
        self.estimate = Some(OrientationEstimate::new(self.attitude, reference.timestamp));
        self.state = FusionState::Steady;

        info!(
            "Fusion engine seeded: roll {:.2}°, pitch {:.2}°, yaw {:.2}°",
            rad_to_deg(roll),
            rad_to_deg(pitch),
            rad_to_deg(yaw)
        );
        Ok(())
    }

    /// Back to uninitialized, dropping the estimate
    pub fn reset(&mut self) {
        self.state = FusionState::Uninitialized;
        self.attitude = na::UnitQuaternion::identity();
        self.last_timestamp = None;
        self.estimate = None;
        self.rejected_accel = 0;
    }

    /// Fuse one sample
    ///
    /// On error the estimate is left exactly as it was.
    pub fn update(&mut self, sample: &ImuSample) -> AhrsResult<()> {
        if self.state != FusionState::Steady {
            return Err(AhrsError::NotReady { state: self.state });
        }
        let (last_timestamp, previous) = match (self.last_timestamp, self.estimate) {
            (Some(t), Some(e)) => (t, e),
            _ => {
                return Err(helpers::invalid_state(
                    "steady engine without a reference",
                    "FusionEngine",
                ))
            }
        };

        check_vector_valid(&sample.accel, SensorType::Accelerometer)?;
        check_vector_valid(&sample.gyro, SensorType::Gyroscope)?;
        if let Some(mag) = &sample.mag {
            check_vector_valid(mag, SensorType::Magnetometer)?;
        }

        if sample.timestamp <= last_timestamp {
            return Err(helpers::timing_error(
                format!(
                    "sample at {:?} is not after the last update at {:?}",
                    sample.timestamp, last_timestamp
                ),
                None,
            ));
        }
        let elapsed = (sample.timestamp - last_timestamp).as_secs_f32();
        check_time_delta(elapsed)?;

        let dt = if elapsed > self.config.max_dt {
            warn!(
                "Time step {:.3}s exceeds {:.3}s, clamping",
                elapsed, self.config.max_dt
            );
            self.config.max_dt
        } else {
            elapsed
        };

        let mut omega = sample.gyro;
        let accel_used = accel_within_band(&sample.accel, self.config.accel_rejection_g);
        if accel_used {
            let measured_up = sample.accel.normalize();
            let predicted_up = world_to_body(&na::Vector3::z(), &self.attitude);
            omega += measured_up.cross(&predicted_up) * self.config.accel_gain;
        } else {
            trace!(
                "Accelerometer magnitude {:.3} g outside the gravity band",
                sample.accel.norm()
            );
        }

        let mut attitude = self.attitude * na::UnitQuaternion::from_scaled_axis(omega * dt);

        if let Some(mag) = &sample.mag {
            let field = body_to_world(mag, &attitude);
            if let Some(heading_error) = horizontal_angle(&field) {
                let step = (self.config.mag_gain * dt).min(1.0);
                attitude = yaw_rotation(-step * heading_error) * attitude;
            }
        }

        attitude.renormalize();
        if !is_finite_quaternion(&attitude) {
            return Err(helpers::invalid_state(
                "attitude quaternion became non-finite",
                "FusionEngine",
            ));
        }

        if !accel_used {
            self.rejected_accel += 1;
        }
        self.attitude = attitude;
        self.last_timestamp = Some(sample.timestamp);
        self.estimate = Some(OrientationEstimate::following(
            &previous,
            attitude,
            sample.timestamp,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::deg_to_rad;
    use approx::assert_relative_eq;
    use core::time::Duration;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn level_sample(t_ms: u64) -> ImuSample {
        ImuSample::new(
            Duration::from_millis(t_ms),
            na::Vector3::new(0.0, 0.0, 1.0),
            na::Vector3::zeros(),
        )
    }

    fn steady_engine() -> FusionEngine {
        let mut engine = FusionEngine::new(AhrsConfig::default()).unwrap();
        engine.begin_calibration().unwrap();
        engine.complete_calibration(&level_sample(0)).unwrap();
        engine
    }

    #[test]
    fn test_lifecycle() {
        let mut engine = FusionEngine::new(AhrsConfig::default()).unwrap();
        assert_eq!(engine.state(), FusionState::Uninitialized);
        assert!(engine.estimate().is_none());
        assert_eq!(
            engine.update(&level_sample(10)),
            Err(AhrsError::NotReady {
                state: FusionState::Uninitialized
            })
        );

        engine.begin_calibration().unwrap();
        assert!(engine.begin_calibration().is_err());
        assert!(matches!(
            engine.update(&level_sample(10)),
            Err(AhrsError::NotReady { .. })
        ));
        engine.abort_calibration().unwrap();
        assert_eq!(engine.state(), FusionState::Uninitialized);

        engine.begin_calibration().unwrap();
        engine.complete_calibration(&level_sample(0)).unwrap();
        assert!(engine.is_ready());
        assert!(engine.abort_calibration().is_err());

        engine.reset();
        assert!(engine.estimate().is_none());
    }

    #[test]
    fn test_still_pose_stays_identity() {
        let mut engine = steady_engine();
        for i in 1..=100 {
            engine.update(&level_sample(i * 10)).unwrap();
        }
        let estimate = engine.estimate().unwrap();
        let q = estimate.quaternion();
        assert_relative_eq!(q.w, 1.0, epsilon = 1e-5);
        assert_relative_eq!(estimate.rotation().roll, 0.0, epsilon = 1e-3);
        assert_relative_eq!(estimate.rotation().yaw, 0.0, epsilon = 1e-3);
        assert_eq!(estimate.updates(), 100);
    }

    #[test]
    fn test_constant_yaw_rate() {
        let mut engine = steady_engine();
        let rate = deg_to_rad(90.0);
        for i in 1..=100 {
            let mut sample = level_sample(i * 10);
            sample.gyro = na::Vector3::new(0.0, 0.0, rate);
            engine.update(&sample).unwrap();
        }
        let estimate = engine.estimate().unwrap();
        assert_relative_eq!(estimate.rotation().yaw, 90.0, epsilon = 0.1);
        assert_relative_eq!(estimate.rotation_rate().yaw, 90.0, epsilon = 0.5);

        let q = estimate.quaternion();
        let half = core::f32::consts::FRAC_PI_4;
        assert_relative_eq!(q.w, half.cos(), epsilon = 1e-3);
        assert_relative_eq!(q.z, half.sin(), epsilon = 1e-3);
    }

    #[test]
    fn test_quaternion_stays_normalized() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut engine = steady_engine();
        let mut t_ms = 0;
        for i in 1..=2000 {
            t_ms += rng.gen_range(1..=150);
            let mut sample = ImuSample::new(
                Duration::from_millis(t_ms),
                na::Vector3::new(
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-2.0..2.0),
                ),
                na::Vector3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                ),
            );
            if rng.gen_bool(0.3) {
                sample = sample.with_mag(na::Vector3::new(
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                ));
            }
            engine.update(&sample).unwrap();
            let norm = engine.estimate().unwrap().quaternion().norm();
            assert!((norm - 1.0).abs() < 1e-6, "norm {} at step {}", norm, i);
        }
    }

    #[test]
    fn test_non_increasing_timestamp_is_rejected() {
        let mut engine = steady_engine();
        engine.update(&level_sample(10)).unwrap();
        let before = engine.estimate();

        assert!(matches!(
            engine.update(&level_sample(10)),
            Err(AhrsError::TimingError { .. })
        ));
        assert!(matches!(
            engine.update(&level_sample(5)),
            Err(AhrsError::TimingError { .. })
        ));
        assert_eq!(engine.estimate(), before);
    }

    #[test]
    fn test_invalid_sample_leaves_estimate() {
        let mut engine = steady_engine();
        let before = engine.estimate();
        let mut sample = level_sample(10);
        sample.gyro.x = f32::NAN;
        assert!(matches!(
            engine.update(&sample),
            Err(AhrsError::SensorError {
                sensor_type: SensorType::Gyroscope,
                ..
            })
        ));
        assert_eq!(engine.estimate(), before);
    }

    #[test]
    fn test_dt_is_clamped_after_stall() {
        let mut engine = steady_engine();
        let mut sample = level_sample(2000);
        sample.gyro = na::Vector3::new(0.0, 0.0, 1.0);
        engine.update(&sample).unwrap();
        // only max_dt (0.1 s) of the 2 s gap is integrated
        let yaw = engine.estimate().unwrap().rotation().yaw;
        assert_relative_eq!(yaw, rad_to_deg(0.1), epsilon = 1e-3);
    }

    #[test]
    fn test_tilt_converges_to_accelerometer() {
        let mut engine = steady_engine();
        let truth = na::UnitQuaternion::from_euler_angles(deg_to_rad(20.0), 0.0, 0.0);
        let accel = world_to_body(&na::Vector3::z(), &truth);
        for i in 1..=1000 {
            let mut sample = level_sample(i * 10);
            sample.accel = accel;
            engine.update(&sample).unwrap();
        }
        let attitude = engine.estimate().unwrap().attitude();
        assert_relative_eq!(attitude.roll, 20.0, epsilon = 0.5);
        assert_relative_eq!(attitude.pitch, 0.0, epsilon = 0.5);
    }

    #[test]
    fn test_heading_converges_to_magnetometer() {
        let mut engine = steady_engine();
        let field = na::Vector3::new(20.0, 0.0, -40.0);
        let truth = na::UnitQuaternion::from_euler_angles(0.0, 0.0, deg_to_rad(30.0));
        let mag = world_to_body(&field, &truth);
        for i in 1..=1500 {
            let sample = level_sample(i * 10).with_mag(mag);
            engine.update(&sample).unwrap();
        }
        assert_relative_eq!(engine.estimate().unwrap().rotation().yaw, 30.0, epsilon = 0.5);
    }

    #[test]
    fn test_accelerating_device_skips_gravity_correction() {
        let mut engine = steady_engine();
        let mut sample = level_sample(10);
        sample.accel = na::Vector3::new(1.5, 0.0, 1.0);
        engine.update(&sample).unwrap();
        assert_eq!(engine.rejected_accel_updates(), 1);
        // no gyro and no usable gravity: orientation unchanged
        assert_relative_eq!(engine.estimate().unwrap().quaternion().w, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_seed_uses_reference_tilt_and_heading() {
        let mut engine = FusionEngine::new(AhrsConfig::default()).unwrap();
        engine.begin_calibration().unwrap();
        let truth = na::UnitQuaternion::from_euler_angles(0.1, -0.1, 0.5);
        let reference = ImuSample::new(
            Duration::from_millis(500),
            world_to_body(&na::Vector3::z(), &truth),
            na::Vector3::zeros(),
        )
        .with_mag(world_to_body(&na::Vector3::new(25.0, 0.0, -35.0), &truth));
        engine.complete_calibration(&reference).unwrap();

        let estimate = engine.estimate().unwrap();
        assert_relative_eq!(estimate.orientation(), truth, epsilon = 1e-4);
        assert_eq!(estimate.timestamp(), Duration::from_millis(500));
        assert_eq!(estimate.updates(), 0);
    }

    #[test]
    fn test_seed_rejects_zero_reference() {
        let mut engine = FusionEngine::new(AhrsConfig::default()).unwrap();
        engine.begin_calibration().unwrap();
        let mut reference = level_sample(0);
        reference.accel = na::Vector3::zeros();
        assert!(engine.complete_calibration(&reference).is_err());
        assert_eq!(engine.state(), FusionState::Calibrating);
    }
}
