//! Reference directions from gravity and the magnetic field
//!
//! World frame is X toward magnetic north, Z up. A device lying level reads
//! +1 g on its Z axis.

use nalgebra as na;

/// Below this magnitude a reference vector carries no usable direction
const MIN_REFERENCE_NORM: f32 = 1e-3;

/// Transform a vector from body frame to world frame
pub fn body_to_world(vec: &na::Vector3<f32>, attitude: &na::UnitQuaternion<f32>) -> na::Vector3<f32> {
    attitude * vec
}

/// Transform a vector from world frame to body frame
pub fn world_to_body(vec: &na::Vector3<f32>, attitude: &na::UnitQuaternion<f32>) -> na::Vector3<f32> {
    attitude.inverse() * vec
}

/// Roll and pitch (radians) of a device at rest, from its accelerometer
pub fn tilt_from_accel(accel: &na::Vector3<f32>) -> Option<(f32, f32)> {
    if accel.norm() < MIN_REFERENCE_NORM {
        return None;
    }
    let roll = accel.y.atan2(accel.z);
    let pitch = (-accel.x).atan2((accel.y * accel.y + accel.z * accel.z).sqrt());
    Some((roll, pitch))
}

/// Tilt-compensated heading (radians) that puts the field on world +X
pub fn heading_from_mag(mag: &na::Vector3<f32>, roll: f32, pitch: f32) -> Option<f32> {
    let level = na::UnitQuaternion::from_euler_angles(roll, pitch, 0.0) * mag;
    horizontal_angle(&level).map(|angle| -angle)
}

/// Angle of the horizontal projection of a world-frame vector from +X
pub fn horizontal_angle(vec: &na::Vector3<f32>) -> Option<f32> {
    if vec.x.hypot(vec.y) < MIN_REFERENCE_NORM {
        return None;
    }
    Some(vec.y.atan2(vec.x))
}

/// Whether the specific force is close enough to 1 g to be used as gravity
pub fn accel_within_band(accel: &na::Vector3<f32>, band_g: f32) -> bool {
    (accel.norm() - 1.0).abs() <= band_g
}
