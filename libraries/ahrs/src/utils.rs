use core::f32::consts::PI;
use nalgebra as na;

/// Convert degrees to radians
pub fn deg_to_rad(deg: f32) -> f32 {
    deg * PI / 180.0
}

/// Convert radians to degrees
pub fn rad_to_deg(rad: f32) -> f32 {
    rad * 180.0 / PI
}

/// Normalize an angle to the range (-π, π]
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return angle;
    }
    let mut result = angle % (2.0 * PI);
    if result > PI {
        result -= 2.0 * PI;
    } else if result <= -PI {
        result += 2.0 * PI;
    }
    result
}

/// Calculate the angular difference between two angles in radians
pub fn angle_diff(a: f32, b: f32) -> f32 {
    normalize_angle(a - b)
}

/// Convert a quaternion to Euler angles (roll, pitch, yaw) in radians
pub fn quaternion_to_euler(q: &na::UnitQuaternion<f32>) -> na::Vector3<f32> {
    let euler = q.euler_angles();
    na::Vector3::new(euler.0, euler.1, euler.2)
}

/// Convert Euler angles (roll, pitch, yaw) in radians to a quaternion
pub fn euler_to_quaternion(euler: &na::Vector3<f32>) -> na::UnitQuaternion<f32> {
    na::UnitQuaternion::from_euler_angles(euler.x, euler.y, euler.z)
}

/// Rotation about the world Z axis
pub fn yaw_rotation(angle: f32) -> na::UnitQuaternion<f32> {
    na::UnitQuaternion::from_axis_angle(&na::Vector3::z_axis(), angle)
}

/// Check that all four quaternion components are finite
pub fn is_finite_quaternion(q: &na::UnitQuaternion<f32>) -> bool {
    q.coords.iter().all(|v| v.is_finite())
}
