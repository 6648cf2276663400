use core::time::Duration;

use nalgebra as na;

use crate::utils::{angle_diff, deg_to_rad, quaternion_to_euler, rad_to_deg};

/// Roll, pitch and yaw in degrees (or degrees per second for rates)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl EulerAngles {
    pub fn new(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self { roll, pitch, yaw }
    }

    fn from_radians(angles: &na::Vector3<f32>) -> Self {
        Self::new(rad_to_deg(angles.x), rad_to_deg(angles.y), rad_to_deg(angles.z))
    }
}

/// Tilt relative to gravity in degrees, heading excluded
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attitude {
    pub roll: f32,
    pub pitch: f32,
}

/// Plain quaternion components (w, x, y, z)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub fn norm(&self) -> f32 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

impl From<na::UnitQuaternion<f32>> for Quaternion {
    fn from(q: na::UnitQuaternion<f32>) -> Self {
        Self {
            w: q.w,
            x: q.i,
            y: q.j,
            z: q.k,
        }
    }
}

/// One published orientation, all fields derived from the same update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationEstimate {
    attitude: na::UnitQuaternion<f32>,
    euler: EulerAngles,
    rates: EulerAngles,
    timestamp: Duration,
    updates: u64,
}

impl OrientationEstimate {
    /// Estimate with zero Euler rates, used when seeding the filter
    pub fn new(attitude: na::UnitQuaternion<f32>, timestamp: Duration) -> Self {
        Self {
            attitude,
            euler: EulerAngles::from_radians(&quaternion_to_euler(&attitude)),
            rates: EulerAngles::default(),
            timestamp,
            updates: 0,
        }
    }

    /// Estimate following `previous`, with Euler rates over the elapsed time
    pub fn following(
        previous: &OrientationEstimate,
        attitude: na::UnitQuaternion<f32>,
        timestamp: Duration,
    ) -> Self {
        let mut next = Self::new(attitude, timestamp);
        next.updates = previous.updates + 1;

        let dt = timestamp.saturating_sub(previous.timestamp).as_secs_f32();
        if dt > 0.0 {
            let rate = |now: f32, before: f32| {
                rad_to_deg(angle_diff(deg_to_rad(now), deg_to_rad(before))) / dt
            };
            next.rates = EulerAngles::new(
                rate(next.euler.roll, previous.euler.roll),
                rate(next.euler.pitch, previous.euler.pitch),
                rate(next.euler.yaw, previous.euler.yaw),
            );
        }
        next
    }

    /// Unit quaternion mapping body frame to world frame
    pub fn orientation(&self) -> na::UnitQuaternion<f32> {
        self.attitude
    }

    pub fn quaternion(&self) -> Quaternion {
        self.attitude.into()
    }

    pub fn rotation(&self) -> EulerAngles {
        self.euler
    }

    pub fn attitude(&self) -> Attitude {
        Attitude {
            roll: self.euler.roll,
            pitch: self.euler.pitch,
        }
    }

    /// Euler angle rates in degrees per second
    pub fn rotation_rate(&self) -> EulerAngles {
        self.rates
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Number of fusion steps since the filter was seeded
    pub fn updates(&self) -> u64 {
        self.updates
    }
}
