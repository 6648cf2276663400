use std::sync::{Arc, PoisonError, RwLock};

use ahrs::{Attitude, EulerAngles, OrientationEstimate, Quaternion};

/// Shared slot holding the last published estimate
pub(crate) type Published = Arc<RwLock<Option<OrientationEstimate>>>;

/// Read-only view of a session's published orientation
///
/// Every getter copies the whole estimate under one read lock, so values
/// never mix two updates. Before the session is ready (and after shutdown)
/// the getters return the identity quaternion and zero angles.
#[derive(Debug, Clone)]
pub struct OrientationReader {
    published: Published,
}

impl OrientationReader {
    pub(crate) fn new(published: Published) -> Self {
        Self { published }
    }

    /// Last published estimate, if any
    pub fn snapshot(&self) -> Option<OrientationEstimate> {
        *self.published.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Roll, pitch and yaw in degrees
    pub fn get_rotation(&self) -> EulerAngles {
        self.snapshot().map(|e| e.rotation()).unwrap_or_default()
    }

    /// Roll and pitch in degrees
    pub fn get_attitude(&self) -> Attitude {
        self.snapshot().map(|e| e.attitude()).unwrap_or_default()
    }

    pub fn get_quaternion(&self) -> Quaternion {
        self.snapshot().map(|e| e.quaternion()).unwrap_or_default()
    }

    /// Euler angle rates in degrees per second
    pub fn get_rotation_rate(&self) -> EulerAngles {
        self.snapshot().map(|e| e.rotation_rate()).unwrap_or_default()
    }
}

pub(crate) fn publish(published: &Published, estimate: Option<OrientationEstimate>) {
    *published.write().unwrap_or_else(PoisonError::into_inner) = estimate;
}
