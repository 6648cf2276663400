use std::sync::{Arc, RwLock};

use ahrs::{Attitude, EulerAngles, FusionEngine, OrientationEstimate, Quaternion};
use driver::Mpu6050;
use hal::{CalibrationOffsets, Clock, ImuStatus, Transport};
use log::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::reader::{publish, OrientationReader, Published};

/// Result of one call to [`ImuService::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A sample was read and fused; a new estimate is published
    Updated,
    /// The read or the fusion step failed; the previous estimate stays published
    Skipped,
    /// No session is running
    NotReady,
}

/// Poll counters since the current session started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub updated: u64,
    pub skipped_io: u64,
    pub skipped_fusion: u64,
    pub not_ready: u64,
}

/// An open device with its calibration
struct Session<B, C> {
    imu: Mpu6050<B, C>,
    offsets: CalibrationOffsets,
}

/// One IMU orientation session on one bus
///
/// Owns the transport, the device (and so the bus handle) while a session is
/// running, and the fusion engine. Several services can run side by side on
/// different buses.
pub struct ImuService<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    config: ServiceConfig,
    engine: FusionEngine,
    session: Option<Session<T::Handle, C>>,
    published: Published,
    stats: PollStats,
}

impl<T: Transport, C: Clock + Clone> ImuService<T, C> {
    pub fn new(transport: T, clock: C, config: ServiceConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let engine = FusionEngine::new(config.fusion)?;
        Ok(Self {
            transport,
            clock,
            config,
            engine,
            session: None,
            published: Arc::new(RwLock::new(None)),
            stats: PollStats::default(),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Start a session; failures are logged and reported as `false`
    pub fn initialize(&mut self) -> bool {
        match self.try_initialize() {
            Ok(()) => true,
            Err(e) => {
                error!("IMU initialization on bus {} failed: {}", self.config.bus_id, e);
                false
            }
        }
    }

    /// Start a session, replacing any running one
    pub fn try_initialize(&mut self) -> Result<(), ServiceError> {
        self.shutdown();

        let bus_id = self.config.bus_id;
        info!("Initializing IMU on bus {}", bus_id);
        let bus = self.transport.open(bus_id)?;
        let mut imu = Mpu6050::new(bus, self.config.sensor, self.clock.clone());
        if !imu.test_connection()? {
            return Err(ServiceError::DeviceNotFound { bus_id });
        }

        self.engine.begin_calibration()?;
        let seeded = imu.initialize().map_err(ServiceError::from).and_then(|offsets| {
            let reference = imu.read_sample(&offsets)?;
            self.engine.complete_calibration(&reference)?;
            Ok(offsets)
        });
        let offsets = match seeded {
            Ok(offsets) => offsets,
            Err(e) => {
                self.engine.reset();
                return Err(e);
            }
        };

        self.stats = PollStats::default();
        publish(&self.published, self.engine.estimate());
        self.session = Some(Session { imu, offsets });
        info!("IMU on bus {} ready", bus_id);
        Ok(())
    }

    /// Read and fuse one sample
    pub fn poll(&mut self) -> PollOutcome {
        let session = match self.session.as_mut() {
            Some(session) if self.engine.is_ready() => session,
            _ => {
                self.stats.not_ready += 1;
                return PollOutcome::NotReady;
            }
        };

        let sample = match session.imu.read_sample(&session.offsets) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Skipping poll, sample read failed: {}", e);
                self.stats.skipped_io += 1;
                return PollOutcome::Skipped;
            }
        };

        if let Err(e) = self.engine.update(&sample) {
            warn!("Skipping poll, fusion rejected sample: {}", e);
            self.stats.skipped_fusion += 1;
            return PollOutcome::Skipped;
        }

        let estimate = self.engine.estimate();
        if let Some(estimate) = &estimate {
            debug!(
                "estimate #{} rotation {:?}",
                estimate.updates(),
                estimate.rotation()
            );
        }
        publish(&self.published, estimate);
        self.stats.updated += 1;
        PollOutcome::Updated
    }
}

impl<T: Transport, C: Clock> ImuService<T, C> {
    /// Stop the session and release the bus; later calls do nothing
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            drop(session.imu.release());
            info!("IMU on bus {} shut down", self.config.bus_id);
        }
        self.engine.reset();
        publish(&self.published, None);
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_some() && self.engine.is_ready()
    }

    /// Read handle for other threads
    pub fn reader(&self) -> OrientationReader {
        OrientationReader::new(Arc::clone(&self.published))
    }

    pub fn snapshot(&self) -> Option<OrientationEstimate> {
        self.reader().snapshot()
    }

    pub fn get_rotation(&self) -> EulerAngles {
        self.reader().get_rotation()
    }

    pub fn get_attitude(&self) -> Attitude {
        self.reader().get_attitude()
    }

    pub fn get_quaternion(&self) -> Quaternion {
        self.reader().get_quaternion()
    }

    pub fn get_rotation_rate(&self) -> EulerAngles {
        self.reader().get_rotation_rate()
    }

    pub fn get_stats(&self) -> PollStats {
        self.stats
    }

    /// Driver status of the running session
    pub fn get_status(&self) -> Option<ImuStatus> {
        self.session.as_ref().map(|s| s.imu.get_status())
    }
}

impl<T: Transport, C: Clock> Drop for ImuService<T, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
