use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use hal::{Clock, Transport};
use imu_service::{ImuService, OrientationReader, PollingLoop, ServiceConfig};
use log::info;

/// How often the published orientation is logged
const REPORT_PERIOD: Duration = Duration::from_millis(250);

/// Initialize a service, poll it for `duration` and log the orientation
///
/// `on_ready` runs once the session is calibrated, before polling starts.
pub fn run<T, C>(
    transport: T,
    clock: C,
    config: ServiceConfig,
    duration: Duration,
    on_ready: impl FnOnce(),
) -> anyhow::Result<()>
where
    T: Transport + Send + 'static,
    T::Handle: Send + 'static,
    C: Clock + Clone + Send + 'static,
{
    let mut service =
        ImuService::new(transport, clock, config).context("invalid service configuration")?;
    if !service.initialize() {
        bail!("IMU initialization on bus {} failed", config.bus_id);
    }
    on_ready();

    let running = PollingLoop::start(service, config.poll_period());
    let reader = running.reader();
    let started = Instant::now();
    while started.elapsed() < duration {
        thread::sleep(REPORT_PERIOD);
        report(&reader);
    }

    let mut service = running.stop()?;
    let stats = service.get_stats();
    info!(
        "Polls: {} updated, {} skipped on I/O, {} skipped by fusion",
        stats.updated, stats.skipped_io, stats.skipped_fusion
    );
    service.shutdown();
    Ok(())
}

fn report(reader: &OrientationReader) {
    let rotation = reader.get_rotation();
    let attitude = reader.get_attitude();
    let q = reader.get_quaternion();
    let rate = reader.get_rotation_rate();
    info!(
        "rotation r={:7.2} p={:7.2} y={:7.2} | attitude r={:7.2} p={:7.2} | q=({:.4}, {:.4}, {:.4}, {:.4}) | yaw rate {:.1}°/s",
        rotation.roll,
        rotation.pitch,
        rotation.yaw,
        attitude.roll,
        attitude.pitch,
        q.w,
        q.x,
        q.y,
        q.z,
        rate.yaw
    );
}
