use std::f32::consts::FRAC_PI_2;
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use driver::mpu6050::registers::GYRO_CONFIG;
use driver::{SimClock, SimTransport, SimulatedMpu6050};
use imu_service::{
    Attitude, EulerAngles, ImuService, PollOutcome, PollingLoop, Quaternion, ServiceConfig,
    ServiceError,
};
use nalgebra::{UnitQuaternion, Vector3};

const BUS: u8 = 1;

struct Rig {
    service: ImuService<SimTransport, SimClock>,
    chip: SimulatedMpu6050,
    transport: SimTransport,
    clock: SimClock,
}

fn rig_on(bus_id: u8) -> Rig {
    let clock = SimClock::new();
    let chip = SimulatedMpu6050::new(clock.clone());
    let transport = SimTransport::new().with_chip(bus_id, chip.clone());
    let config = ServiceConfig {
        bus_id,
        ..Default::default()
    };
    let service = ImuService::new(transport.clone(), clock.clone(), config).unwrap();
    Rig {
        service,
        chip,
        transport,
        clock,
    }
}

fn rig() -> Rig {
    rig_on(BUS)
}

impl Rig {
    /// Advance simulated time by one period and poll
    fn step(&mut self) -> PollOutcome {
        self.clock.advance(Duration::from_millis(10));
        self.service.poll()
    }
}

fn assert_identity(service: &ImuService<SimTransport, SimClock>) {
    assert_eq!(service.get_quaternion(), Quaternion { w: 1.0, x: 0.0, y: 0.0, z: 0.0 });
    assert_eq!(service.get_rotation(), EulerAngles::default());
    assert_eq!(service.get_attitude(), Attitude::default());
    assert_eq!(service.get_rotation_rate(), EulerAngles::default());
}

#[test]
fn getters_before_initialize_return_identity() {
    let mut rig = rig();
    assert!(!rig.service.is_ready());
    assert_identity(&rig.service);
    assert_eq!(rig.service.poll(), PollOutcome::NotReady);
    assert_eq!(rig.service.get_stats().not_ready, 1);
    assert!(rig.service.get_status().is_none());
}

#[test]
fn initialize_publishes_level_estimate() {
    let mut rig = rig();
    assert!(rig.service.initialize());
    assert!(rig.service.is_ready());
    assert!(rig.transport.is_claimed(BUS));

    let estimate = rig.service.snapshot().unwrap();
    assert_eq!(estimate.updates(), 0);
    assert_relative_eq!(rig.service.get_quaternion().w, 1.0, epsilon = 1e-5);

    let status = rig.service.get_status().unwrap();
    assert!(status.calibrated);
    assert!(status.healthy);
}

#[test]
fn initialize_fails_without_device() {
    let clock = SimClock::new();
    let transport = SimTransport::new();
    let config = ServiceConfig {
        bus_id: 4,
        ..Default::default()
    };
    let mut service = ImuService::new(transport, clock, config).unwrap();
    assert!(!service.initialize());
    assert!(matches!(
        service.try_initialize(),
        Err(ServiceError::Transport(_))
    ));
    assert_identity(&service);
}

#[test]
fn initialize_fails_on_unknown_chip() {
    let mut rig = rig();
    rig.chip.set_identity(0x71);
    assert!(matches!(
        rig.service.try_initialize(),
        Err(ServiceError::DeviceNotFound { bus_id: BUS })
    ));
    assert!(!rig.transport.is_claimed(BUS));
}

#[test]
fn initialize_fails_when_moved_during_calibration() {
    let mut rig = rig();
    rig.chip.set_angular_rate(Vector3::new(2.0, 0.0, 0.0));
    assert!(!rig.service.initialize());
    assert!(!rig.service.is_ready());
    assert_identity(&rig.service);
    // the failed session released the bus
    assert!(!rig.transport.is_claimed(BUS));

    // the tumble left the chip rolled over; retry once it is still and level
    rig.chip.set_angular_rate(Vector3::zeros());
    rig.chip.set_orientation(UnitQuaternion::identity());
    assert!(rig.service.initialize());
    assert!(rig.service.is_ready());
}

#[test]
fn initialize_fails_while_turning_steadily() {
    let mut rig = rig();
    rig.chip.set_angular_rate(Vector3::new(0.0, 0.0, 1.0));
    assert!(!rig.service.initialize());
    assert!(!rig.service.is_ready());
    assert!(!rig.transport.is_claimed(BUS));

    // a steady turn must never be absorbed into the gyro bias
    rig.chip.set_angular_rate(Vector3::zeros());
    assert!(rig.service.initialize());
    rig.chip.set_angular_rate(Vector3::new(0.0, 0.0, 1.0));
    for _ in 0..100 {
        assert_eq!(rig.step(), PollOutcome::Updated);
    }
    assert_relative_eq!(rig.service.get_rotation().yaw, 57.3, epsilon = 0.5);
}

#[test]
fn initialize_fails_on_rejected_configuration_write() {
    let mut rig = rig();
    rig.chip.reject_writes_to(GYRO_CONFIG);
    assert!(matches!(
        rig.service.try_initialize(),
        Err(ServiceError::Driver(_))
    ));
    assert!(!rig.service.is_ready());
}

#[test]
fn held_bus_cannot_be_opened_twice() {
    let mut first = rig();
    assert!(first.service.initialize());

    let mut second =
        ImuService::new(first.transport.clone(), first.clock.clone(), ServiceConfig::default())
            .unwrap();
    assert!(!second.initialize());

    first.service.shutdown();
    assert!(second.initialize());
}

#[test]
fn still_pose_keeps_identity() {
    let mut rig = rig();
    assert!(rig.service.initialize());
    for _ in 0..100 {
        assert_eq!(rig.step(), PollOutcome::Updated);
    }

    let rotation = rig.service.get_rotation();
    assert_relative_eq!(rotation.roll, 0.0, epsilon = 0.1);
    assert_relative_eq!(rotation.pitch, 0.0, epsilon = 0.1);
    assert_relative_eq!(rotation.yaw, 0.0, epsilon = 0.1);

    let q = rig.service.get_quaternion();
    assert_relative_eq!(q.w, 1.0, epsilon = 1e-4);
    assert_relative_eq!(q.x, 0.0, epsilon = 1e-3);
    assert_relative_eq!(q.y, 0.0, epsilon = 1e-3);
    assert_relative_eq!(q.z, 0.0, epsilon = 1e-3);
    assert_eq!(rig.service.get_stats().updated, 100);
}

#[test]
fn constant_yaw_rate_reaches_ninety_degrees() {
    let mut rig = rig();
    assert!(rig.service.initialize());
    rig.chip.set_angular_rate(Vector3::new(0.0, 0.0, FRAC_PI_2));
    for _ in 0..100 {
        assert_eq!(rig.step(), PollOutcome::Updated);
    }

    assert_relative_eq!(rig.service.get_rotation().yaw, 90.0, epsilon = 0.5);
    assert_relative_eq!(rig.service.get_rotation_rate().yaw, 90.0, epsilon = 1.0);

    let q = rig.service.get_quaternion();
    let half = FRAC_PI_2 / 2.0;
    assert_relative_eq!(q.w, half.cos(), epsilon = 5e-3);
    assert_relative_eq!(q.z, half.sin(), epsilon = 5e-3);
    assert_relative_eq!(q.norm(), 1.0, epsilon = 1e-6);
}

#[test]
fn single_transient_error_is_retried() {
    let mut rig = rig();
    assert!(rig.service.initialize());
    rig.chip.fail_next_reads(1);
    assert_eq!(rig.step(), PollOutcome::Updated);
    assert_eq!(rig.service.get_stats().skipped_io, 0);
}

#[test]
fn two_consecutive_errors_leave_estimate_unchanged() {
    let mut rig = rig();
    assert!(rig.service.initialize());
    rig.chip.set_angular_rate(Vector3::new(0.0, 0.0, 0.5));
    for _ in 0..10 {
        rig.step();
    }
    let before = rig.service.snapshot();

    rig.chip.fail_next_reads(1);
    rig.chip.stall_next_reads(1);
    assert_eq!(rig.step(), PollOutcome::Skipped);
    assert_eq!(rig.service.snapshot(), before);
    assert_eq!(rig.service.get_stats().skipped_io, 1);
    assert_eq!(rig.service.get_status().unwrap().consecutive_errors, 2);

    // the session continues with the next poll
    assert_eq!(rig.step(), PollOutcome::Updated);
}

#[test]
fn repeated_timestamp_is_skipped() {
    let mut rig = rig();
    assert!(rig.service.initialize());
    // no time has passed since the reference sample
    assert_eq!(rig.service.poll(), PollOutcome::Skipped);
    assert_eq!(rig.service.get_stats().skipped_fusion, 1);
    assert_eq!(rig.step(), PollOutcome::Updated);
}

#[test]
fn shutdown_is_idempotent() {
    let mut rig = rig();
    assert!(rig.service.initialize());
    rig.step();

    rig.service.shutdown();
    assert!(!rig.service.is_ready());
    assert!(!rig.transport.is_claimed(BUS));
    assert_identity(&rig.service);

    rig.service.shutdown();
    assert!(!rig.service.is_ready());
    assert_identity(&rig.service);
    assert_eq!(rig.service.poll(), PollOutcome::NotReady);

    // a new session can follow
    assert!(rig.service.initialize());
}

#[test]
fn readers_on_other_threads_see_unit_quaternions() {
    let mut rig = rig();
    assert!(rig.service.initialize());
    rig.chip.set_angular_rate(Vector3::new(0.3, -0.2, 1.0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let reader = rig.service.reader();
            thread::spawn(move || {
                for _ in 0..500 {
                    let q = reader.get_quaternion();
                    assert!((q.norm() - 1.0).abs() < 1e-5, "norm {}", q.norm());
                }
            })
        })
        .collect();

    for _ in 0..500 {
        rig.step();
    }
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn instances_on_different_buses_are_independent() {
    let mut a = rig_on(1);
    let mut b = rig_on(2);
    assert!(a.service.initialize());
    assert!(b.service.initialize());

    a.chip.set_angular_rate(Vector3::new(0.0, 0.0, FRAC_PI_2));
    for _ in 0..50 {
        a.step();
        b.step();
    }
    assert_relative_eq!(a.service.get_rotation().yaw, 45.0, epsilon = 0.5);
    assert_relative_eq!(b.service.get_rotation().yaw, 0.0, epsilon = 0.1);

    a.service.shutdown();
    assert!(b.service.is_ready());
}

#[test]
fn polling_loop_advances_estimate_and_stops() {
    let clock = SimClock::realtime();
    let chip = SimulatedMpu6050::new(clock.clone());
    let transport = SimTransport::new().with_chip(BUS, chip.clone());
    let mut config = ServiceConfig {
        bus_id: BUS,
        poll_period_ms: 5,
        ..Default::default()
    };
    config.sensor.calibration_samples = 10;
    config.sensor.calibration_interval_ms = 1;
    config.sensor.read_timeout_ms = 50;

    let mut service = ImuService::new(transport.clone(), clock, config).unwrap();
    assert!(service.initialize());
    chip.set_angular_rate(Vector3::new(0.0, 0.0, 0.5));

    let polling = PollingLoop::start(service, config.poll_period());
    let reader = polling.reader();
    thread::sleep(Duration::from_millis(300));
    let snapshot = reader.snapshot().unwrap();
    assert!(snapshot.updates() > 5, "updates {}", snapshot.updates());
    assert!(reader.get_rotation().yaw > 1.0);

    let mut service = polling.stop().unwrap();
    let updated = service.get_stats().updated;
    assert!(updated >= snapshot.updates());
    assert!(transport.is_claimed(BUS));

    service.shutdown();
    assert!(!reader.is_ready());
    assert!(!transport.is_claimed(BUS));
}
