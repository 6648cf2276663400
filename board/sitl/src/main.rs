use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use driver::{SimClock, SimTransport, SimulatedMpu6050};
use imu_service::ServiceConfig;
use log::info;
use nalgebra::Vector3;

mod session;

#[derive(Parser, Debug)]
#[command(version, about = "Run the IMU orientation service and log its output", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bus number, overrides the configuration
    #[arg(short, long)]
    bus: Option<u8>,

    /// Polling period in milliseconds, overrides the configuration
    #[arg(short, long)]
    period_ms: Option<u64>,

    /// How long to poll before shutting down
    #[arg(short, long, default_value_t = 5.0)]
    duration_s: f32,

    /// Yaw rate of the simulated chip in degrees per second
    #[arg(long, default_value_t = 45.0)]
    yaw_rate: f32,

    /// Use /dev/i2c-<bus> instead of the simulated chip
    #[cfg(feature = "linux")]
    #[arg(long)]
    hardware: bool,
}

fn load_config(args: &Args) -> anyhow::Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    if let Some(bus) = args.bus {
        config.bus_id = bus;
    }
    if let Some(period_ms) = args.period_ms {
        config.poll_period_ms = period_ms;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let duration = Duration::try_from_secs_f32(args.duration_s)
        .with_context(|| format!("invalid duration {}", args.duration_s))?;

    #[cfg(feature = "linux")]
    if args.hardware {
        info!("Using /dev/i2c-{}", config.bus_id);
        let transport = driver::LinuxTransport::new(config.sensor.address);
        return session::run(transport, driver::MonotonicClock::new(), config, duration, || {});
    }

    info!("Using a simulated MPU6050 on bus {}", config.bus_id);
    let clock = SimClock::realtime();
    let chip = SimulatedMpu6050::new(clock.clone());
    let transport = SimTransport::new().with_chip(config.bus_id, chip.clone());
    let yaw_rate = args.yaw_rate.to_radians();
    session::run(transport, clock, config, duration, move || {
        // start turning once calibration is done
        chip.set_angular_rate(Vector3::new(0.0, 0.0, yaw_rate));
    })
}
