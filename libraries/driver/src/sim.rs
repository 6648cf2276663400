//! Simulated MPU-6050 for software-in-the-loop runs and tests
//!
//! The chip keeps a register file, integrates a commanded body rotation rate
//! against a shared simulated clock and answers burst reads of the data
//! registers with the matching accelerometer and gyroscope counts. Faults can
//! be injected through the [`SimulatedMpu6050`] control handle while a bus
//! handle is in use elsewhere.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use hal::{BusError, Clock, RegisterBus, Transport, TransportError, DEFAULT_BUS_TIMEOUT};
use nalgebra::{UnitQuaternion, Vector3};

use crate::claim::{BusClaim, ClaimRegistry};
use crate::mpu6050::config::{AccelRange, GyroRange};
use crate::mpu6050::registers::{
    ACCEL_CONFIG, ACCEL_XOUT_H, GYRO_CONFIG, GYRO_ZOUT_L, MPU6050_WHO_AM_I_VALUE, PWR_MGMT_1,
    PWR_MGMT_1_DEVICE_RESET, PWR_MGMT_1_SLEEP, TEMP_OFFSET, TEMP_SENSITIVITY, WHO_AM_I,
};

const REGISTER_COUNT: usize = 128;

/// Simulated time shared by the chip model and the driver
///
/// A manual clock only moves through [`SimClock::advance`] and `delay`, so
/// tests run without sleeping. A real-time clock follows the wall clock and
/// sleeps on `delay`.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    micros: Arc<AtomicU64>,
    origin: Option<Instant>,
}

impl SimClock {
    /// Manual clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock following the wall clock from now on
    pub fn realtime() -> Self {
        Self {
            micros: Arc::default(),
            origin: Some(Instant::now()),
        }
    }

    /// Move the clock forward without waiting
    pub fn advance(&self, duration: Duration) {
        self.micros
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        let offset = Duration::from_micros(self.micros.load(Ordering::SeqCst));
        match self.origin {
            Some(origin) => origin.elapsed() + offset,
            None => offset,
        }
    }

    fn delay(&self, duration: Duration) {
        match self.origin {
            Some(_) => thread::sleep(duration),
            None => self.advance(duration),
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    failed_reads: u32,
    stalled_reads: u32,
    rejected_register: Option<u8>,
    disconnected: bool,
}

#[derive(Debug)]
struct ChipState {
    registers: [u8; REGISTER_COUNT],
    orientation: UnitQuaternion<f32>,
    angular_rate: Vector3<f32>,
    accel_bias: Vector3<f32>,
    gyro_bias: Vector3<f32>,
    temperature: f32,
    identity: u8,
    last_time: Duration,
    faults: Faults,
    transactions: u64,
}

impl ChipState {
    fn power_on() -> Self {
        let mut state = Self {
            registers: [0; REGISTER_COUNT],
            orientation: UnitQuaternion::identity(),
            angular_rate: Vector3::zeros(),
            accel_bias: Vector3::zeros(),
            gyro_bias: Vector3::zeros(),
            temperature: 25.0,
            identity: MPU6050_WHO_AM_I_VALUE,
            last_time: Duration::ZERO,
            faults: Faults::default(),
            transactions: 0,
        };
        state.reset_registers();
        state
    }

    fn reset_registers(&mut self) {
        self.registers = [0; REGISTER_COUNT];
        self.registers[PWR_MGMT_1 as usize] = PWR_MGMT_1_SLEEP;
        self.registers[WHO_AM_I as usize] = self.identity;
    }

    fn advance(&mut self, now: Duration) {
        if now <= self.last_time {
            return;
        }
        let dt = (now - self.last_time).as_secs_f32();
        self.orientation *= UnitQuaternion::from_scaled_axis(self.angular_rate * dt);
        self.orientation.renormalize();
        self.last_time = now;
    }

    fn is_sleeping(&self) -> bool {
        self.registers[PWR_MGMT_1 as usize] & PWR_MGMT_1_SLEEP != 0
    }

    /// Contents of the 14 data registers for the current motion state
    fn data_registers(&self) -> [u8; 14] {
        let mut data = [0u8; 14];
        if self.is_sleeping() {
            return data;
        }
        let accel_range = AccelRange::from_register(self.registers[ACCEL_CONFIG as usize]);
        let gyro_range = GyroRange::from_register(self.registers[GYRO_CONFIG as usize]);

        let up_body = self.orientation.inverse() * Vector3::z();
        let accel = (up_body + self.accel_bias) * accel_range.lsb_per_g();
        let gyro = (self.angular_rate + self.gyro_bias).map(f32::to_degrees) * gyro_range.lsb_per_dps();
        let temp = (self.temperature - TEMP_OFFSET) * TEMP_SENSITIVITY;

        let words = [accel.x, accel.y, accel.z, temp, gyro.x, gyro.y, gyro.z];
        for (i, word) in words.iter().enumerate() {
            let counts = word.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            data[2 * i..2 * i + 2].copy_from_slice(&counts.to_be_bytes());
        }
        data
    }
}

/// Control handle of one simulated MPU-6050
///
/// Cloning the handle shares the same chip.
#[derive(Debug, Clone)]
pub struct SimulatedMpu6050 {
    state: Arc<Mutex<ChipState>>,
    clock: SimClock,
}

impl SimulatedMpu6050 {
    pub fn new(clock: SimClock) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChipState::power_on())),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Rotate the chip at a constant body rate (rad/s) from now on
    pub fn set_angular_rate(&self, rate: Vector3<f32>) {
        let now = self.clock.now();
        let mut state = self.lock();
        state.advance(now);
        state.angular_rate = rate;
    }

    pub fn set_orientation(&self, orientation: UnitQuaternion<f32>) {
        let now = self.clock.now();
        let mut state = self.lock();
        state.advance(now);
        state.orientation = orientation;
    }

    /// True orientation of the chip at the current simulated time
    pub fn orientation(&self) -> UnitQuaternion<f32> {
        let now = self.clock.now();
        let mut state = self.lock();
        state.advance(now);
        state.orientation
    }

    /// Constant sensor bias added to every reading (g, rad/s)
    pub fn set_bias(&self, accel_bias: Vector3<f32>, gyro_bias: Vector3<f32>) {
        let mut state = self.lock();
        state.accel_bias = accel_bias;
        state.gyro_bias = gyro_bias;
    }

    pub fn set_temperature(&self, celsius: f32) {
        self.lock().temperature = celsius;
    }

    /// Make the next `count` reads fail with a NACK
    pub fn fail_next_reads(&self, count: u32) {
        self.lock().faults.failed_reads = count;
    }

    /// Make the next `count` reads overrun their timeout
    pub fn stall_next_reads(&self, count: u32) {
        self.lock().faults.stalled_reads = count;
    }

    /// Acknowledge but ignore writes to one register
    pub fn reject_writes_to(&self, register: u8) {
        self.lock().faults.rejected_register = Some(register);
    }

    /// Answer WHO_AM_I with another identity, as a different part would
    pub fn set_identity(&self, whoami: u8) {
        let mut state = self.lock();
        state.identity = whoami;
        state.registers[WHO_AM_I as usize] = whoami;
    }

    /// Unplug (or replug) the chip; a disconnected chip NACKs everything
    pub fn set_connected(&self, connected: bool) {
        self.lock().faults.disconnected = !connected;
    }

    pub fn register(&self, register: u8) -> u8 {
        self.lock().registers[register as usize % REGISTER_COUNT]
    }

    /// Number of completed or attempted bus transactions
    pub fn transactions(&self) -> u64 {
        self.lock().transactions
    }

    fn read(&self, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        let now = self.clock.now();
        let mut state = self.lock();
        state.transactions += 1;
        if state.faults.disconnected {
            return Err(BusError::Nack);
        }
        if state.faults.failed_reads > 0 {
            state.faults.failed_reads -= 1;
            return Err(BusError::Nack);
        }
        if state.faults.stalled_reads > 0 {
            state.faults.stalled_reads -= 1;
            return Err(BusError::Timeout);
        }

        state.advance(now);
        let mut registers = state.registers;
        let end = reg as usize + buf.len();
        if (reg as usize) <= GYRO_ZOUT_L as usize && end > ACCEL_XOUT_H as usize {
            let data = state.data_registers();
            let start = ACCEL_XOUT_H as usize;
            registers[start..start + data.len()].copy_from_slice(&data);
        }
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = registers
                .get(reg as usize + i)
                .copied()
                .unwrap_or_default();
        }
        Ok(())
    }

    fn write(&self, reg: u8, value: u8) -> Result<(), BusError> {
        let mut state = self.lock();
        state.transactions += 1;
        if state.faults.disconnected {
            return Err(BusError::Nack);
        }
        if state.faults.rejected_register == Some(reg) || reg == WHO_AM_I {
            return Ok(());
        }
        if reg == PWR_MGMT_1 && value & PWR_MGMT_1_DEVICE_RESET != 0 {
            state.reset_registers();
            return Ok(());
        }
        if let Some(slot) = state.registers.get_mut(reg as usize) {
            *slot = value;
        }
        Ok(())
    }
}

/// Register bus connected to a simulated chip
#[derive(Debug)]
pub struct SimBus {
    chip: SimulatedMpu6050,
    timeout: Duration,
    _claim: BusClaim,
}

impl RegisterBus for SimBus {
    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.chip.read(reg, buf)
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), BusError> {
        self.chip.write(reg, value)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Transport exposing simulated chips by bus id
#[derive(Debug, Clone, Default)]
pub struct SimTransport {
    chips: HashMap<u8, SimulatedMpu6050>,
    claims: ClaimRegistry,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a chip to a bus id
    pub fn with_chip(mut self, bus_id: u8, chip: SimulatedMpu6050) -> Self {
        self.chips.insert(bus_id, chip);
        self
    }

    pub fn is_claimed(&self, bus_id: u8) -> bool {
        self.claims.is_claimed(bus_id)
    }
}

impl Transport for SimTransport {
    type Handle = SimBus;

    fn open(&mut self, bus_id: u8) -> Result<Self::Handle, TransportError> {
        let chip = self
            .chips
            .get(&bus_id)
            .cloned()
            .ok_or(TransportError::NotFound(bus_id))?;
        let claim = self.claims.claim(bus_id)?;
        Ok(SimBus {
            chip,
            timeout: DEFAULT_BUS_TIMEOUT,
            _claim: claim,
        })
    }
}
