#![no_std]
extern crate nalgebra;

mod bus;
mod clock;
mod imu;
mod types;

pub use bus::*;
pub use clock::*;
pub use imu::*;
pub use types::*;
