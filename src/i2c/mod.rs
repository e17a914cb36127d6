// Licensed under the Apache-2.0 license

//! I2C master driver of the sensor node.
//!
//! Blocking, 7-bit, master-only transfers over up to [`MAX_BUSES`]
//! controllers, each guarded by its own lock and recovered by a software reset
//! whenever the error interrupt reports a fault or a status flag never shows
//! up. Usable from `no_std` firmware and from host tests alike.

pub mod common;
pub mod error;
pub mod fault;
pub mod hardware_instantiation;
pub mod i2c_controller;
pub mod lock;
pub mod registers;
pub mod system_setup;
pub mod timing;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use common::{
    BusConfig, BusConfigBuilder, ControllerConfig, ControllerConfigBuilder, PinId, PinMode, Speed,
    TimingConfig,
};
pub use error::Error;
pub use fault::BusFault;
pub use hardware_instantiation::{I2cMaster, MAX_BUSES};
pub use i2c_controller::I2cController;
pub use lock::BusGuard;
pub use registers::Mmio;
pub use system_setup::{BoardControl, ClockGate, I2cPlatform};
pub use traits::{BusLock, Instant, Monotonic, RegisterBlock};

#[cfg(any(test, feature = "std"))]
pub use traits::StdClock;
