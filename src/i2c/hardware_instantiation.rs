// Licensed under the Apache-2.0 license

//! # Bus table of the sensor node
//!
//! [`I2cMaster`] owns up to [`MAX_BUSES`] controllers of one register-block
//! type together with the services they share: board setup, the clock used to
//! bound polling, the logger and the controller-wide configuration.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let master = I2cMaster::new(
//!     [I2cController::new(regs, lock, bus_config)],
//!     board,
//!     clock,
//!     NoOpLogger,
//!     ControllerConfigBuilder::new().peripheral_clock_hz(8_000_000).build(),
//! );
//! master.init(0, Speed::Normal)?;
//!
//! let mut bus = master.acquire(0)?;
//! let id = bus.read_reg(0x1d, 0x0f)?;
//! bus.release();
//! ```
//!
//! The error interrupt vector of bus `n` calls `master.on_error_interrupt(n)`.

use crate::common::Logger;
use crate::i2c::common::{ControllerConfig, Speed};
use crate::i2c::error::Error;
use crate::i2c::fault::BusFault;
use crate::i2c::i2c_controller::{Engine, I2cController};
use crate::i2c::lock::BusGuard;
use crate::i2c::registers::{cr1, Register};
use crate::i2c::system_setup::{I2cPlatform, I2cSystemSetup};
use crate::i2c::timing;
use crate::i2c::traits::{BusLock, Monotonic, RegisterBlock};
use core::cell::RefCell;
use critical_section::Mutex;

/// Controllers available on the node.
pub const MAX_BUSES: usize = 4;

pub struct I2cMaster<R, M, S, C, L, const N: usize>
where
    R: RegisterBlock,
    M: BusLock,
{
    buses: [I2cController<R, M>; N],
    system: Mutex<RefCell<S>>,
    clock: C,
    logger: L,
    config: ControllerConfig,
}

impl<R, M, S, C, L, const N: usize> I2cMaster<R, M, S, C, L, N>
where
    R: RegisterBlock,
    M: BusLock,
    S: I2cPlatform,
    C: Monotonic,
    L: Logger,
{
    pub fn new(
        buses: [I2cController<R, M>; N],
        system: S,
        clock: C,
        logger: L,
        config: ControllerConfig,
    ) -> Self {
        const { assert!(N <= MAX_BUSES, "too many I2C buses") };
        Self {
            buses,
            system: Mutex::new(RefCell::new(system)),
            clock,
            logger,
            config,
        }
    }

    #[must_use]
    pub fn bus_count(&self) -> usize {
        N
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// # Errors
    ///
    /// [`Error::InvalidBus`] for an index past the table.
    pub fn controller(&self, bus: usize) -> Result<&I2cController<R, M>, Error> {
        self.buses.get(bus).ok_or(Error::InvalidBus)
    }

    /// Run `f` on the board services inside a critical section.
    pub fn with_system<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        critical_section::with(|cs| f(&mut *self.system.borrow_ref_mut(cs)))
    }

    fn engine<'a>(&'a self, controller: &'a I2cController<R, M>, bus: usize) -> Engine<'a, R, C, L> {
        Engine {
            regs: &controller.regs,
            fault: &controller.fault,
            clock: &self.clock,
            logger: &self.logger,
            busy_timeout: self.config.busy_timeout,
            poll_timeout: self.config.poll_timeout,
            bus,
        }
    }

    /// Bring `bus` up at `speed`.
    ///
    /// Powers the controller, routes its error interrupt and pins, then
    /// programs the timing register and enables it. When no prescaler fits,
    /// the controller is left disabled with its timing register untouched.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBus`], [`Error::InvalidSpeed`],
    /// [`Error::NoValidPrescaler`] or [`Error::Platform`].
    pub fn init(&self, bus: usize, speed: Speed) -> Result<(), Error> {
        let controller = self.controller(bus)?;
        if speed.phase_minimums().is_none() {
            return Err(Error::InvalidSpeed);
        }

        self.with_system(|system| I2cSystemSetup::power_on(system, &controller.config))?;
        controller.regs.clear_bits(Register::Cr1, cr1::PE);
        self.with_system(|system| {
            I2cSystemSetup::enable_error_irq(system, &controller.config, self.config.irq_priority)?;
            I2cSystemSetup::configure_pins(system, &controller.config)
        })?;

        let timing = timing::compute(speed, self.config.peripheral_clock_hz).inspect_err(|e| {
            self.logger.error(format_args!(
                "i2c{}: {:?} at {} Hz: {}",
                bus, speed, self.config.peripheral_clock_hz, e
            ));
        })?;
        self.engine(controller, bus).configure(timing.bits());

        self.logger.debug(format_args!(
            "i2c{}: up, timing {:#010x} (prescaler {})",
            bus,
            timing.bits(),
            timing.prescaler
        ));
        Ok(())
    }

    /// Block until `bus` is free and take it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBus`]; no lock is touched in that case.
    pub fn acquire(&self, bus: usize) -> Result<BusGuard<'_, R, M, C, L>, Error> {
        let controller = self.controller(bus)?;
        let held = controller.lock.lock();
        self.logger.debug(format_args!("i2c{bus}: acquired"));
        Ok(BusGuard::new(self.engine(controller, bus), held))
    }

    /// Give a bus back. Same as dropping the guard.
    pub fn release(&self, guard: BusGuard<'_, R, M, C, L>) {
        guard.release();
    }

    /// Enable the bus clock gate.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBus`] or [`Error::Platform`].
    pub fn power_on(&self, bus: usize) -> Result<(), Error> {
        let controller = self.controller(bus)?;
        self.with_system(|system| I2cSystemSetup::power_on(system, &controller.config))
    }

    /// Wait for the bus to go idle, then gate its clock.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBus`], [`Error::Platform`], or
    /// `Error::Fault(BusFault::Timeout)` when the bus never goes idle.
    pub fn power_off(&self, bus: usize) -> Result<(), Error> {
        let controller = self.controller(bus)?;
        self.engine(controller, bus).wait_idle().inspect_err(|_| {
            self.logger
                .warn(format_args!("i2c{bus}: still busy, clock left on"));
        })?;
        self.with_system(|system| I2cSystemSetup::power_off(system, &controller.config))
    }

    /// Error interrupt entry for `bus`. Unknown indices are ignored.
    pub fn on_error_interrupt(&self, bus: usize) {
        if let Some(controller) = self.buses.get(bus) {
            controller.on_error_interrupt();
        }
    }

    /// Most recent fault recorded on `bus`.
    #[must_use]
    pub fn last_fault(&self, bus: usize) -> Option<BusFault> {
        self.buses.get(bus).and_then(I2cController::last_fault)
    }
}
