// Licensed under the Apache-2.0 license

//! I2C System Setup Helper
//!
//! This module keeps the system-level parts of bringing up a bus apart from
//! the controller registers. Peripheral clock gating goes through the
//! `OpenProt` [`SystemControl`] trait with a [`ClockGate`] clock id; pin muxing
//! and the error interrupt line go through [`BoardControl`], which shares the
//! clock controller's error type.

use crate::i2c::common::{BusConfig, PinId, PinMode};
use crate::i2c::error::Error;
use openprot_hal_blocking::system_control::{ErrorType, SystemControl};

/// Enable bit of one peripheral clock on the node's clock controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockGate(pub u32);

impl From<&BusConfig> for ClockGate {
    fn from(bus: &BusConfig) -> Self {
        ClockGate(bus.clock_gate)
    }
}

/// Pin muxing and interrupt controller access.
pub trait BoardControl: ErrorType {
    /// Put `pin` into alternate-function mode `alt_function`.
    fn configure_pin(
        &mut self,
        pin: PinId,
        mode: PinMode,
        alt_function: u8,
    ) -> Result<(), Self::Error>;

    fn set_irq_priority(&mut self, irq: u16, priority: u8) -> Result<(), Self::Error>;

    fn enable_irq(&mut self, irq: u16) -> Result<(), Self::Error>;
}

/// Board services the bus initializer needs.
pub trait I2cPlatform: SystemControl<ClockId = ClockGate> + BoardControl {}

impl<T> I2cPlatform for T where T: SystemControl<ClockId = ClockGate> + BoardControl {}

/// Helper for I2C system control operations
pub struct I2cSystemSetup;

impl I2cSystemSetup {
    /// Enable the bus clock gate.
    ///
    /// # Errors
    ///
    /// [`Error::Platform`] if the clock controller refuses.
    pub fn power_on<S>(system: &mut S, bus: &BusConfig) -> Result<(), Error>
    where
        S: SystemControl<ClockId = ClockGate>,
    {
        system
            .enable(&ClockGate::from(bus))
            .map_err(|_| Error::Platform)
    }

    /// Disable the bus clock gate.
    ///
    /// # Errors
    ///
    /// [`Error::Platform`] if the clock controller refuses.
    pub fn power_off<S>(system: &mut S, bus: &BusConfig) -> Result<(), Error>
    where
        S: SystemControl<ClockId = ClockGate>,
    {
        system
            .disable(&ClockGate::from(bus))
            .map_err(|_| Error::Platform)
    }

    /// Route the controller's error interrupt.
    ///
    /// # Errors
    ///
    /// [`Error::Platform`] if the board refuses.
    pub fn enable_error_irq<S: BoardControl>(
        system: &mut S,
        bus: &BusConfig,
        priority: u8,
    ) -> Result<(), Error> {
        system
            .set_irq_priority(bus.error_irq, priority)
            .map_err(|_| Error::Platform)?;
        system
            .enable_irq(bus.error_irq)
            .map_err(|_| Error::Platform)
    }

    /// Mux SCL then SDA to the controller.
    ///
    /// # Errors
    ///
    /// [`Error::Platform`] if the board refuses.
    pub fn configure_pins<S: BoardControl>(system: &mut S, bus: &BusConfig) -> Result<(), Error> {
        for pin in [bus.scl, bus.sda] {
            system
                .configure_pin(pin, bus.pin_mode, bus.alt_function)
                .map_err(|_| Error::Platform)?;
        }
        Ok(())
    }
}
