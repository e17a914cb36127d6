// Licensed under the Apache-2.0 license

//! Common types for the I2C master driver.
//!
//! Speed classes, the derived timing register contents, and the controller and
//! per-bus configuration consumed by
//! [`I2cMaster`](super::hardware_instantiation::I2cMaster).

use crate::i2c::error::Error;
use fugit::MicrosDurationU64;

/// Bus speed classes known to the node's board support.
///
/// Only [`Speed::Normal`] and [`Speed::Fast`] have timing tables; the others
/// are rejected by the initializer with [`Error::InvalidSpeed`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Speed {
    Low = 0,
    Normal = 1,
    Fast = 2,
    FastPlus = 3,
    High = 4,
}

impl TryFrom<u8> for Speed {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Speed::Low),
            1 => Ok(Speed::Normal),
            2 => Ok(Speed::Fast),
            3 => Ok(Speed::FastPlus),
            4 => Ok(Speed::High),
            _ => Err(Error::InvalidSpeed),
        }
    }
}

/// Minimum bus phase durations for a speed class, in nanoseconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PhaseMinimums {
    pub scl_high_ns: u32,
    pub scl_low_ns: u32,
    pub sda_hold_ns: u32,
    pub sda_setup_ns: u32,
}

impl Speed {
    /// Phase minimums for this speed class, if it is supported.
    #[must_use]
    pub const fn phase_minimums(self) -> Option<PhaseMinimums> {
        match self {
            Speed::Normal => Some(PhaseMinimums {
                scl_high_ns: 4000,
                scl_low_ns: 4700,
                sda_hold_ns: 500,
                sda_setup_ns: 1250,
            }),
            Speed::Fast => Some(PhaseMinimums {
                scl_high_ns: 600,
                scl_low_ns: 1300,
                sda_hold_ns: 375,
                sda_setup_ns: 500,
            }),
            Speed::Low | Speed::FastPlus | Speed::High => None,
        }
    }
}

/// Contents of the timing register.
///
/// Tick counts are stored as counted, not as the `n - 1` values the register
/// holds; [`TimingConfig::bits`] applies the encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingConfig {
    pub prescaler: u8,
    pub scl_high: u16,
    pub scl_low: u16,
    pub sda_hold: u8,
    pub scl_setup: u8,
}

impl TimingConfig {
    /// Packed register value.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        ((self.prescaler as u32).wrapping_sub(1) & 0xf) << 28
            | ((self.scl_setup as u32).wrapping_sub(1) & 0xf) << 20
            | ((self.sda_hold as u32) & 0xf) << 16
            | ((self.scl_high as u32).wrapping_sub(1) & 0xff) << 8
            | ((self.scl_low as u32).wrapping_sub(1) & 0xff)
    }

    /// Decode a packed register value.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            prescaler: ((bits >> 28) & 0xf) as u8 + 1,
            scl_setup: ((bits >> 20) & 0xf) as u8 + 1,
            sda_hold: ((bits >> 16) & 0xf) as u8,
            scl_high: ((bits >> 8) & 0xff) as u16 + 1,
            scl_low: (bits & 0xff) as u16 + 1,
        }
    }
}

/// Settings shared by every bus of one [`I2cMaster`](super::hardware_instantiation::I2cMaster).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    /// Peripheral (APB) clock feeding the controllers.
    pub peripheral_clock_hz: u32,
    /// NVIC priority for the error interrupt lines.
    pub irq_priority: u8,
    /// How long the start phase waits for a busy bus before resetting it.
    pub busy_timeout: MicrosDurationU64,
    /// Upper bound for every other status flag wait.
    pub poll_timeout: MicrosDurationU64,
}

pub struct ControllerConfigBuilder {
    peripheral_clock_hz: u32,
    irq_priority: u8,
    busy_timeout: MicrosDurationU64,
    poll_timeout: MicrosDurationU64,
}

impl Default for ControllerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            peripheral_clock_hz: 16_000_000,
            irq_priority: 1,
            busy_timeout: MicrosDurationU64::millis(100),
            poll_timeout: MicrosDurationU64::millis(10),
        }
    }
    #[must_use]
    pub fn peripheral_clock_hz(mut self, hz: u32) -> Self {
        self.peripheral_clock_hz = hz;
        self
    }
    #[must_use]
    pub fn irq_priority(mut self, priority: u8) -> Self {
        self.irq_priority = priority;
        self
    }
    #[must_use]
    pub fn busy_timeout(mut self, timeout: MicrosDurationU64) -> Self {
        self.busy_timeout = timeout;
        self
    }
    #[must_use]
    pub fn poll_timeout(mut self, timeout: MicrosDurationU64) -> Self {
        self.poll_timeout = timeout;
        self
    }
    #[must_use]
    pub fn build(self) -> ControllerConfig {
        ControllerConfig {
            peripheral_clock_hz: self.peripheral_clock_hz,
            irq_priority: self.irq_priority,
            busy_timeout: self.busy_timeout,
            poll_timeout: self.poll_timeout,
        }
    }
}

/// A GPIO identified by port letter index (A = 0) and pin number.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    pub port: u8,
    pub pin: u8,
}

impl PinId {
    #[must_use]
    pub const fn new(port: u8, pin: u8) -> Self {
        Self { port, pin }
    }
}

/// Electrical mode for the SCL/SDA pins.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    OpenDrain,
    OpenDrainPullUp,
}

/// Board wiring of one controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    pub scl: PinId,
    pub sda: PinId,
    pub pin_mode: PinMode,
    /// Alternate function number routing the pins to the controller.
    pub alt_function: u8,
    /// Bit in the peripheral clock enable register.
    pub clock_gate: u32,
    /// NVIC line of the controller's error interrupt.
    pub error_irq: u16,
}

pub struct BusConfigBuilder {
    scl: PinId,
    sda: PinId,
    pin_mode: PinMode,
    alt_function: u8,
    clock_gate: u32,
    error_irq: u16,
}

impl BusConfigBuilder {
    #[must_use]
    pub fn new(scl: PinId, sda: PinId) -> Self {
        Self {
            scl,
            sda,
            pin_mode: PinMode::OpenDrainPullUp,
            alt_function: 4,
            clock_gate: 0,
            error_irq: 0,
        }
    }
    #[must_use]
    pub fn pin_mode(mut self, mode: PinMode) -> Self {
        self.pin_mode = mode;
        self
    }
    #[must_use]
    pub fn alt_function(mut self, af: u8) -> Self {
        self.alt_function = af;
        self
    }
    #[must_use]
    pub fn clock_gate(mut self, bit: u32) -> Self {
        self.clock_gate = bit;
        self
    }
    #[must_use]
    pub fn error_irq(mut self, irq: u16) -> Self {
        self.error_irq = irq;
        self
    }
    #[must_use]
    pub fn build(self) -> BusConfig {
        BusConfig {
            scl: self.scl,
            sda: self.sda,
            pin_mode: self.pin_mode,
            alt_function: self.alt_function,
            clock_gate: self.clock_gate,
            error_irq: self.error_irq,
        }
    }
}
