// Licensed under the Apache-2.0 license

//! Crate-wide helpers shared by the driver modules.
//!
//! The driver never logs through a global facade. A [`Logger`] is handed to the
//! [`I2cMaster`](crate::i2c::hardware_instantiation::I2cMaster) at construction,
//! so firmware can route messages to RTT, a UART, or nowhere at all.

use core::fmt;

/// Severity of a log record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink for driver diagnostics.
///
/// Called from thread context only; the error interrupt handler never logs.
pub trait Logger {
    fn log(&self, level: Level, args: fmt::Arguments<'_>);

    fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

/// Logger that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline]
    fn log(&self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Logger forwarding to `defmt`.
#[cfg(feature = "defmt")]
#[derive(Copy, Clone, Debug, Default)]
pub struct DefmtLogger;

#[cfg(feature = "defmt")]
impl Logger for DefmtLogger {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let msg = defmt::Display2Format(&args);
        match level {
            Level::Debug => defmt::debug!("{}", msg),
            Level::Info => defmt::info!("{}", msg),
            Level::Warn => defmt::warn!("{}", msg),
            Level::Error => defmt::error!("{}", msg),
        }
    }
}
