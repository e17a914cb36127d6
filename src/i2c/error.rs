// Licensed under the Apache-2.0 license

//! Driver error type.

use crate::i2c::fault::BusFault;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bus index does not name a configured bus.
    InvalidBus,
    /// Speed class without timing support.
    InvalidSpeed,
    /// No prescaler below 16 fits the timing register fields.
    NoValidPrescaler,
    /// Target address does not fit in 7 bits.
    InvalidAddress,
    /// Reads of zero bytes cannot be framed on this controller.
    ZeroLengthTransfer,
    /// A status flag never showed up within the poll timeout; the bus was reset.
    Stalled,
    /// Clock, pin or interrupt setup was refused by the platform.
    Platform,
    /// The controller reported a fault (or the bus stayed busy); the bus was reset.
    Fault(BusFault),
}

impl Error {
    /// Integer status for callers speaking the node's C-style driver API.
    ///
    /// `NoValidPrescaler` is positive, matching the board firmware's
    /// convention for "configuration not applied".
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Error::InvalidBus => -1,
            Error::InvalidSpeed => -2,
            Error::NoValidPrescaler => 2,
            Error::InvalidAddress => -8,
            Error::ZeroLengthTransfer => -9,
            Error::Stalled => -10,
            Error::Platform => -11,
            Error::Fault(fault) => fault.code() as i32,
        }
    }
}

impl From<BusFault> for Error {
    fn from(fault: BusFault) -> Self {
        Error::Fault(fault)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidBus => f.write_str("invalid bus index"),
            Error::InvalidSpeed => f.write_str("unsupported bus speed"),
            Error::NoValidPrescaler => f.write_str("no prescaler satisfies the timing constraints"),
            Error::InvalidAddress => f.write_str("address exceeds 7 bits"),
            Error::ZeroLengthTransfer => f.write_str("zero-length read"),
            Error::Stalled => f.write_str("status flag wait timed out"),
            Error::Platform => f.write_str("platform setup failed"),
            Error::Fault(fault) => write!(f, "bus fault {fault:?}"),
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Fault(BusFault::Nack) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            Error::Fault(BusFault::ArbitrationLost) => ErrorKind::ArbitrationLoss,
            Error::Fault(BusFault::BusError) => ErrorKind::Bus,
            Error::Fault(BusFault::Overrun) => ErrorKind::Overrun,
            _ => ErrorKind::Other,
        }
    }
}
