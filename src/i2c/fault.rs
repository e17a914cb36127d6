// Licensed under the Apache-2.0 license

//! Bus faults reported by the controller's error interrupt.
//!
//! The interrupt handler is the only writer of a bus's [`FaultCell`]; the
//! thread holding the bus reads it while polling and clears it before each
//! address phase.

use crate::i2c::registers::sr1;
use core::sync::atomic::{AtomicI8, Ordering};

/// Hardware fault kinds, with their status codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i8)]
pub enum BusFault {
    Overrun = -1,
    Nack = -2,
    ArbitrationLost = -3,
    BusError = -4,
    Pec = -5,
    Timeout = -6,
    SmbusAlert = -7,
}

/// Fault bits in the order the interrupt handler records them. A later entry
/// overwrites an earlier one when several are set at once.
pub const FAULT_BITS: [(u32, BusFault); 7] = [
    (sr1::OVR, BusFault::Overrun),
    (sr1::AF, BusFault::Nack),
    (sr1::ARLO, BusFault::ArbitrationLost),
    (sr1::BERR, BusFault::BusError),
    (sr1::PECERR, BusFault::Pec),
    (sr1::TIMEOUT, BusFault::Timeout),
    (sr1::SMBALERT, BusFault::SmbusAlert),
];

/// Status bits the interrupt handler must acknowledge explicitly.
pub const ACKNOWLEDGED_BITS: u32 = sr1::AF | sr1::ARLO;

impl BusFault {
    #[must_use]
    pub const fn code(self) -> i8 {
        self as i8
    }

    #[must_use]
    pub const fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(BusFault::Overrun),
            -2 => Some(BusFault::Nack),
            -3 => Some(BusFault::ArbitrationLost),
            -4 => Some(BusFault::BusError),
            -5 => Some(BusFault::Pec),
            -6 => Some(BusFault::Timeout),
            -7 => Some(BusFault::SmbusAlert),
            _ => None,
        }
    }

    /// The fault a status snapshot reports, last match winning.
    #[must_use]
    pub fn decode(status: u32) -> Option<Self> {
        FAULT_BITS
            .iter()
            .filter(|(bit, _)| status & bit != 0)
            .map(|&(_, fault)| fault)
            .last()
    }
}

/// Most recent fault seen on one bus; zero means none.
#[derive(Debug, Default)]
pub struct FaultCell(AtomicI8);

impl FaultCell {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicI8::new(0))
    }

    #[inline]
    pub fn record(&self, fault: BusFault) {
        self.0.store(fault.code(), Ordering::Release);
    }

    #[inline]
    pub fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }

    #[inline]
    pub fn get(&self) -> Option<BusFault> {
        BusFault::from_code(self.0.load(Ordering::Acquire))
    }
}
