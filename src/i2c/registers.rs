// Licensed under the Apache-2.0 license

//! Register model of the I2C controller.
//!
//! The driver talks to a controller with the classic master-mode flag set
//! (`CR1`/`SR1`/`SR2`/`DR`) and a packed timing register holding prescaler
//! and SCL/SDA tick counts. Status error bits in `SR1` are cleared by writing
//! zero to them; writing one leaves them untouched.

use crate::i2c::traits::RegisterBlock;
use core::ptr::{read_volatile, write_volatile};

/// Registers reachable through a [`RegisterBlock`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Cr1,
    Cr2,
    Oar1,
    Dr,
    Sr1,
    Sr2,
    Timingr,
}

impl Register {
    /// Byte offset from the controller base address.
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Register::Cr1 => 0x00,
            Register::Cr2 => 0x04,
            Register::Oar1 => 0x08,
            Register::Dr => 0x10,
            Register::Sr1 => 0x14,
            Register::Sr2 => 0x18,
            Register::Timingr => 0x1c,
        }
    }
}

pub mod cr1 {
    pub const PE: u32 = 1 << 0;
    pub const START: u32 = 1 << 8;
    pub const STOP: u32 = 1 << 9;
    pub const ACK: u32 = 1 << 10;
    pub const POS: u32 = 1 << 11;
    pub const ANFOFF: u32 = 1 << 12;
    pub const SWRST: u32 = 1 << 15;
    pub const NOSTRETCH: u32 = 1 << 17;
}

pub mod cr2 {
    /// Error interrupt enable.
    pub const ITERREN: u32 = 1 << 8;
}

pub mod sr1 {
    pub const SB: u32 = 1 << 0;
    pub const ADDR: u32 = 1 << 1;
    pub const BTF: u32 = 1 << 2;
    pub const RXNE: u32 = 1 << 6;
    pub const TXE: u32 = 1 << 7;
    pub const BERR: u32 = 1 << 8;
    pub const ARLO: u32 = 1 << 9;
    pub const AF: u32 = 1 << 10;
    pub const OVR: u32 = 1 << 11;
    pub const PECERR: u32 = 1 << 12;
    pub const TIMEOUT: u32 = 1 << 14;
    pub const SMBALERT: u32 = 1 << 15;

    pub const ERRORS: u32 = BERR | ARLO | AF | OVR | PECERR | TIMEOUT | SMBALERT;
}

pub mod sr2 {
    pub const MSL: u32 = 1 << 0;
    pub const BUSY: u32 = 1 << 1;
}

/// Direction bit appended to the 7-bit address.
pub const FLAG_WRITE: u8 = 0;
pub const FLAG_READ: u8 = 1;

/// Volatile access to a memory-mapped controller.
#[derive(Debug)]
pub struct Mmio {
    base: *mut u32,
}

// SAFETY: every access is a single volatile word read or write, so no access
// can observe a torn value. Multi-step sequences on CR1 and DR run under the
// bus lock. The error interrupt does not take that lock: it reads SR1 and
// clears flags by writing zero to them, which leaves the other SR1 bits alone
// and never touches a register the lock holder modifies read-modify-write.
unsafe impl Send for Mmio {}
unsafe impl Sync for Mmio {}

impl Mmio {
    /// # Safety
    ///
    /// `base` must point at a controller register block (or memory laid out
    /// like one) that stays valid for the lifetime of the returned value.
    #[must_use]
    pub const unsafe fn new(base: *mut u32) -> Self {
        Self { base }
    }

    fn word(&self, reg: Register) -> *mut u32 {
        self.base.wrapping_byte_add(reg.offset())
    }
}

impl RegisterBlock for Mmio {
    #[inline]
    fn read(&self, reg: Register) -> u32 {
        // SAFETY: `new` guarantees the block is valid and word aligned.
        unsafe { read_volatile(self.word(reg)) }
    }

    #[inline]
    fn write(&self, reg: Register, value: u32) {
        // SAFETY: as above.
        unsafe { write_volatile(self.word(reg), value) }
    }
}
