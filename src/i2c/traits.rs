// Licensed under the Apache-2.0 license

//! # Hardware and OS seams of the I2C driver
//!
//! The transaction engine is written against three small traits, so the same
//! code drives real silicon on the node and a simulated controller in host
//! tests:
//!
//! ```text
//! RegisterBlock  word access to one controller (MMIO semantics, &self)
//! Monotonic      microsecond time base for bounded polling
//! BusLock        the blocking mutex guarding one bus
//! ```
//!
//! Board services live in [`system_setup`](super::system_setup): clock gating
//! through the `OpenProt` `SystemControl` trait, pin muxing and interrupt
//! lines through [`BoardControl`](super::system_setup::BoardControl).

use crate::i2c::registers::Register;
use fugit::TimerInstantU64;

/// Microsecond instant used by [`Monotonic`].
pub type Instant = TimerInstantU64<1_000_000>;

/// Word access to a controller's registers.
///
/// Methods take `&self`: the error interrupt reads and acknowledges status
/// bits while a thread may hold the bus, exactly as with memory-mapped I/O.
pub trait RegisterBlock {
    fn read(&self, reg: Register) -> u32;

    fn write(&self, reg: Register, value: u32);

    /// Read-modify-write. Not atomic; wrap in a critical section where the
    /// interrupt handler must not observe the intermediate state.
    #[inline]
    fn modify<F: FnOnce(u32) -> u32>(&self, reg: Register, f: F) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    #[inline]
    fn set_bits(&self, reg: Register, mask: u32) {
        self.modify(reg, |v| v | mask);
    }

    #[inline]
    fn clear_bits(&self, reg: Register, mask: u32) {
        self.modify(reg, |v| v & !mask);
    }
}

impl<T: RegisterBlock + ?Sized> RegisterBlock for &T {
    #[inline]
    fn read(&self, reg: Register) -> u32 {
        (**self).read(reg)
    }

    #[inline]
    fn write(&self, reg: Register, value: u32) {
        (**self).write(reg, value);
    }
}

#[cfg(any(test, feature = "std"))]
impl<T: RegisterBlock + ?Sized> RegisterBlock for std::sync::Arc<T> {
    #[inline]
    fn read(&self, reg: Register) -> u32 {
        (**self).read(reg)
    }

    #[inline]
    fn write(&self, reg: Register, value: u32) {
        (**self).write(reg, value);
    }
}

/// Free-running microsecond clock.
pub trait Monotonic {
    fn now(&self) -> Instant;
}

/// Host clock backed by `std::time::Instant`.
#[cfg(any(test, feature = "std"))]
#[derive(Debug)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(any(test, feature = "std"))]
impl Default for StdClock {
    fn default() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl Monotonic for StdClock {
    fn now(&self) -> Instant {
        let micros = u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX);
        Instant::from_ticks(micros)
    }
}

/// Blocking mutual exclusion for one bus.
///
/// Acquisition blocks indefinitely; there is no try-lock. Releasing happens
/// when the returned guard is dropped.
pub trait BusLock {
    type Guard<'a>
    where
        Self: 'a;

    fn lock(&self) -> Self::Guard<'_>;
}

/// `std` mutex as a bus lock. A poisoned lock is taken over as-is: the bus
/// state lives in hardware, not behind the mutex.
#[cfg(any(test, feature = "std"))]
impl BusLock for std::sync::Mutex<()> {
    type Guard<'a> = std::sync::MutexGuard<'a, ()>;

    fn lock(&self) -> Self::Guard<'_> {
        std::sync::Mutex::lock(self).unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
