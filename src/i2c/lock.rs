// Licensed under the Apache-2.0 license

//! Exclusive access to one bus.
//!
//! [`I2cMaster::acquire`](super::hardware_instantiation::I2cMaster::acquire)
//! blocks on the bus lock and hands back a [`BusGuard`]. Transactions are
//! only reachable through the guard, so a caller cannot interleave its bytes
//! with another thread's. Dropping the guard (or calling
//! [`BusGuard::release`]) unlocks the bus.

use crate::common::Logger;
use crate::i2c::error::Error;
use crate::i2c::i2c_controller::Engine;
use crate::i2c::traits::{BusLock, Monotonic, RegisterBlock};
use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};

pub struct BusGuard<'a, R: RegisterBlock, M: BusLock + 'a, C: Monotonic, L: Logger> {
    engine: Engine<'a, R, C, L>,
    _held: M::Guard<'a>,
}

impl<'a, R: RegisterBlock, M: BusLock + 'a, C: Monotonic, L: Logger> BusGuard<'a, R, M, C, L> {
    pub(crate) fn new(engine: Engine<'a, R, C, L>, held: M::Guard<'a>) -> Self {
        Self {
            engine,
            _held: held,
        }
    }

    /// Index of the bus this guard holds.
    #[must_use]
    pub fn bus(&self) -> usize {
        self.engine.bus
    }

    /// Unlock the bus.
    pub fn release(self) {
        self.engine
            .logger
            .debug(format_args!("i2c{}: released", self.engine.bus));
    }

    /// Read one byte from `address`.
    ///
    /// # Errors
    ///
    /// Bus faults and stalls; the bus has been reset when they are returned.
    pub fn read_byte(&mut self, address: u8) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        self.engine.read_bytes(address, &mut byte)?;
        let [value] = byte;
        Ok(value)
    }

    /// Fill `buf` from `address`, returning the byte count.
    ///
    /// # Errors
    ///
    /// [`Error::ZeroLengthTransfer`] for an empty buffer, bus faults and stalls.
    pub fn read_bytes(&mut self, address: u8, buf: &mut [u8]) -> Result<usize, Error> {
        self.engine.read_bytes(address, buf)
    }

    /// Read one device register.
    ///
    /// # Errors
    ///
    /// Bus faults and stalls.
    pub fn read_reg(&mut self, address: u8, register: u8) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        self.engine.read_regs(address, register, &mut byte)?;
        let [value] = byte;
        Ok(value)
    }

    /// Read consecutive device registers starting at `register`.
    ///
    /// # Errors
    ///
    /// [`Error::ZeroLengthTransfer`] for an empty buffer, bus faults and stalls.
    pub fn read_regs(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<usize, Error> {
        self.engine.read_regs(address, register, buf)
    }

    /// Write one byte to `address`.
    ///
    /// # Errors
    ///
    /// Bus faults and stalls.
    pub fn write_byte(&mut self, address: u8, byte: u8) -> Result<usize, Error> {
        self.engine.write_bytes(address, &[byte])
    }

    /// Write `data` to `address`, returning the byte count.
    ///
    /// # Errors
    ///
    /// [`Error::ZeroLengthTransfer`] for empty `data`, bus faults and stalls.
    pub fn write_bytes(&mut self, address: u8, data: &[u8]) -> Result<usize, Error> {
        self.engine.write_bytes(address, data)
    }

    /// Write one device register.
    ///
    /// # Errors
    ///
    /// Bus faults and stalls.
    pub fn write_reg(&mut self, address: u8, register: u8, value: u8) -> Result<usize, Error> {
        self.engine.write_regs(address, register, &[value])
    }

    /// Write consecutive device registers starting at `register`.
    ///
    /// # Errors
    ///
    /// Bus faults and stalls.
    pub fn write_regs(&mut self, address: u8, register: u8, data: &[u8]) -> Result<usize, Error> {
        self.engine.write_regs(address, register, data)
    }
}

impl<'a, R: RegisterBlock, M: BusLock + 'a, C: Monotonic, L: Logger> ErrorType
    for BusGuard<'a, R, M, C, L>
{
    type Error = Error;
}

/// Adjacent operations of one kind share a frame: a run of writes goes out
/// back to back under one address byte, a run of reads is received as one
/// transfer spread over the buffers. A change of direction ends the frame
/// with STOP; repeated starts are not generated.
impl<'a, R: RegisterBlock, M: BusLock + 'a, C: Monotonic, L: Logger> I2c<SevenBitAddress>
    for BusGuard<'a, R, M, C, L>
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for run in operations.chunk_by_mut(|a, b| is_read(a) == is_read(b)) {
            if run.first().is_some_and(is_read) {
                let len = run.iter().map(operation_len).sum();
                self.engine
                    .receive(address, len, |index, byte| scatter(run, index, byte))?;
            } else {
                let chunks = run.iter().filter_map(|operation| match operation {
                    Operation::Write(data) => Some(*data),
                    Operation::Read(_) => None,
                });
                self.engine.transmit_frame(address, chunks)?;
            }
        }
        Ok(())
    }
}

fn is_read(operation: &Operation<'_>) -> bool {
    matches!(operation, Operation::Read(_))
}

fn operation_len(operation: &Operation<'_>) -> usize {
    match operation {
        Operation::Read(buf) => buf.len(),
        Operation::Write(data) => data.len(),
    }
}

/// Store `byte` at position `index` of the concatenated read buffers.
fn scatter(run: &mut [Operation<'_>], mut index: usize, byte: u8) {
    for operation in run.iter_mut() {
        if let Operation::Read(buf) = operation {
            if let Some(slot) = buf.get_mut(index) {
                *slot = byte;
                return;
            }
            index -= buf.len();
        }
    }
}
