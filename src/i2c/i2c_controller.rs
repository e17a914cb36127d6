// Licensed under the Apache-2.0 license

//! One I2C controller and the transaction engine that drives it.
//!
//! [`I2cController`] owns what belongs to a single bus: its registers, its
//! lock and the fault cell written by its error interrupt. [`Engine`] borrows
//! those together with the shared clock, logger and timeouts for the duration
//! of one operation and implements the start/address/data/stop sequencing.

use crate::common::Logger;
use crate::i2c::common::BusConfig;
use crate::i2c::error::Error;
use crate::i2c::fault::{BusFault, FaultCell, ACKNOWLEDGED_BITS, FAULT_BITS};
use crate::i2c::registers::{cr1, cr2, sr1, sr2, Register, FLAG_READ, FLAG_WRITE};
use crate::i2c::traits::{BusLock, Instant, Monotonic, RegisterBlock};
use fugit::MicrosDurationU64;

/// Largest 7-bit address.
pub const ADDRESS_MAX: u8 = 0x7f;

pub struct I2cController<R: RegisterBlock, M: BusLock> {
    pub(crate) regs: R,
    pub(crate) lock: M,
    pub(crate) fault: FaultCell,
    pub(crate) config: BusConfig,
}

impl<R: RegisterBlock, M: BusLock> I2cController<R, M> {
    #[must_use]
    pub fn new(regs: R, lock: M, config: BusConfig) -> Self {
        Self {
            regs,
            lock,
            fault: FaultCell::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    #[must_use]
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Most recent fault recorded by the error interrupt.
    #[must_use]
    pub fn last_fault(&self) -> Option<BusFault> {
        self.fault.get()
    }

    /// Error interrupt body.
    ///
    /// Samples the status register once and records every fault bit present,
    /// the last one winning. NACK and arbitration-lost are acknowledged here;
    /// the other bits are left for the bus reset.
    pub fn on_error_interrupt(&self) {
        let status = self.regs.read(Register::Sr1);
        for &(bit, fault) in &FAULT_BITS {
            if status & bit == 0 {
                continue;
            }
            self.fault.record(fault);
            if bit & ACKNOWLEDGED_BITS != 0 {
                // Status error bits clear on writing zero.
                self.regs.write(Register::Sr1, !bit);
            }
        }
    }
}

/// Everything one operation on one bus needs, borrowed.
pub struct Engine<'a, R, C, L> {
    pub(crate) regs: &'a R,
    pub(crate) fault: &'a FaultCell,
    pub(crate) clock: &'a C,
    pub(crate) logger: &'a L,
    pub(crate) busy_timeout: MicrosDurationU64,
    pub(crate) poll_timeout: MicrosDurationU64,
    pub(crate) bus: usize,
}

impl<R: RegisterBlock, C: Monotonic, L: Logger> Engine<'_, R, C, L> {
    /// Apply `timing` and bring the controller up in 7-bit master mode.
    pub fn configure(&self, timing: u32) {
        self.regs.clear_bits(Register::Cr1, cr1::PE);
        // analog noise filter on
        self.regs.clear_bits(Register::Cr1, cr1::ANFOFF);
        self.regs.write(Register::Timingr, timing);
        self.regs.clear_bits(Register::Cr1, cr1::NOSTRETCH);
        self.regs.write(Register::Oar1, 0);
        self.regs.set_bits(Register::Cr2, cr2::ITERREN);
        self.regs.set_bits(Register::Cr1, cr1::PE);
        // ACK only sticks while the controller is enabled
        self.regs.set_bits(Register::Cr1, cr1::ACK);
    }

    /// Software-reset the controller and restore its timing.
    pub fn reset(&self) {
        self.logger
            .warn(format_args!("i2c{}: resetting the bus", self.bus));
        let timing = self.regs.read(Register::Timingr);
        self.regs.set_bits(Register::Cr1, cr1::SWRST);
        self.regs.clear_bits(Register::Cr1, cr1::SWRST);
        self.configure(timing);
    }

    fn expired(&self, since: Instant, limit: MicrosDurationU64) -> bool {
        self.clock
            .now()
            .checked_duration_since(since)
            .is_some_and(|elapsed| elapsed > limit)
    }

    /// Poll until `ready` holds.
    ///
    /// With `watch_faults` a fault recorded by the interrupt aborts the wait.
    /// Faults and timeouts both reset the bus before returning.
    fn wait_for(&self, watch_faults: bool, mut ready: impl FnMut() -> bool) -> Result<(), Error> {
        let since = self.clock.now();
        loop {
            if ready() {
                return Ok(());
            }
            if watch_faults {
                if let Some(fault) = self.fault.get() {
                    self.logger
                        .error(format_args!("i2c{}: bus fault {:?}", self.bus, fault));
                    self.reset();
                    return Err(Error::Fault(fault));
                }
            }
            if self.expired(since, self.poll_timeout) {
                self.logger
                    .error(format_args!("i2c{}: status flag never came up", self.bus));
                self.reset();
                return Err(Error::Stalled);
            }
        }
    }

    fn wait_status(&self, flag: u32) -> Result<(), Error> {
        self.wait_for(true, || self.regs.read(Register::Sr1) & flag != 0)
    }

    fn wait_stop_cleared(&self) -> Result<(), Error> {
        self.wait_for(true, || self.regs.read(Register::Cr1) & cr1::STOP == 0)
    }

    /// Start condition plus address phase.
    ///
    /// On error no transaction took place and the bus has been reset.
    fn start(&self, address: u8, rw: u8) -> Result<(), Error> {
        self.logger
            .debug(format_args!("i2c{}: start {:#04x}/{}", self.bus, address, rw));

        let since = self.clock.now();
        while self.regs.read(Register::Sr2) & sr2::BUSY != 0 {
            if self.expired(since, self.busy_timeout) {
                self.logger
                    .warn(format_args!("i2c{}: timeout waiting for idle bus", self.bus));
                self.reset();
                return Err(Error::Fault(BusFault::Timeout));
            }
        }

        self.regs.set_bits(Register::Cr1, cr1::START);
        self.wait_for(false, || self.regs.read(Register::Sr1) & sr1::SB != 0)?;

        self.fault.clear();
        self.regs
            .write(Register::Dr, u32::from((address << 1) | rw));
        self.wait_status(sr1::ADDR)
    }

    /// ADDR clears on reading SR1 then SR2.
    fn clear_addr(&self) {
        let _ = self.regs.read(Register::Sr1);
        let _ = self.regs.read(Register::Sr2);
    }

    fn read_data(&self) -> u8 {
        (self.regs.read(Register::Dr) & 0xff) as u8
    }

    fn transmit(&self, data: &[u8]) -> Result<(), Error> {
        for &byte in data {
            self.wait_status(sr1::TXE)?;
            self.regs.write(Register::Dr, u32::from(byte));
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), Error> {
        self.wait_status(sr1::BTF)?;
        self.regs.set_bits(Register::Cr1, cr1::STOP);
        Ok(())
    }

    /// Leave the control register ready for the next reception.
    fn restore_ack(&self) {
        self.regs.clear_bits(Register::Cr1, cr1::POS);
        self.regs.set_bits(Register::Cr1, cr1::ACK);
    }

    /// Receive `len` bytes from `address` in one start/stop framed transfer,
    /// handing each byte to `put` with its position.
    ///
    /// # Errors
    ///
    /// [`Error::ZeroLengthTransfer`] when `len` is zero, otherwise any fault
    /// or stall seen on the bus.
    pub fn receive(
        &self,
        address: u8,
        len: usize,
        mut put: impl FnMut(usize, u8),
    ) -> Result<(), Error> {
        check_address(address)?;
        match len {
            0 => return Err(Error::ZeroLengthTransfer),
            1 => {
                self.start(address, FLAG_READ)?;
                // NACK the only byte
                self.regs.clear_bits(Register::Cr1, cr1::ACK);
                critical_section::with(|_| {
                    self.clear_addr();
                    self.regs.set_bits(Register::Cr1, cr1::STOP);
                });
                self.wait_status(sr1::RXNE)?;
                put(0, self.read_data());
                self.wait_stop_cleared()?;
                self.regs.set_bits(Register::Cr1, cr1::ACK);
            }
            2 => {
                self.start(address, FLAG_READ)?;
                self.regs.set_bits(Register::Cr1, cr1::POS | cr1::ACK);
                critical_section::with(|_| {
                    self.clear_addr();
                    self.regs.clear_bits(Register::Cr1, cr1::ACK);
                });
                // both bytes buffered before STOP
                self.wait_status(sr1::BTF)?;
                critical_section::with(|_| {
                    self.regs.set_bits(Register::Cr1, cr1::STOP);
                    put(0, self.read_data());
                });
                put(1, self.read_data());
                self.wait_stop_cleared()?;
                self.restore_ack();
            }
            _ => {
                let tail = len - 3;
                self.start(address, FLAG_READ)?;
                self.clear_addr();
                for index in 0..tail {
                    self.wait_status(sr1::RXNE)?;
                    put(index, self.read_data());
                }
                self.wait_status(sr1::BTF)?;
                critical_section::with(|_| {
                    self.regs.clear_bits(Register::Cr1, cr1::ACK);
                    put(tail, self.read_data());
                    self.regs.set_bits(Register::Cr1, cr1::STOP);
                });
                put(tail + 1, self.read_data());
                self.wait_status(sr1::RXNE)?;
                put(tail + 2, self.read_data());
                self.wait_stop_cleared()?;
                self.restore_ack();
            }
        }
        Ok(())
    }

    /// Read `buf.len()` bytes from `address`.
    ///
    /// # Errors
    ///
    /// As [`Engine::receive`].
    pub fn read_bytes(&self, address: u8, buf: &mut [u8]) -> Result<usize, Error> {
        let len = buf.len();
        self.receive(address, len, |index, byte| {
            if let Some(slot) = buf.get_mut(index) {
                *slot = byte;
            }
        })?;
        Ok(len)
    }

    /// Send every chunk back to back in one start/stop framed transfer.
    /// Returns the total byte count.
    ///
    /// # Errors
    ///
    /// [`Error::ZeroLengthTransfer`] when there is nothing to send: the
    /// controller only raises BTF after a data byte. Otherwise any fault or
    /// stall seen on the bus.
    pub fn transmit_frame<'d, I>(&self, address: u8, chunks: I) -> Result<usize, Error>
    where
        I: Iterator<Item = &'d [u8]> + Clone,
    {
        check_address(address)?;
        let len: usize = chunks.clone().map(<[u8]>::len).sum();
        if len == 0 {
            return Err(Error::ZeroLengthTransfer);
        }
        self.start(address, FLAG_WRITE)?;
        self.clear_addr();
        for chunk in chunks {
            self.transmit(chunk)?;
        }
        self.stop()?;
        Ok(len)
    }

    /// Write `data` to `address` in one start/stop framed transfer.
    ///
    /// # Errors
    ///
    /// As [`Engine::transmit_frame`].
    pub fn write_bytes(&self, address: u8, data: &[u8]) -> Result<usize, Error> {
        self.transmit_frame(address, [data].into_iter())
    }

    /// Write the register pointer, stop, then read `buf.len()` bytes.
    ///
    /// # Errors
    ///
    /// As [`Engine::read_bytes`].
    pub fn read_regs(&self, address: u8, register: u8, buf: &mut [u8]) -> Result<usize, Error> {
        check_address(address)?;
        if buf.is_empty() {
            return Err(Error::ZeroLengthTransfer);
        }
        self.transmit_frame(address, [core::slice::from_ref(&register)].into_iter())?;
        self.read_bytes(address, buf)
    }

    /// Write the register pointer followed by `data` in one transfer.
    /// Returns the count of data bytes, the pointer excluded.
    ///
    /// # Errors
    ///
    /// As [`Engine::transmit_frame`].
    pub fn write_regs(&self, address: u8, register: u8, data: &[u8]) -> Result<usize, Error> {
        self.transmit_frame(address, [core::slice::from_ref(&register), data].into_iter())?;
        Ok(data.len())
    }

    /// Wait for the bus to go idle, bounded by the busy timeout.
    ///
    /// # Errors
    ///
    /// `Error::Fault(BusFault::Timeout)` if the bus stays busy.
    pub fn wait_idle(&self) -> Result<(), Error> {
        let since = self.clock.now();
        while self.regs.read(Register::Sr2) & sr2::BUSY != 0 {
            if self.expired(since, self.busy_timeout) {
                return Err(Error::Fault(BusFault::Timeout));
            }
        }
        Ok(())
    }
}

fn check_address(address: u8) -> Result<(), Error> {
    if address > ADDRESS_MAX {
        return Err(Error::InvalidAddress);
    }
    Ok(())
}
