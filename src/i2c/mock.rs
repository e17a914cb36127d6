// Licensed under the Apache-2.0 license

//! Simulated controller and clock for host tests.
//!
//! The controller models a single well-behaved peer that acknowledges its
//! address and streams bytes `0, 1, 2, ...` on reads. Reception advances one
//! step per status read: the data register fills first, then the shift
//! register (which raises BTF). A byte shifted in while ACK is clear is the
//! last one, except the first byte of a POS reception. Transmission drains
//! the same way: a written byte moves to the shift register on the next status
//! read and leaves the wire on the one after, and BTF only shows once a byte
//! went out with nothing queued behind it.

use crate::i2c::registers::{cr1, sr1, sr2, Register};
use crate::i2c::traits::{Instant, Monotonic, RegisterBlock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Value written to CR1.
    Cr1(u32),
    /// Value returned from SR1.
    Sr1(u32),
    Sr2(u32),
    /// The SR1-then-SR2 sequence completed and ADDR dropped.
    AddrCleared,
    DrRead(u8),
    DrWrite(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    StartSent,
    Addressed { read: bool },
    Transmit,
    Receive,
}

#[derive(Default)]
struct State {
    cr1: u32,
    cr2: u32,
    oar1: u32,
    sr1: u32,
    sr2: u32,
    timingr: u32,
    phase: Phase,
    sr1_seen_with_addr: bool,
    data: Option<u8>,
    shift: Option<u8>,
    next_byte: u8,
    received: usize,
    last_shifted: bool,
    tx_data: Option<u8>,
    tx_shift: Option<u8>,
    tx_sent: bool,
    truncated: usize,
    stop_pending: bool,
    busy_held: bool,
    fail_address: Option<u32>,
    fail_data: Option<u32>,
    ignore_address: bool,
    resets: usize,
    stops: usize,
    wire: Vec<u8>,
    addresses: Vec<u8>,
    events: Vec<Event>,
}

impl State {
    fn release_bus(&mut self) {
        self.phase = Phase::Idle;
        if !self.busy_held {
            self.sr2 &= !(sr2::BUSY | sr2::MSL);
        }
    }

    fn finish_stop(&mut self) {
        self.cr1 &= !cr1::STOP;
        self.stop_pending = false;
        self.stops += 1;
        self.release_bus();
    }

    fn shift_in(&mut self) -> Option<u8> {
        if self.last_shifted {
            return None;
        }
        let byte = self.next_byte;
        self.next_byte = self.next_byte.wrapping_add(1);
        let held_by_pos = self.cr1 & cr1::POS != 0 && self.received == 0;
        if self.cr1 & cr1::ACK == 0 && !held_by_pos {
            self.last_shifted = true;
        }
        self.received += 1;
        Some(byte)
    }

    fn status(&mut self) -> u32 {
        match self.phase {
            Phase::Receive => {
                if self.data.is_none() {
                    let next = match self.shift.take() {
                        Some(byte) => Some(byte),
                        None => self.shift_in(),
                    };
                    self.data = next;
                } else if self.shift.is_none() {
                    self.shift = self.shift_in();
                }
                let mut flags = self.sr1;
                if self.data.is_some() {
                    flags |= sr1::RXNE;
                    if self.shift.is_some() {
                        flags |= sr1::BTF;
                    }
                }
                flags
            }
            Phase::Transmit => {
                if self.tx_shift.take().is_some() {
                    self.tx_sent = true;
                }
                if let Some(byte) = self.tx_data.take() {
                    self.tx_shift = Some(byte);
                    self.tx_sent = false;
                }
                let mut flags = self.sr1 | sr1::TXE;
                if self.tx_shift.is_none() && self.tx_sent {
                    flags |= sr1::BTF;
                }
                flags
            }
            _ => self.sr1,
        }
    }

    fn software_reset(&mut self) {
        self.resets += 1;
        self.cr2 = 0;
        self.oar1 = 0;
        self.sr1 = 0;
        self.sr2 = 0;
        self.timingr = 0;
        self.data = None;
        self.shift = None;
        self.stop_pending = false;
        self.release_bus();
        if self.busy_held {
            self.sr2 |= sr2::BUSY;
        }
    }

    fn begin_transmit(&mut self) {
        self.phase = Phase::Transmit;
        self.tx_data = None;
        self.tx_shift = None;
        self.tx_sent = false;
    }

    fn begin_receive(&mut self) {
        self.phase = Phase::Receive;
        self.data = None;
        self.shift = None;
        self.next_byte = 0;
        self.received = 0;
        self.last_shifted = false;
    }

    /// Returns true when the error interrupt should fire.
    fn write_cr1(&mut self, value: u32) -> bool {
        self.events.push(Event::Cr1(value));
        if value & cr1::SWRST != 0 {
            if self.cr1 & cr1::SWRST == 0 {
                self.software_reset();
            }
            self.cr1 = cr1::SWRST;
            return false;
        }
        let stop_rising = value & cr1::STOP != 0 && self.cr1 & cr1::STOP == 0;
        self.cr1 = value;
        if self.cr1 & cr1::PE == 0 {
            self.cr1 &= !cr1::ACK;
        }
        if value & cr1::START != 0 && value & cr1::PE != 0 {
            self.cr1 &= !cr1::START;
            self.sr1 |= sr1::SB;
            self.sr2 |= sr2::BUSY | sr2::MSL;
            self.phase = Phase::StartSent;
        }
        if stop_rising {
            self.stop_pending = true;
            if self.phase == Phase::Transmit
                && (self.tx_data.is_some() || self.tx_shift.is_some())
            {
                self.truncated += 1;
            }
            if self.phase != Phase::Receive {
                self.finish_stop();
            }
        }
        false
    }

    fn write_dr(&mut self, byte: u8) -> bool {
        self.events.push(Event::DrWrite(byte));
        self.wire.push(byte);
        match self.phase {
            Phase::StartSent => {
                self.sr1 &= !sr1::SB;
                self.addresses.push(byte);
                if let Some(bits) = self.fail_address.take() {
                    self.sr1 |= bits;
                    self.phase = Phase::Idle;
                    return true;
                }
                if self.ignore_address {
                    self.ignore_address = false;
                    self.phase = Phase::Idle;
                    return false;
                }
                self.sr1 |= sr1::ADDR;
                self.sr1_seen_with_addr = false;
                self.phase = Phase::Addressed {
                    read: byte & 1 != 0,
                };
                false
            }
            Phase::Transmit => {
                if let Some(bits) = self.fail_data.take() {
                    self.sr1 |= bits;
                    self.phase = Phase::Idle;
                    return true;
                }
                if self.tx_data.is_some() {
                    // written over a full data register
                    self.truncated += 1;
                }
                self.tx_data = Some(byte);
                false
            }
            _ => false,
        }
    }

    fn read_sr2(&mut self) -> u32 {
        let value = self.sr2;
        self.events.push(Event::Sr2(value));
        if self.sr1 & sr1::ADDR != 0 && self.sr1_seen_with_addr {
            self.sr1 &= !sr1::ADDR;
            self.events.push(Event::AddrCleared);
            if let Phase::Addressed { read } = self.phase {
                if read {
                    self.begin_receive();
                } else {
                    self.begin_transmit();
                }
            }
        }
        value
    }

    fn read_cr1(&mut self) -> u32 {
        if self.stop_pending && self.last_shifted && self.shift.is_none() {
            self.finish_stop();
        }
        self.cr1
    }
}

/// Simulated controller with an optional error interrupt line.
#[derive(Default)]
pub struct MockController {
    state: Mutex<State>,
    irq: OnceLock<Box<dyn Fn() + Send + Sync>>,
}

impl MockController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route the error interrupt to `handler`. Only the first call counts.
    pub fn connect_irq(&self, handler: impl Fn() + Send + Sync + 'static) {
        let _ = self.irq.set(Box::new(handler));
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    /// Raw register value, no side effects.
    pub fn register(&self, reg: Register) -> u32 {
        self.with(|s| match reg {
            Register::Cr1 => s.cr1,
            Register::Cr2 => s.cr2,
            Register::Oar1 => s.oar1,
            Register::Dr => u32::from(s.data.unwrap_or(0)),
            Register::Sr1 => s.sr1,
            Register::Sr2 => s.sr2,
            Register::Timingr => s.timingr,
        })
    }

    /// Set status bits without firing the interrupt.
    pub fn raise_status(&self, bits: u32) {
        self.with(|s| s.sr1 |= bits);
    }

    /// Keep BUSY asserted, across resets too.
    pub fn hold_busy(&self, held: bool) {
        self.with(|s| {
            s.busy_held = held;
            if held {
                s.sr2 |= sr2::BUSY;
            } else if s.phase == Phase::Idle {
                s.sr2 &= !sr2::BUSY;
            }
        });
    }

    /// Raise `bits` and interrupt instead of acknowledging the next address.
    pub fn fail_next_address(&self, bits: u32) {
        self.with(|s| s.fail_address = Some(bits));
    }

    /// Raise `bits` and interrupt on the next transmitted data byte.
    pub fn fail_next_data(&self, bits: u32) {
        self.with(|s| s.fail_data = Some(bits));
    }

    /// Neither acknowledge nor fault the next address.
    pub fn ignore_next_address(&self) {
        self.with(|s| s.ignore_address = true);
    }

    pub fn resets(&self) -> usize {
        self.with(|s| s.resets)
    }

    pub fn stops(&self) -> usize {
        self.with(|s| s.stops)
    }

    /// Frames that lost data: STOP with bytes still queued, or DR written
    /// while full.
    pub fn truncated(&self) -> usize {
        self.with(|s| s.truncated)
    }

    /// Every byte written to DR, addresses included.
    pub fn wire(&self) -> Vec<u8> {
        self.with(|s| s.wire.clone())
    }

    /// Address bytes sent after a start condition.
    pub fn addresses(&self) -> Vec<u8> {
        self.with(|s| s.addresses.clone())
    }

    pub fn events(&self) -> Vec<Event> {
        self.with(|s| s.events.clone())
    }

    pub fn clear_events(&self) {
        self.with(|s| s.events.clear());
    }

    fn interrupt(&self) {
        if let Some(handler) = self.irq.get() {
            handler();
        }
    }
}

impl RegisterBlock for MockController {
    fn read(&self, reg: Register) -> u32 {
        self.with(|s| match reg {
            Register::Cr1 => s.read_cr1(),
            Register::Cr2 => s.cr2,
            Register::Oar1 => s.oar1,
            Register::Sr1 => {
                let value = s.status();
                s.events.push(Event::Sr1(value));
                if value & sr1::ADDR != 0 {
                    s.sr1_seen_with_addr = true;
                }
                value
            }
            Register::Sr2 => s.read_sr2(),
            Register::Dr => {
                let byte = s.data.take().unwrap_or(0);
                s.data = s.shift.take();
                s.events.push(Event::DrRead(byte));
                u32::from(byte)
            }
            Register::Timingr => s.timingr,
        })
    }

    fn write(&self, reg: Register, value: u32) {
        let fire = self.with(|s| match reg {
            Register::Cr1 => s.write_cr1(value),
            Register::Cr2 => {
                s.cr2 = value;
                false
            }
            Register::Oar1 => {
                s.oar1 = value;
                false
            }
            Register::Sr1 => {
                s.sr1 &= value | !sr1::ERRORS;
                false
            }
            Register::Sr2 => false,
            Register::Dr => s.write_dr((value & 0xff) as u8),
            Register::Timingr => {
                s.timingr = value;
                false
            }
        });
        // the handler reads registers, so the state lock must be released
        if fire {
            self.interrupt();
        }
    }
}

/// Clock that moves forward a fixed step every time it is read.
#[derive(Debug)]
pub struct MockClock {
    micros: AtomicU64,
    step: u64,
}

impl MockClock {
    pub fn with_step(step_micros: u64) -> Self {
        Self {
            micros: AtomicU64::new(0),
            step: step_micros,
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.micros.load(Ordering::Relaxed)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::with_step(1_000)
    }
}

impl Monotonic for MockClock {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.micros.fetch_add(self.step, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_sets_sb_and_busy() {
        let hw = MockController::new();
        hw.write(Register::Cr1, cr1::PE | cr1::START);

        assert_ne!(hw.register(Register::Sr1) & sr1::SB, 0);
        assert_ne!(hw.register(Register::Sr2) & sr2::BUSY, 0);
        assert_eq!(hw.register(Register::Cr1) & cr1::START, 0);
    }

    #[test]
    fn addr_clears_on_sr1_then_sr2() {
        let hw = MockController::new();
        hw.write(Register::Cr1, cr1::PE | cr1::START);
        hw.write(Register::Dr, 0x33);
        assert_ne!(hw.register(Register::Sr1) & sr1::ADDR, 0);

        hw.read(Register::Sr2);
        assert_ne!(hw.register(Register::Sr1) & sr1::ADDR, 0);

        hw.read(Register::Sr1);
        hw.read(Register::Sr2);
        assert_eq!(hw.register(Register::Sr1) & sr1::ADDR, 0);
    }

    #[test]
    fn software_reset_wipes_timing() {
        let hw = MockController::new();
        hw.write(Register::Timingr, 0x1234);
        hw.write(Register::Cr1, cr1::SWRST);
        hw.write(Register::Cr1, 0);

        assert_eq!(hw.register(Register::Timingr), 0);
        assert_eq!(hw.resets(), 1);
    }

    #[test]
    fn error_bits_clear_on_zero_write() {
        let hw = MockController::new();
        hw.raise_status(sr1::AF | sr1::BERR);
        hw.write(Register::Sr1, !sr1::AF);
        assert_eq!(hw.register(Register::Sr1), sr1::BERR);
    }

    #[test]
    fn btf_waits_for_the_last_byte_to_drain() {
        let hw = MockController::new();
        hw.write(Register::Cr1, cr1::PE | cr1::START);
        hw.write(Register::Dr, 0x32);
        hw.read(Register::Sr1);
        hw.read(Register::Sr2);

        // nothing sent yet
        assert_eq!(hw.read(Register::Sr1) & sr1::BTF, 0);
        hw.write(Register::Dr, 0xaa);
        assert_eq!(hw.read(Register::Sr1) & sr1::BTF, 0);
        assert_ne!(hw.read(Register::Sr1) & sr1::BTF, 0);

        hw.write(Register::Cr1, cr1::PE | cr1::STOP);
        assert_eq!(hw.truncated(), 0);
        assert_eq!(hw.stops(), 1);
    }

    #[test]
    fn clock_steps_on_every_read() {
        let clock = MockClock::with_step(250);
        assert_eq!(clock.now().ticks(), 0);
        assert_eq!(clock.now().ticks(), 250);
        assert_eq!(clock.elapsed_micros(), 500);
    }
}
