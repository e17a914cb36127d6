// Licensed under the Apache-2.0 license

//! Timing register computation.
//!
//! Searches prescalers from 1 upward and takes the first one whose scaled
//! SCL high/low, SDA hold and SCL setup tick counts fit their register
//! fields.

use crate::i2c::common::{PhaseMinimums, Speed, TimingConfig};
use crate::i2c::error::Error;

const NSEC_PER_SEC: u32 = 1_000_000_000;

/// Prescalers are tried while below this value.
pub const PRESCALER_LIMIT: u32 = 16;

pub const SCL_PERIOD_MAX: u32 = 255;
pub const SDA_DELAY_MAX: u32 = 15;

/// Compute the timing register contents for `speed` at `clock_hz`.
///
/// # Errors
///
/// [`Error::InvalidSpeed`] for speed classes without timing minimums,
/// [`Error::NoValidPrescaler`] when no prescaler below
/// [`PRESCALER_LIMIT`] satisfies the field widths.
pub fn compute(speed: Speed, clock_hz: u32) -> Result<TimingConfig, Error> {
    let minimums = speed.phase_minimums().ok_or(Error::InvalidSpeed)?;
    (1..PRESCALER_LIMIT)
        .find_map(|presc| candidate(&minimums, clock_hz, presc))
        .ok_or(Error::NoValidPrescaler)
}

fn candidate(min: &PhaseMinimums, clock_hz: u32, presc: u32) -> Option<TimingConfig> {
    let tick_hz = clock_hz / presc;
    if tick_hz == 0 {
        return None;
    }
    let tick_ns = NSEC_PER_SEC / tick_hz;
    if tick_ns == 0 {
        return None;
    }

    let sclh = min.scl_high_ns / tick_ns;
    let scll = min.scl_low_ns / tick_ns;
    let sdadel = min.sda_hold_ns / tick_ns;
    let scldel = min.sda_setup_ns / tick_ns;

    // Fields holding `n - 1` cannot encode zero ticks.
    let fits = |ticks: u32, max: u32| ticks.checked_sub(1).is_some_and(|v| v <= max);
    if !fits(sclh, SCL_PERIOD_MAX)
        || !fits(scll, SCL_PERIOD_MAX)
        || sdadel > SDA_DELAY_MAX
        || !fits(scldel, SDA_DELAY_MAX)
    {
        return None;
    }

    Some(TimingConfig {
        prescaler: u8::try_from(presc).ok()?,
        scl_high: u16::try_from(sclh).ok()?,
        scl_low: u16::try_from(scll).ok()?,
        sda_hold: u8::try_from(sdadel).ok()?,
        scl_setup: u8::try_from(scldel).ok()?,
    })
}
