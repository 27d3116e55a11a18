//! Interrupt-driven driver for the Avia HX711 24-bit load cell ADC.
//!
//! The serial clock is generated by a [`ClockSource`], a [`PulseCounter`] watches the clock
//! edges independently of the capture path, and an [`EdgeNotifier`] signals the falling edge of
//! the data line that marks a finished conversion. The driver only glues these together, so the
//! processor is free between conversions.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

#[cfg(any(test, feature = "sim"))]
extern crate alloc;

use core::fmt;

pub mod capability;
pub mod driver;
pub mod mode;
pub mod sample;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use capability::{ClockSource, EdgeNotifier, PulseCounter};
pub use driver::{Hx711, SamplingState};
pub use mode::{ConversionMode, UnknownMode};
pub use sample::{sign_extend, SampleAccumulator};

/// Number of data bits clocked out per conversion.
pub const RESOLUTION: u32 = 24;

/// Serial clock frequency. The datasheet allows 10 kHz up to 2.5 MHz.
pub const SCK_FREQUENCY_HZ: u32 = 1_000_000;

/// SCK held high for longer than this powers the converter down.
pub const POWER_DOWN_US: u32 = 60;

/// Outcome of a single conversion, delivered to the event handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A full conversion, sign-extended from the converter's two's-complement output.
    DataReady(i32),
    /// Capture lost sync with the clock. Carries the raw bits captured before the abort.
    DataError(u32),
}

impl Event {
    /// The reading, or the partial raw contents reinterpreted as an `i32`.
    pub fn value(&self) -> i32 {
        match *self {
            Event::DataReady(value) => value,
            Event::DataError(raw) => raw as i32,
        }
    }
}

/// Errors raised by the driver, generic over the data line's pin error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// Reading the data line failed. The conversion was abandoned.
    Pin(E),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pin(e) => write!(f, "data line read failed: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_value() {
        assert_eq!(Event::DataReady(-1).value(), -1);
        assert_eq!(Event::DataReady(8_388_607).value(), 8_388_607);
        assert_eq!(Event::DataError(0xFF_FFFE).value(), 0xFF_FFFE);
        // Partial values never reach bit 31, so they stay positive.
        assert_eq!(Event::DataError(0x80_0000).value(), 0x80_0000);
    }
}
