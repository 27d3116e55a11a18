//! Software model of an HX711 and its peripheral wiring.
//!
//! [`Converter`] hands out the pieces the driver needs. They share one state, so the model
//! sees the clock pulses the driver asks for and answers on the data line the way the chip does:
//! a falling DOUT when a conversion is ready, then one bit per SCK rising edge, MSB first.

use alloc::rc::Rc;
use core::cell::RefCell;
use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, PinState};

use crate::capability::{ClockSource, EdgeNotifier, PulseCounter};
use crate::RESOLUTION;

#[derive(Debug)]
struct State {
    sample: u32,
    shifted: u32,
    armed: u32,
    emitted: u32,
    falling_edges: u32,
    slip: u32,
    dout_high: bool,
    sck_high: bool,
    edge_enabled: bool,
    power_down_pulses: u32,
    last_pulses: u32,
    clock_released: bool,
    data_released: bool,
    now_ns: u64,
    high_since_ns: u64,
    last_hold_ns: u64,
}

impl State {
    fn raise_sck(&mut self) {
        if !self.sck_high {
            self.power_down_pulses += 1;
            self.high_since_ns = self.now_ns;
        }
        self.sck_high = true;
    }

    fn lower_sck(&mut self) {
        if self.sck_high {
            self.last_hold_ns = self.now_ns - self.high_since_ns;
        }
        self.sck_high = false;
    }

    fn pulse(&mut self) {
        self.emitted += 1;
        self.dout_high = if self.shifted < RESOLUTION {
            let bit = (self.sample >> (RESOLUTION - 1 - self.shifted)) & 1 == 1;
            self.shifted += 1;
            bit
        } else {
            true
        };
        self.falling_edges += 1;
    }
}

/// Shared handle on the simulated converter.
#[derive(Debug, Clone)]
pub struct Converter {
    state: Rc<RefCell<State>>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                sample: 0,
                shifted: 0,
                armed: 0,
                emitted: 0,
                falling_edges: 0,
                slip: 0,
                dout_high: true,
                sck_high: false,
                edge_enabled: false,
                power_down_pulses: 0,
                last_pulses: 0,
                clock_released: false,
                data_released: false,
                now_ns: 0,
                high_since_ns: 0,
                last_hold_ns: 0,
            })),
        }
    }

    /// The clock, edge notifier, pulse counter and data pin wired to this converter.
    pub fn split(&self) -> (SimClock, SimEdge, SimCounter, SimData) {
        (
            SimClock(self.state.clone()),
            SimEdge(self.state.clone()),
            SimCounter(self.state.clone()),
            SimData(self.state.clone()),
        )
    }

    /// Simulated time, advanced only by [`SimDelay`].
    pub fn delay(&self) -> SimDelay {
        SimDelay(self.state.clone())
    }

    /// Finish a conversion holding `raw` (low 24 bits).
    ///
    /// Returns `true` if DOUT fell while edge notification was enabled, i.e. the caller should
    /// run the driver's interrupt handler. A powered down converter does not convert.
    pub fn load(&self, raw: u32) -> bool {
        let mut s = self.state.borrow_mut();
        if s.sck_high {
            return false;
        }

        let falling = s.dout_high;
        s.sample = raw & ((1 << RESOLUTION) - 1);
        s.shifted = 0;
        s.dout_high = false;

        falling && s.edge_enabled
    }

    /// Emit `edges` clock pulses during the next conversion that the capture path never sees.
    pub fn slip(&self, edges: u32) {
        self.state.borrow_mut().slip = edges;
    }

    pub fn is_edge_enabled(&self) -> bool {
        self.state.borrow().edge_enabled
    }

    pub fn is_sck_high(&self) -> bool {
        self.state.borrow().sck_high
    }

    /// Number of times SCK was raised and held, each one powering the converter down.
    pub fn power_down_pulses(&self) -> u32 {
        self.state.borrow().power_down_pulses
    }

    /// How long SCK stayed high before it was last pulled low.
    pub fn last_high_hold_ns(&self) -> u64 {
        self.state.borrow().last_hold_ns
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.state.borrow().now_ns
    }

    /// SCK pulses of the last finished conversion, which select the next gain.
    pub fn last_pulse_count(&self) -> u32 {
        self.state.borrow().last_pulses
    }

    /// Whether both pins have been returned to their default state.
    pub fn is_released(&self) -> bool {
        let s = self.state.borrow();
        s.clock_released && s.data_released
    }
}

#[derive(Debug)]
pub struct SimClock(Rc<RefCell<State>>);

impl ClockSource for SimClock {
    fn start(&mut self, pulses: u32) {
        let mut s = self.0.borrow_mut();
        s.armed = pulses;
        s.emitted = 0;
        s.lower_sck();
    }

    fn take_rising_edge(&mut self) -> bool {
        let mut s = self.0.borrow_mut();

        while s.slip > 0 && s.emitted < s.armed {
            s.slip -= 1;
            s.pulse();
        }
        s.slip = 0;

        if s.emitted >= s.armed {
            return false;
        }

        s.pulse();
        true
    }

    fn finish(&mut self) {
        let mut s = self.0.borrow_mut();
        while s.emitted < s.armed {
            s.pulse();
        }
        s.last_pulses = s.emitted;
        s.dout_high = true;
    }

    fn stop(&mut self) {
        let mut s = self.0.borrow_mut();
        s.armed = s.emitted;
        s.last_pulses = s.emitted;
    }

    fn set_level(&mut self, level: PinState) {
        let mut s = self.0.borrow_mut();
        match level {
            PinState::High => s.raise_sck(),
            PinState::Low => s.lower_sck(),
        }
    }

    fn release(&mut self) {
        let mut s = self.0.borrow_mut();
        s.clock_released = true;
        s.lower_sck();
    }
}

#[derive(Debug)]
pub struct SimEdge(Rc<RefCell<State>>);

impl EdgeNotifier for SimEdge {
    fn enable(&mut self) {
        self.0.borrow_mut().edge_enabled = true;
    }

    fn disable(&mut self) {
        self.0.borrow_mut().edge_enabled = false;
    }

    fn release(&mut self) {
        let mut s = self.0.borrow_mut();
        s.edge_enabled = false;
        s.data_released = true;
    }
}

#[derive(Debug)]
pub struct SimCounter(Rc<RefCell<State>>);

impl PulseCounter for SimCounter {
    fn clear(&mut self) {
        self.0.borrow_mut().falling_edges = 0;
    }

    fn count(&mut self) -> u32 {
        self.0.borrow().falling_edges
    }
}

#[derive(Debug)]
pub struct SimDelay(Rc<RefCell<State>>);

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().now_ns += u64::from(ns);
    }
}

#[derive(Debug)]
pub struct SimData(Rc<RefCell<State>>);

impl ErrorType for SimData {
    type Error = Infallible;
}

impl InputPin for SimData {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.borrow().dout_high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.borrow().dout_high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_msb_first() {
        let converter = Converter::new();
        let (mut clock, _, mut counter, mut data) = converter.split();

        converter.load(0b1010 << 20);
        clock.start(25);

        let mut bits = Vec::new();
        while clock.take_rising_edge() {
            bits.push(data.is_high().unwrap());
        }

        assert_eq!(&bits[..5], [true, false, true, false, false]);
        assert_eq!(bits.len(), 25);
        assert_eq!(counter.count(), 25);
        // DOUT returns high after the data bits.
        assert!(bits[24]);
    }

    #[test]
    fn powered_down_converter_stays_silent() {
        let converter = Converter::new();
        let (mut clock, mut edge, _, _) = converter.split();

        edge.enable();
        clock.set_level(PinState::High);
        assert!(!converter.load(0x12_3456));
        assert_eq!(converter.power_down_pulses(), 1);

        converter.delay().delay_us(75);
        clock.set_level(PinState::Low);
        assert_eq!(converter.last_high_hold_ns(), 75_000);
        assert!(converter.load(0x12_3456));
    }
}
