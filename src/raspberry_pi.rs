//! HX711 capabilities on Raspberry Pi GPIO.
//!
//! The Pi has no timer that can be routed to a pin and stopped after a set number of pulses, so
//! PD_SCK is bit-banged, one pulse per rising edge the driver asks for. The pulse counter is fed by
//! that same loop. Preemption by the kernel can still stretch a high phase past the power down
//! threshold, which shows up as a bad reading rather than a sync error.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;
use hx711::{ClockSource, EdgeNotifier, PulseCounter, SCK_FREQUENCY_HZ};
use rppal::gpio::{IoPin, Mode};

const HALF_PERIOD_NS: u32 = 500_000_000 / SCK_FREQUENCY_HZ;

/// Busy-waiting delay.
///
/// rppal's `Delay` sleeps, and a sleep of even a microsecond can keep SCK high past the power
/// down threshold.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinDelay;

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        let duration = Duration::from_nanos(u64::from(ns));
        let start = Instant::now();
        while start.elapsed() < duration {
            std::hint::spin_loop();
        }
    }
}

/// PD_SCK driven from the CPU.
pub struct BitBangClock<D> {
    pin: IoPin,
    delay: D,
    armed: u32,
    emitted: u32,
    edges: Arc<AtomicU32>,
}

impl<D: DelayNs> BitBangClock<D> {
    pub fn new(mut pin: IoPin, delay: D, edges: Arc<AtomicU32>) -> Self {
        pin.set_mode(Mode::Output);

        Self {
            pin,
            delay,
            armed: 0,
            emitted: 0,
            edges,
        }
    }

    fn pulse(&mut self) {
        self.pin.set_high();
        self.delay.delay_ns(HALF_PERIOD_NS);
        self.pin.set_low();
        self.edges.fetch_add(1, Ordering::Release);
        self.emitted += 1;
        self.delay.delay_ns(HALF_PERIOD_NS);
    }
}

impl<D: DelayNs> ClockSource for BitBangClock<D> {
    fn start(&mut self, pulses: u32) {
        self.armed = pulses;
        self.emitted = 0;
        self.pin.set_low();
    }

    fn take_rising_edge(&mut self) -> bool {
        if self.emitted >= self.armed {
            return false;
        }

        self.pulse();
        true
    }

    fn finish(&mut self) {
        while self.emitted < self.armed {
            self.pulse();
        }
    }

    fn stop(&mut self) {
        self.armed = self.emitted;
    }

    fn set_level(&mut self, level: PinState) {
        self.pin.set_mode(Mode::Output);
        match level {
            PinState::High => self.pin.set_high(),
            PinState::Low => self.pin.set_low(),
        }
    }

    fn release(&mut self) {
        self.pin.set_mode(Mode::Input);
    }
}

/// Falling edges emitted by [`BitBangClock`].
///
/// The count is bumped by the same pulse the capture path waits for, so it always equals the
/// number of bits read and the driver's sync check never trips on the Pi. A missed edge can only
/// come from the converter powering down mid-read, which this counter cannot see.
pub struct EdgeCount(Arc<AtomicU32>);

impl EdgeCount {
    pub fn new(edges: Arc<AtomicU32>) -> Self {
        Self(edges)
    }
}

impl PulseCounter for EdgeCount {
    fn clear(&mut self) {
        self.0.store(0, Ordering::Release);
    }

    fn count(&mut self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

/// Gates the DOUT falling edge interrupt registered with rppal.
///
/// The interrupt itself stays registered on the pin for the lifetime of the driver; the callback
/// checks this flag before dispatching.
pub struct InterruptGate(Arc<AtomicBool>);

impl InterruptGate {
    pub fn new(armed: Arc<AtomicBool>) -> Self {
        Self(armed)
    }
}

impl EdgeNotifier for InterruptGate {
    fn enable(&mut self) {
        self.0.store(true, Ordering::Release);
    }

    fn disable(&mut self) {
        self.0.store(false, Ordering::Release);
    }

    fn release(&mut self) {
        self.disable();
    }
}
