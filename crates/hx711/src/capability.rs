//! Peripheral capabilities the driver is built on.
//!
//! On a microcontroller these map onto a timer driving SCK, a counter fed by the SCK falling
//! edges through the event interconnect, and a GPIO edge-detect channel on DOUT. The driver only
//! sees these traits.

use embedded_hal::digital::PinState;

/// Generates the serial clock on PD_SCK.
pub trait ClockSource {
    /// Arm a train of `pulses` clock periods. The train halts by itself after the last period.
    fn start(&mut self, pulses: u32);

    /// Returns `true` if a rising edge occurred since the last call, clearing the event.
    fn take_rising_edge(&mut self) -> bool;

    /// Let the armed pulse train run to completion.
    ///
    /// Hardware that stops the timer from the pulse counter's compare event has nothing to do.
    fn finish(&mut self) {}

    /// Halt the pulse train immediately.
    fn stop(&mut self);

    /// Hold the clock line at a static level.
    fn set_level(&mut self, level: PinState);

    /// Return the clock pin to its default, unconfigured state.
    fn release(&mut self);
}

/// Falling edge notification on DOUT.
pub trait EdgeNotifier {
    fn enable(&mut self);

    fn disable(&mut self);

    /// Tear down the edge detection and return DOUT to its default state.
    fn release(&mut self);
}

/// Counts SCK falling edges independently of the capture path.
pub trait PulseCounter {
    fn clear(&mut self);

    fn count(&mut self) -> u32;
}
