use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, PinState};
use log::{debug, info, trace, warn};

use crate::capability::{ClockSource, EdgeNotifier, PulseCounter};
use crate::mode::ConversionMode;
use crate::sample::SampleAccumulator;
use crate::{Error, Event, POWER_DOWN_US, RESOLUTION};

/// Whether the driver is waiting for conversions, and how many.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SamplingState {
    #[default]
    Idle,
    /// One conversion, then power down.
    Single,
    /// Convert until [`Hx711::stop`].
    Continuous,
}

/// HX711 driver.
///
/// All work after [`Hx711::start`] happens in [`Hx711::handle_data_ready`], which the platform
/// calls from its DOUT falling edge interrupt.
pub struct Hx711<CLK, EDGE, CNT, DOUT, DELAY, F> {
    clock: CLK,
    edge: EDGE,
    counter: CNT,
    dout: DOUT,
    delay: DELAY,
    mode: ConversionMode,
    state: SamplingState,
    /// SCK was raised to power the converter down and has not been pulled low since.
    held_high: bool,
    handler: F,
}

impl<CLK, EDGE, CNT, DOUT, DELAY, F> Hx711<CLK, EDGE, CNT, DOUT, DELAY, F>
where
    CLK: ClockSource,
    EDGE: EdgeNotifier,
    CNT: PulseCounter,
    DOUT: InputPin,
    DELAY: DelayNs,
    F: FnMut(Event),
{
    /// Take ownership of the wired peripherals and hold the converter powered down.
    ///
    /// `handler` receives exactly one [`Event`] per conversion, from interrupt context. `delay`
    /// only waits out the power down pulse when [`Hx711::start`] follows a power down.
    pub fn new(
        mut clock: CLK,
        mut edge: EDGE,
        mut counter: CNT,
        dout: DOUT,
        delay: DELAY,
        mode: ConversionMode,
        handler: F,
    ) -> Self {
        edge.disable();
        counter.clear();
        clock.set_level(PinState::High);

        Self {
            clock,
            edge,
            counter,
            dout,
            delay,
            mode,
            state: SamplingState::Idle,
            held_high: true,
            handler,
        }
    }

    pub fn mode(&self) -> ConversionMode {
        self.mode
    }

    pub fn state(&self) -> SamplingState {
        self.state
    }

    /// Wake the converter and wait for conversions.
    ///
    /// With `single` the driver powers the converter down after one conversion, otherwise it
    /// keeps converting until [`Hx711::stop`].
    pub fn start(&mut self, single: bool) {
        self.state = if single {
            SamplingState::Single
        } else {
            SamplingState::Continuous
        };

        info!("Start sampling ({}, {:?})", self.mode, self.state);

        // Pulling SCK low early would cut the power down pulse short.
        if self.held_high {
            self.delay.delay_us(POWER_DOWN_US);
            self.held_high = false;
        }

        self.clock.set_level(PinState::Low);
        self.edge.enable();
    }

    /// Stop waiting for conversions and power the converter down.
    pub fn stop(&mut self) {
        if self.state == SamplingState::Idle {
            trace!("Stop while idle");
            return;
        }

        self.edge.disable();
        self.hold_power_down();
        self.state = SamplingState::Idle;

        info!("Stop sampling");
    }

    /// Release both pins and hand the peripherals back. A new driver is needed to resume.
    pub fn power_down(mut self) -> (CLK, EDGE, CNT, DOUT, DELAY) {
        self.edge.disable();
        self.clock.stop();
        self.clock.release();
        self.edge.release();

        info!("Power down");

        (self.clock, self.edge, self.counter, self.dout, self.delay)
    }

    /// DOUT falling edge handler: clock out one conversion and report it.
    pub fn handle_data_ready(&mut self) -> Result<(), Error<DOUT::Error>> {
        self.edge.disable();

        let continuous = match self.state {
            SamplingState::Idle => {
                trace!("Data ready while idle");
                return Ok(());
            }
            SamplingState::Single => false,
            SamplingState::Continuous => true,
        };

        let sample = match self.sample() {
            Ok(sample) => sample,
            Err(e) => {
                self.clock.stop();
                self.hold_power_down();
                self.state = SamplingState::Idle;
                return Err(Error::Pin(e));
            }
        };

        if !continuous {
            self.hold_power_down();
            self.state = SamplingState::Idle;
        }

        debug!("Number of bits: {}", sample.count());
        debug!("ADC val: {:#x}", sample.raw());

        (self.handler)(sample.into_event());

        if continuous {
            self.edge.enable();
        }

        Ok(())
    }

    /// Raise SCK. The converter powers down once it has been high for [`POWER_DOWN_US`].
    fn hold_power_down(&mut self) {
        self.clock.set_level(PinState::High);
        self.held_high = true;
    }

    fn sample(&mut self) -> Result<SampleAccumulator, DOUT::Error> {
        let mut sample = SampleAccumulator::new();

        self.counter.clear();
        self.clock.start(self.mode.pulses());

        'bits: while !sample.is_complete() {
            loop {
                // Falling edges past the resolution mean a pulse went by unseen.
                let edges = self.counter.count();
                if edges >= RESOLUTION {
                    warn!(
                        "Readout out of sync after {} bits ({} clock edges)",
                        sample.count(),
                        edges
                    );
                    break 'bits;
                }

                if self.clock.take_rising_edge() {
                    break;
                }
            }

            sample.push(self.dout.is_high()?);
        }

        self.clock.finish();

        Ok(sample)
    }
}
