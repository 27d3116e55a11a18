use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc};

use anyhow::anyhow;
use hx711::{Event, Hx711, SamplingState};
use log::{info, warn};
use rppal::gpio::{Gpio, Mode, Trigger};

mod config;
mod raspberry_pi;

use config::Config;
use raspberry_pi::{BitBangClock, EdgeCount, InterruptGate, SpinDelay};

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;

    if config.slip_every != 0 {
        warn!("HX711_SLIP_EVERY only applies to the simulator, ignoring it");
    }

    let gpio = Gpio::new()?;

    let edges = Arc::new(AtomicU32::new(0));
    let armed = Arc::new(AtomicBool::new(false));

    let clock = BitBangClock::new(
        gpio.get(config.sck_pin)?.into_io(Mode::Output),
        SpinDelay,
        edges.clone(),
    );

    // rppal runs interrupt callbacks on its own thread; the handler runs here, on the main thread.
    let (data_ready, interrupts) = mpsc::channel();
    let gate = armed.clone();

    let mut dout = gpio.get(config.dout_pin)?.into_input();
    dout.set_async_interrupt(Trigger::FallingEdge, move |_| {
        if gate.load(Ordering::Acquire) {
            let _ = data_ready.send(());
        }
    })?;

    let delivered = Cell::new(0usize);
    let errors = Cell::new(0usize);

    let mut hx711 = Hx711::new(
        clock,
        InterruptGate::new(armed),
        EdgeCount::new(edges),
        dout,
        SpinDelay,
        config.mode,
        |event| {
            delivered.set(delivered.get() + 1);
            match event {
                Event::DataReady(value) => {
                    errors.set(0);
                    info!("Reading: {value}");
                }
                Event::DataError(raw) => {
                    errors.set(errors.get() + 1);
                    warn!("Out of sync, partial value {raw:#08x}");
                }
            }
        },
    );

    hx711.start(config.single);

    let mut result = Ok(());

    for () in interrupts.iter() {
        if let Err(e) = hx711.handle_data_ready() {
            result = Err(anyhow!("{e}"));
            break;
        }

        if errors.get() >= 3 {
            hx711.stop();
            result = Err(anyhow!(
                "{} conversions in a row lost sync, check the wiring",
                errors.get()
            ));
            break;
        }

        if hx711.state() == SamplingState::Idle {
            break;
        }

        if config.samples != 0 && delivered.get() >= config.samples {
            hx711.stop();
            break;
        }
    }

    // Release the pins whether or not the run failed.
    let (_, _, _, mut dout, _) = hx711.power_down();
    dout.clear_async_interrupt()?;

    result
}
