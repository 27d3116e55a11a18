//! Run the HX711 driver against a simulated load cell and publish the readings through the
//! weight service, with a stand-in BLE stack that logs what it would send.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::anyhow;
use hx711::sim::Converter;
use hx711::{Event, Hx711, SamplingState};
use log::{info, warn};
use weight_service::{
    Characteristic, CharacteristicHandles, ConnectionHandle, GapEvent, GattServer, Uuid,
    WeightService,
};

mod config;

use config::Config;

/// Raw reading of the empty scale.
const TARE: i32 = -52_000;

/// Counts added per conversion while the load settles.
const STEP: i32 = 7_500;

/// A load placed on the cell, settling over a few conversions with a little ripple on top.
fn load_cell_raw(n: usize) -> u32 {
    let settle = (n.min(12) as i32) * STEP;
    let ripple = [0, 13, -8, 4, -11, 6][n % 6];

    (TARE + settle + ripple) as u32 & 0xFF_FFFF
}

/// BLE stack stand-in that logs notifications.
#[derive(Default)]
struct ConsoleServer {
    next_handle: u16,
}

impl GattServer for ConsoleServer {
    type Error = anyhow::Error;

    fn add_service(&mut self, uuid: Uuid) -> Result<u16, Self::Error> {
        self.next_handle += 1;
        info!("Service {:#06x} -> handle {}", uuid.short, self.next_handle);
        Ok(self.next_handle)
    }

    fn add_characteristic(
        &mut self,
        _service: u16,
        characteristic: &Characteristic,
    ) -> Result<CharacteristicHandles, Self::Error> {
        let handles = CharacteristicHandles {
            value: self.next_handle + 2,
            cccd: self.next_handle + 3,
        };
        self.next_handle += 3;
        info!(
            "Characteristic {:#06x} -> value handle {}",
            characteristic.uuid.short, handles.value
        );
        Ok(handles)
    }

    fn notify(
        &mut self,
        connection: ConnectionHandle,
        value_handle: u16,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        info!("Notify conn {} handle {}: {:02x?}", connection.0, value_handle, data);
        Ok(())
    }
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;

    info!(
        "Simulating HX711 on PD_SCK {} / DOUT {} ({}, {})",
        config.sck_pin,
        config.dout_pin,
        config.mode,
        if config.single { "single" } else { "continuous" }
    );

    let mut server = ConsoleServer::default();
    let mut service = WeightService::init(&mut server)?;

    let converter = Converter::new();
    let (clock, edge, counter, data) = converter.split();

    let pending = RefCell::new(VecDeque::new());

    let mut hx711 = Hx711::new(
        clock,
        edge,
        counter,
        data,
        converter.delay(),
        config.mode,
        |event| pending.borrow_mut().push_back(event),
    );

    hx711.start(config.single);

    let mut errors = 0;

    for n in 0.. {
        if config.samples != 0 && n >= config.samples {
            break;
        }

        if config.slip_every != 0 && n % config.slip_every == config.slip_every - 1 {
            converter.slip(1);
        }

        // Interrupt dispatch: the handler runs only if DOUT fell with notifications enabled.
        if converter.load(load_cell_raw(n)) {
            hx711.handle_data_ready().map_err(|e| anyhow!("{e}"))?;
        }

        // A subscriber shows up after the first reading.
        if n == 1 {
            service.on_gap_event(GapEvent::Connected(ConnectionHandle(0)));
        }

        while let Some(event) = pending.borrow_mut().pop_front() {
            match event {
                Event::DataReady(_) => {
                    errors = 0;
                    let value = event.value();
                    info!("Reading {n}: {value}");
                    if !service.update(&mut server, value)? {
                        info!("No subscriber, reading not sent");
                    }
                }
                Event::DataError(raw) => {
                    errors += 1;
                    warn!("Reading {n} out of sync, partial value {raw:#08x}");
                }
            }
        }

        if errors >= 3 {
            return Err(anyhow!("{errors} conversions in a row lost sync, check the wiring"));
        }

        if hx711.state() == SamplingState::Idle {
            info!("Single conversion done");
            break;
        }
    }

    hx711.stop();
    let _ = hx711.power_down();

    service.on_gap_event(GapEvent::Disconnected);

    Ok(())
}
