//! GATT service publishing load cell readings as a 4 byte notify characteristic.
//!
//! The BLE stack itself sits behind [`GattServer`]. This crate only registers the service,
//! tracks the one connection it serves and decides when a reading goes out.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

use log::{debug, info};

/// Vendor specific 128 bit base UUID. Bytes 12 and 13 carry the 16 bit UUIDs below.
pub const BASE_UUID: [u8; 16] = [
    0x23, 0xD1, 0x13, 0xEF, 0x5F, 0x78, 0x23, 0x15, 0xDE, 0xEF, 0x12, 0x12, 0x00, 0x00, 0x00, 0x00,
];

pub const SERVICE_UUID: u16 = 0xF00D;

pub const CHARACTERISTIC_UUID: u16 = 0xBEEF;

/// Characteristic value length in bytes.
pub const VALUE_LEN: usize = 4;

/// Value exposed before the first reading arrives.
pub const INITIAL_VALUE: [u8; VALUE_LEN] = [0x12, 0x34, 0x56, 0x78];

/// A 16 bit UUID on top of a vendor base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uuid {
    pub base: [u8; 16],
    pub short: u16,
}

impl Uuid {
    pub const fn vendor(short: u16) -> Self {
        Self {
            base: BASE_UUID,
            short,
        }
    }

    /// Full UUID, little-endian as it goes over the air.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = self.base;
        bytes[12..14].copy_from_slice(&self.short.to_le_bytes());
        bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Properties {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

/// Everything the stack needs to add the characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub properties: Properties,
    pub max_len: usize,
    pub initial_value: [u8; VALUE_LEN],
}

/// The weight characteristic: readable and notifiable, never writable.
pub const WEIGHT_CHARACTERISTIC: Characteristic = Characteristic {
    uuid: Uuid::vendor(CHARACTERISTIC_UUID),
    properties: Properties {
        read: true,
        write: false,
        notify: true,
    },
    max_len: VALUE_LEN,
    initial_value: INITIAL_VALUE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHandle(pub u16);

/// Attribute handles assigned by the stack.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicHandles {
    pub value: u16,
    pub cccd: u16,
}

/// Connection events the service cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapEvent {
    Connected(ConnectionHandle),
    Disconnected,
    Other,
}

/// The BLE stack.
pub trait GattServer {
    type Error;

    /// Add a primary service, returning its handle.
    fn add_service(&mut self, uuid: Uuid) -> Result<u16, Self::Error>;

    fn add_characteristic(
        &mut self,
        service: u16,
        characteristic: &Characteristic,
    ) -> Result<CharacteristicHandles, Self::Error>;

    /// Send a handle value notification.
    fn notify(
        &mut self,
        connection: ConnectionHandle,
        value_handle: u16,
        data: &[u8],
    ) -> Result<(), Self::Error>;
}

/// State of the weight service.
#[derive(Debug)]
pub struct WeightService {
    connection: Option<ConnectionHandle>,
    service: u16,
    handles: CharacteristicHandles,
}

impl WeightService {
    /// Register the service and its characteristic with the stack.
    pub fn init<S: GattServer>(server: &mut S) -> Result<Self, S::Error> {
        let service = server.add_service(Uuid::vendor(SERVICE_UUID))?;
        let handles = server.add_characteristic(service, &WEIGHT_CHARACTERISTIC)?;

        info!("Weight service registered (service handle {service}, value handle {})", handles.value);

        Ok(Self {
            connection: None,
            service,
            handles,
        })
    }

    pub fn service_handle(&self) -> u16 {
        self.service
    }

    pub fn handles(&self) -> CharacteristicHandles {
        self.handles
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.connection
    }

    pub fn on_gap_event(&mut self, event: GapEvent) {
        match event {
            GapEvent::Connected(handle) => {
                debug!("Connected ({})", handle.0);
                self.connection = Some(handle);
            }
            GapEvent::Disconnected => {
                debug!("Disconnected");
                self.connection = None;
            }
            GapEvent::Other => {}
        }
    }

    /// Publish a reading. Returns `false` without touching the stack when nobody is connected.
    pub fn update<S: GattServer>(&self, server: &mut S, value: i32) -> Result<bool, S::Error> {
        let Some(connection) = self.connection else {
            return Ok(false);
        };

        server.notify(connection, self.handles.value, &value.to_le_bytes())?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct MockError;

    #[derive(Default)]
    struct MockServer {
        services: Vec<Uuid>,
        characteristics: Vec<(u16, Characteristic)>,
        notifications: Vec<(ConnectionHandle, u16, Vec<u8>)>,
        fail_notify: bool,
    }

    impl GattServer for MockServer {
        type Error = MockError;

        fn add_service(&mut self, uuid: Uuid) -> Result<u16, Self::Error> {
            self.services.push(uuid);
            Ok(0x000C)
        }

        fn add_characteristic(
            &mut self,
            service: u16,
            characteristic: &Characteristic,
        ) -> Result<CharacteristicHandles, Self::Error> {
            self.characteristics.push((service, *characteristic));
            Ok(CharacteristicHandles {
                value: 0x000E,
                cccd: 0x000F,
            })
        }

        fn notify(
            &mut self,
            connection: ConnectionHandle,
            value_handle: u16,
            data: &[u8],
        ) -> Result<(), Self::Error> {
            if self.fail_notify {
                return Err(MockError);
            }
            self.notifications
                .push((connection, value_handle, data.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn registers_service_and_characteristic() {
        let mut server = MockServer::default();
        let service = WeightService::init(&mut server).unwrap();

        assert_eq!(server.services, [Uuid::vendor(0xF00D)]);
        assert_eq!(server.characteristics, [(0x000C, WEIGHT_CHARACTERISTIC)]);
        assert_eq!(service.service_handle(), 0x000C);
        assert_eq!(service.handles().value, 0x000E);
        assert_eq!(service.connection(), None);

        let characteristic = server.characteristics[0].1;
        assert!(characteristic.properties.read);
        assert!(characteristic.properties.notify);
        assert!(!characteristic.properties.write);
        assert_eq!(characteristic.initial_value, [0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn uuid_layout() {
        let bytes = Uuid::vendor(0xBEEF).to_bytes();
        assert_eq!(bytes[..12], BASE_UUID[..12]);
        assert_eq!(bytes[12..14], [0xEF, 0xBE]);
        assert_eq!(bytes[14..], [0x00, 0x00]);
    }

    #[test]
    fn update_without_subscriber_is_a_no_op() {
        let mut server = MockServer::default();
        let service = WeightService::init(&mut server).unwrap();

        assert_eq!(service.update(&mut server, 1234), Ok(false));
        assert!(server.notifications.is_empty());
    }

    #[test]
    fn update_notifies_value_verbatim() {
        let mut server = MockServer::default();
        let mut service = WeightService::init(&mut server).unwrap();

        service.on_gap_event(GapEvent::Connected(ConnectionHandle(3)));
        service.on_gap_event(GapEvent::Other);

        assert_eq!(service.update(&mut server, -2), Ok(true));
        assert_eq!(service.update(&mut server, 0x0102_0304), Ok(true));
        assert_eq!(
            server.notifications,
            [
                (ConnectionHandle(3), 0x000E, vec![0xFE, 0xFF, 0xFF, 0xFF]),
                (ConnectionHandle(3), 0x000E, vec![0x04, 0x03, 0x02, 0x01]),
            ]
        );

        service.on_gap_event(GapEvent::Disconnected);
        assert_eq!(service.update(&mut server, 7), Ok(false));
        assert_eq!(server.notifications.len(), 2);
    }

    #[test]
    fn notify_failure_propagates() {
        let mut server = MockServer {
            fail_notify: true,
            ..Default::default()
        };
        let mut service = WeightService::init(&mut server).unwrap();
        service.on_gap_event(GapEvent::Connected(ConnectionHandle(1)));

        assert_eq!(service.update(&mut server, 1), Err(MockError));
    }
}
