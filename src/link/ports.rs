//! Port traits: the boundary between the link core and the platform.
//!
//! ```text
//!   Platform adapter ──▶ Port trait ──▶ TransportSession (core)
//! ```
//!
//! A host binding (Web Serial / Web Bluetooth, a native serial crate, a
//! test mock) implements these traits.  The session consumes them via
//! generics, so the core never touches a platform handle directly.
//!
//! All methods are `async`; every `.await` on them is a suspension point
//! of the single-threaded link executor.  Dropping a pending `read` or
//! `next_value` future must cancel the underlying read.

#![allow(async_fn_in_trait)]

use crate::config::BaudRate;
use crate::error::TransportError;

// ───────────────────────────────────────────────────────────────
// Device filters
// ───────────────────────────────────────────────────────────────

/// Port chooser filter for USB serial devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbFilter {
    pub usb_vendor_id: u16,
}

/// Device chooser filter for Bluetooth devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BluetoothFilter {
    pub name_prefix: String,
    /// Services the page must be allowed to access after connecting.
    pub optional_services: Vec<u128>,
}

// ───────────────────────────────────────────────────────────────
// USB serial
// ───────────────────────────────────────────────────────────────

/// Grants access to serial ports.
pub trait SerialPlatform {
    type Port: SerialPort + 'static;

    /// Ask the platform (and usually the user) for a port matching `filter`.
    async fn request_port(&mut self, filter: &UsbFilter) -> Result<Self::Port, TransportError>;
}

/// A serial port that has been granted but not yet opened.
pub trait SerialPort {
    type Reader: SerialReader + 'static;
    type Writer: SerialWriter + 'static;

    /// Open the port and split it into its readable and writable halves.
    async fn open(
        &mut self,
        baud_rate: BaudRate,
    ) -> Result<(Self::Reader, Self::Writer), TransportError>;

    /// Close the port.  Called once both halves are released.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Readable half of an open serial port.
pub trait SerialReader {
    /// Wait for the next chunk.  `Ok(None)` means the stream has ended.
    async fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Cancel outstanding reads and release the reader lock.
    async fn release(&mut self) -> Result<(), TransportError>;
}

/// Writable half of an open serial port.
pub trait SerialWriter {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Bluetooth GATT
// ───────────────────────────────────────────────────────────────

/// Grants access to Bluetooth devices.
pub trait BluetoothPlatform {
    type Device: GattDevice + 'static;

    /// Ask the platform (and usually the user) for a device matching `filter`.
    async fn request_device(
        &mut self,
        filter: &BluetoothFilter,
    ) -> Result<Self::Device, TransportError>;
}

/// A Bluetooth device with a GATT server.
pub trait GattDevice {
    type Service: GattService<Characteristic = Self::Characteristic>;
    type Characteristic: GattCharacteristic + 'static;

    async fn connect_gatt(&mut self) -> Result<(), TransportError>;

    async fn primary_service(&mut self, uuid: u128) -> Result<Self::Service, TransportError>;

    fn is_gatt_connected(&self) -> bool;

    /// Drop the GATT connection.  Synchronous on every platform we target.
    fn disconnect_gatt(&mut self) -> Result<(), TransportError>;
}

/// A primary GATT service.
pub trait GattService {
    type Characteristic: GattCharacteristic;

    async fn characteristic(&mut self, uuid: u128)
    -> Result<Self::Characteristic, TransportError>;
}

/// A GATT characteristic supporting notify and/or write.
pub trait GattCharacteristic {
    async fn start_notifications(&mut self) -> Result<(), TransportError>;

    async fn stop_notifications(&mut self) -> Result<(), TransportError>;

    /// Wait for the next value-changed notification.  `Ok(None)` means the
    /// device went away.
    async fn next_value(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    async fn write_value(&mut self, data: &[u8]) -> Result<(), TransportError>;
}
