//! Open channels: tagged USB / Bluetooth variants behind one interface.
//!
//! Opening a transport yields two halves:
//!
//! | Half              | USB                       | Bluetooth                     |
//! |-------------------|---------------------------|-------------------------------|
//! | `InboundChannel`  | port + readable reader    | device + TX characteristic    |
//! | `OutboundChannel` | writable writer           | RX characteristic             |
//!
//! The inbound half is moved into the read pump.  The outbound half lives
//! in an [`OutboundSlot`] shared by the session (which writes through it)
//! and the pump (which empties it before releasing the inbound half, since
//! a port cannot close while its writer is alive).  Both halves are matched
//! on internally, so no call site needs to know which transport is active.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, info, warn};

use crate::config::{
    BluetoothFraming, LinkConfig, UART_RX_CHARACTERISTIC_UUID, UART_SERVICE_UUID,
    UART_TX_CHARACTERISTIC_UUID, format_uuid,
};
use crate::error::TransportError;

use super::ports::{
    BluetoothFilter, BluetoothPlatform, GattCharacteristic, GattDevice, GattService,
    SerialPlatform, SerialPort, SerialReader, SerialWriter, UsbFilter,
};
use super::state::TransportKind;

// ── Inbound half ─────────────────────────────────────────────

pub enum InboundChannel<P: SerialPort, D: GattDevice> {
    Usb {
        port: P,
        reader: P::Reader,
    },
    Bluetooth {
        device: D,
        tx: D::Characteristic,
        framing: BluetoothFraming,
    },
}

impl<P: SerialPort, D: GattDevice> InboundChannel<P, D> {
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Usb { .. } => TransportKind::Usb,
            Self::Bluetooth { .. } => TransportKind::Bluetooth,
        }
    }

    /// True when every chunk is already one whole message.
    pub fn is_message_framed(&self) -> bool {
        matches!(
            self,
            Self::Bluetooth {
                framing: BluetoothFraming::PerNotification,
                ..
            }
        )
    }

    /// Wait for the next raw chunk.  `Ok(None)` is end of stream.
    pub async fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self {
            Self::Usb { reader, .. } => reader.read().await,
            Self::Bluetooth { tx, .. } => tx.next_value().await,
        }
    }

    /// Release the reader and close the underlying port or GATT link.
    ///
    /// Every step runs even if an earlier one fails; the first failure is
    /// returned.
    pub async fn release(self) -> Result<(), TransportError> {
        match self {
            Self::Usb { mut port, mut reader } => {
                let released = reader.release().await;
                drop(reader);
                let closed = port.close().await;
                released.and(closed)
            }
            Self::Bluetooth {
                mut device, mut tx, ..
            } => {
                let stopped = tx.stop_notifications().await;
                drop(tx);
                let disconnected = if device.is_gatt_connected() {
                    device.disconnect_gatt()
                } else {
                    Ok(())
                };
                stopped.and(disconnected)
            }
        }
    }
}

// ── Outbound half ────────────────────────────────────────────

pub enum OutboundChannel<P: SerialPort, D: GattDevice> {
    Usb(P::Writer),
    Bluetooth {
        rx: D::Characteristic,
        max_write: usize,
    },
}

impl<P: SerialPort, D: GattDevice> OutboundChannel<P, D> {
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Usb(_) => TransportKind::Usb,
            Self::Bluetooth { .. } => TransportKind::Bluetooth,
        }
    }

    /// Write `data`.  Bluetooth writes are split into characteristic-sized
    /// pieces; a failed piece aborts the rest.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self {
            Self::Usb(writer) => writer.write(data).await,
            Self::Bluetooth { rx, max_write } => {
                for piece in data.chunks((*max_write).max(1)) {
                    rx.write_value(piece).await?;
                }
                Ok(())
            }
        }
    }
}

// ── Outbound slot ────────────────────────────────────────────

/// Shared home of the outbound half for one session.
///
/// A write takes the channel out of the slot for the duration of the
/// `.await` so no `RefCell` borrow is held across it.  Whoever tears the
/// session down calls [`close`](Self::close), which waits out an in-flight
/// write and drops the channel.
pub struct OutboundSlot<P: SerialPort, D: GattDevice> {
    channel: RefCell<Option<OutboundChannel<P, D>>>,
    closed: Cell<bool>,
    in_flight: Cell<bool>,
    returned: Signal<NoopRawMutex, ()>,
}

impl<P: SerialPort, D: GattDevice> OutboundSlot<P, D> {
    pub fn new(channel: OutboundChannel<P, D>) -> Self {
        Self {
            channel: RefCell::new(Some(channel)),
            closed: Cell::new(false),
            in_flight: Cell::new(false),
            returned: Signal::new(),
        }
    }

    /// Write through the slot.  `None` if the channel is gone (closed, or
    /// lost to a cancelled write).
    pub async fn write(&self, data: &[u8]) -> Option<Result<(), TransportError>> {
        let mut channel = self.channel.borrow_mut().take()?;
        let _flight = InFlight::enter(self);
        let result = channel.write(data).await;
        if self.closed.get() {
            drop(channel);
        } else {
            *self.channel.borrow_mut() = Some(channel);
        }
        Some(result)
    }

    /// Drop the outbound half, waiting for an in-flight write to hand it
    /// back first.  Idempotent.
    pub async fn close(&self) {
        self.closed.set(true);
        while self.in_flight.get() {
            self.returned.wait().await;
        }
        if let Some(channel) = self.channel.borrow_mut().take() {
            debug!("{}: writer released", channel.kind());
        }
    }
}

/// Marks a write in flight; clearing happens on drop so a cancelled write
/// still wakes a waiting `close`.
struct InFlight<'s, P: SerialPort, D: GattDevice> {
    slot: &'s OutboundSlot<P, D>,
}

impl<'s, P: SerialPort, D: GattDevice> InFlight<'s, P, D> {
    fn enter(slot: &'s OutboundSlot<P, D>) -> Self {
        slot.in_flight.set(true);
        Self { slot }
    }
}

impl<P: SerialPort, D: GattDevice> Drop for InFlight<'_, P, D> {
    fn drop(&mut self) {
        self.slot.in_flight.set(false);
        self.slot.returned.signal(());
    }
}

// ── Opening ──────────────────────────────────────────────────

pub type OpenChannel<P, D> = (InboundChannel<P, D>, OutboundChannel<P, D>);

/// Request a micro:bit serial port and open it at the configured rate.
pub async fn open_usb<S, D>(
    platform: &mut S,
    config: &LinkConfig,
) -> Result<OpenChannel<S::Port, D>, TransportError>
where
    S: SerialPlatform,
    D: GattDevice,
{
    let baud_rate = config.baud_rate;
    if baud_rate.get() == 0 {
        return Err(TransportError::InvalidBaudRate(0));
    }

    let filter = UsbFilter {
        usb_vendor_id: config.usb_vendor_id,
    };
    debug!("USB: requesting port (vendor 0x{:04x})", filter.usb_vendor_id);
    let mut port = platform.request_port(&filter).await?;

    let (reader, writer) = port.open(baud_rate).await?;
    info!("USB: port open at {} baud", baud_rate);

    Ok((
        InboundChannel::Usb { port, reader },
        OutboundChannel::Usb(writer),
    ))
}

/// Request a micro:bit over Bluetooth and bind its UART characteristics.
pub async fn open_bluetooth<B, P>(
    platform: &mut B,
    config: &LinkConfig,
) -> Result<OpenChannel<P, B::Device>, TransportError>
where
    B: BluetoothPlatform,
    P: SerialPort,
{
    let filter = BluetoothFilter {
        name_prefix: config.bluetooth_name_prefix.clone(),
        optional_services: vec![UART_SERVICE_UUID],
    };
    info!("Bluetooth: requesting device ({:?}...)", filter.name_prefix);
    let mut device = platform.request_device(&filter).await?;

    info!("Bluetooth: connecting to GATT server");
    device.connect_gatt().await?;

    match bind_uart(&mut device).await {
        Ok((tx, rx)) => Ok((
            InboundChannel::Bluetooth {
                device,
                tx,
                framing: config.bluetooth_framing,
            },
            OutboundChannel::Bluetooth {
                rx,
                max_write: config.bluetooth_max_write,
            },
        )),
        Err(e) => {
            if let Err(teardown) = device.disconnect_gatt() {
                warn!("Bluetooth: GATT disconnect after failed setup: {}", teardown);
            }
            Err(e)
        }
    }
}

async fn bind_uart<D: GattDevice>(
    device: &mut D,
) -> Result<(D::Characteristic, D::Characteristic), TransportError> {
    debug!("Bluetooth: getting service {}", format_uuid(UART_SERVICE_UUID));
    let mut service = device.primary_service(UART_SERVICE_UUID).await?;

    debug!("Bluetooth: getting characteristics");
    let mut tx = service.characteristic(UART_TX_CHARACTERISTIC_UUID).await?;
    tx.start_notifications().await?;
    let rx = service.characteristic(UART_RX_CHARACTERISTIC_UUID).await?;

    Ok((tx, rx))
}
