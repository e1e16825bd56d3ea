//! In-memory serial and Bluetooth platforms for integration tests.
//!
//! Each simulated micro:bit is a [`Wire`]: the test pushes inbound chunks
//! into it, the link writes outbound bytes into it, and every lifecycle
//! call on the port or GATT server is counted so tests can assert on the
//! teardown sequence.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;

use ubitlink::config::{
    BaudRate, UART_RX_CHARACTERISTIC_UUID, UART_SERVICE_UUID, UART_TX_CHARACTERISTIC_UUID,
    format_uuid,
};
use ubitlink::error::TransportError;
use ubitlink::link::ports::{
    BluetoothFilter, BluetoothPlatform, GattCharacteristic, GattDevice, GattService,
    SerialPlatform, SerialPort, SerialReader, SerialWriter, UsbFilter,
};

const WIRE_DEPTH: usize = 64;

enum Inbound {
    Chunk(Vec<u8>),
    Eof,
    Fail(TransportError),
}

// ── Wire ──────────────────────────────────────────────────────

/// One simulated device plus fault switches.
pub struct Wire {
    inbound: Channel<NoopRawMutex, Inbound, WIRE_DEPTH>,
    writes: RefCell<Vec<Vec<u8>>>,

    pub requested_vendor: Cell<Option<u16>>,
    pub requested_prefix: RefCell<Option<String>>,
    pub opened_at: Cell<Option<BaudRate>>,
    pub opens: Cell<u32>,
    pub closes: Cell<u32>,
    pub close_failures: Cell<u32>,
    pub port_open: Cell<bool>,
    pub writers_alive: Cell<u32>,
    pub releases: Cell<u32>,
    pub cancelled_reads: Cell<u32>,
    pub gatt_connected: Cell<bool>,
    pub gatt_disconnects: Cell<u32>,
    pub notifying: Cell<bool>,

    pub fail_request: Cell<bool>,
    pub fail_open: Cell<bool>,
    pub fail_write: Cell<bool>,
    pub fail_close: Cell<bool>,
    pub missing_service: Cell<bool>,
}

#[allow(dead_code)]
impl Wire {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            inbound: Channel::new(),
            writes: RefCell::new(Vec::new()),
            requested_vendor: Cell::new(None),
            requested_prefix: RefCell::new(None),
            opened_at: Cell::new(None),
            opens: Cell::new(0),
            closes: Cell::new(0),
            close_failures: Cell::new(0),
            port_open: Cell::new(false),
            writers_alive: Cell::new(0),
            releases: Cell::new(0),
            cancelled_reads: Cell::new(0),
            gatt_connected: Cell::new(false),
            gatt_disconnects: Cell::new(0),
            notifying: Cell::new(false),
            fail_request: Cell::new(false),
            fail_open: Cell::new(false),
            fail_write: Cell::new(false),
            fail_close: Cell::new(false),
            missing_service: Cell::new(false),
        })
    }

    /// Queue bytes as if the device had sent them in one chunk.
    pub fn send(&self, bytes: &[u8]) {
        self.push(Inbound::Chunk(bytes.to_vec()));
    }

    /// End the device's stream (cable pulled, device reset).
    pub fn hang_up(&self) {
        self.push(Inbound::Eof);
    }

    pub fn fail_next_read(&self, error: TransportError) {
        self.push(Inbound::Fail(error));
    }

    /// Every write the link made, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.borrow().clone()
    }

    pub fn written_text(&self) -> String {
        let bytes: Vec<u8> = self.writes.borrow().iter().flatten().copied().collect();
        String::from_utf8(bytes).expect("link wrote invalid UTF-8")
    }

    fn push(&self, item: Inbound) {
        if self.inbound.try_send(item).is_err() {
            panic!("mock wire full");
        }
    }

    fn record_write(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.fail_write.get() {
            return Err(TransportError::WriteFailure("device unplugged".into()));
        }
        self.writes.borrow_mut().push(data.to_vec());
        Ok(())
    }

    async fn next_chunk(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut pending = PendingRead {
            wire: self,
            armed: true,
        };
        let item = self.inbound.receive().await;
        pending.armed = false;
        match item {
            Inbound::Chunk(bytes) => Ok(Some(bytes)),
            Inbound::Eof => Ok(None),
            Inbound::Fail(e) => Err(e),
        }
    }
}

/// Counts reads dropped while still waiting.
struct PendingRead<'a> {
    wire: &'a Wire,
    armed: bool,
}

impl Drop for PendingRead<'_> {
    fn drop(&mut self) {
        if self.armed {
            let n = self.wire.cancelled_reads.get();
            self.wire.cancelled_reads.set(n + 1);
        }
    }
}

fn bump(counter: &Cell<u32>) {
    counter.set(counter.get() + 1);
}

// ── USB serial ────────────────────────────────────────────────

pub struct MockSerial {
    wire: Rc<Wire>,
}

impl MockSerial {
    pub fn new(wire: &Rc<Wire>) -> Self {
        Self { wire: wire.clone() }
    }
}

impl SerialPlatform for MockSerial {
    type Port = MockPort;

    async fn request_port(&mut self, filter: &UsbFilter) -> Result<MockPort, TransportError> {
        self.wire.requested_vendor.set(Some(filter.usb_vendor_id));
        if self.wire.fail_request.get() {
            return Err(TransportError::DeviceNotFound);
        }
        Ok(MockPort {
            wire: self.wire.clone(),
        })
    }
}

pub struct MockPort {
    wire: Rc<Wire>,
}

impl SerialPort for MockPort {
    type Reader = MockReader;
    type Writer = MockWriter;

    async fn open(
        &mut self,
        baud_rate: BaudRate,
    ) -> Result<(MockReader, MockWriter), TransportError> {
        if self.wire.fail_open.get() || self.wire.port_open.get() {
            return Err(TransportError::OpenFailure("port busy".into()));
        }
        bump(&self.wire.opens);
        bump(&self.wire.writers_alive);
        self.wire.port_open.set(true);
        self.wire.opened_at.set(Some(baud_rate));
        Ok((
            MockReader {
                wire: self.wire.clone(),
            },
            MockWriter {
                wire: self.wire.clone(),
            },
        ))
    }

    /// Fails, leaving the port open, while a writer is still alive.
    async fn close(&mut self) -> Result<(), TransportError> {
        bump(&self.wire.closes);
        if self.wire.fail_close.get() {
            bump(&self.wire.close_failures);
            return Err(TransportError::TeardownFailure("port stuck".into()));
        }
        if self.wire.writers_alive.get() > 0 {
            bump(&self.wire.close_failures);
            return Err(TransportError::TeardownFailure("writable stream is locked".into()));
        }
        self.wire.port_open.set(false);
        Ok(())
    }
}

pub struct MockReader {
    wire: Rc<Wire>,
}

impl SerialReader for MockReader {
    async fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.wire.next_chunk().await
    }

    async fn release(&mut self) -> Result<(), TransportError> {
        bump(&self.wire.releases);
        Ok(())
    }
}

pub struct MockWriter {
    wire: Rc<Wire>,
}

impl SerialWriter for MockWriter {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.wire.record_write(data)
    }
}

impl Drop for MockWriter {
    fn drop(&mut self) {
        let n = self.wire.writers_alive.get();
        self.wire.writers_alive.set(n - 1);
    }
}

// ── Bluetooth ─────────────────────────────────────────────────

pub struct MockBluetooth {
    wire: Rc<Wire>,
}

impl MockBluetooth {
    pub fn new(wire: &Rc<Wire>) -> Self {
        Self { wire: wire.clone() }
    }
}

impl BluetoothPlatform for MockBluetooth {
    type Device = MockDevice;

    async fn request_device(
        &mut self,
        filter: &BluetoothFilter,
    ) -> Result<MockDevice, TransportError> {
        *self.wire.requested_prefix.borrow_mut() = Some(filter.name_prefix.clone());
        if self.wire.fail_request.get() {
            return Err(TransportError::DeviceNotFound);
        }
        Ok(MockDevice {
            wire: self.wire.clone(),
        })
    }
}

pub struct MockDevice {
    wire: Rc<Wire>,
}

impl GattDevice for MockDevice {
    type Service = MockService;
    type Characteristic = MockCharacteristic;

    async fn connect_gatt(&mut self) -> Result<(), TransportError> {
        if self.wire.fail_open.get() {
            return Err(TransportError::OpenFailure("GATT connect failed".into()));
        }
        self.wire.gatt_connected.set(true);
        Ok(())
    }

    async fn primary_service(&mut self, uuid: u128) -> Result<MockService, TransportError> {
        if self.wire.missing_service.get() || uuid != UART_SERVICE_UUID {
            return Err(TransportError::ServiceUnavailable(format_uuid(uuid)));
        }
        Ok(MockService {
            wire: self.wire.clone(),
        })
    }

    fn is_gatt_connected(&self) -> bool {
        self.wire.gatt_connected.get()
    }

    fn disconnect_gatt(&mut self) -> Result<(), TransportError> {
        bump(&self.wire.gatt_disconnects);
        self.wire.gatt_connected.set(false);
        if self.wire.fail_close.get() {
            return Err(TransportError::TeardownFailure("GATT disconnect".into()));
        }
        Ok(())
    }
}

pub struct MockService {
    wire: Rc<Wire>,
}

impl GattService for MockService {
    type Characteristic = MockCharacteristic;

    async fn characteristic(&mut self, uuid: u128) -> Result<MockCharacteristic, TransportError> {
        if uuid != UART_TX_CHARACTERISTIC_UUID && uuid != UART_RX_CHARACTERISTIC_UUID {
            return Err(TransportError::ServiceUnavailable(format_uuid(uuid)));
        }
        Ok(MockCharacteristic {
            wire: self.wire.clone(),
        })
    }
}

pub struct MockCharacteristic {
    wire: Rc<Wire>,
}

impl GattCharacteristic for MockCharacteristic {
    async fn start_notifications(&mut self) -> Result<(), TransportError> {
        self.wire.notifying.set(true);
        Ok(())
    }

    async fn stop_notifications(&mut self) -> Result<(), TransportError> {
        self.wire.notifying.set(false);
        Ok(())
    }

    async fn next_value(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.wire.next_chunk().await
    }

    async fn write_value(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.wire.record_write(data)
    }
}
