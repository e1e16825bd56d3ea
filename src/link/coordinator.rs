//! Connection coordinator: the single surface the UI talks to.
//!
//! Owns one session per transport kind and enforces that at most one of
//! them is connecting or connected.  Outbound lines go to whichever is up;
//! inbound messages go to one replaceable handler.
//!
//! Nothing here returns a panic or a raw platform error to the UI: toggles
//! report the resulting connected state, writes are fire-and-forget.

use std::rc::Rc;

use log::{debug, info, warn};

use crate::config::{BaudRate, ExclusivityPolicy, LinkConfig};
use crate::error::TransportError;

use super::LinkExecutor;
use super::codec::encode_line;
use super::dispatch::Dispatcher;
use super::ports::{BluetoothPlatform, SerialPlatform};
use super::session::TransportSession;
use super::state::{TransportKind, TransportState};

type Session<U, B> =
    TransportSession<<U as SerialPlatform>::Port, <B as BluetoothPlatform>::Device>;

pub struct ConnectionCoordinator<U: SerialPlatform, B: BluetoothPlatform> {
    executor: Rc<LinkExecutor<'static>>,
    config: LinkConfig,
    serial: U,
    bluetooth: B,
    usb: Session<U, B>,
    ble: Session<U, B>,
    dispatch: Rc<Dispatcher>,
}

impl<U, B> ConnectionCoordinator<U, B>
where
    U: SerialPlatform,
    B: BluetoothPlatform,
{
    pub fn new(
        executor: Rc<LinkExecutor<'static>>,
        serial: U,
        bluetooth: B,
        config: LinkConfig,
    ) -> Self {
        Self {
            executor,
            config,
            serial,
            bluetooth,
            usb: TransportSession::new(TransportKind::Usb),
            ble: TransportSession::new(TransportKind::Bluetooth),
            dispatch: Rc::new(Dispatcher::new()),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    // ── Observers ────────────────────────────────────────────

    /// Install the message handler, replacing any previous one.
    ///
    /// Called synchronously on the decode path, once per message, in
    /// arrival order.
    pub fn on_message(&mut self, handler: impl FnMut(&str) + 'static) {
        self.dispatch.set_handler(Box::new(handler));
    }

    /// Remove the handler; messages are logged instead.
    pub fn clear_handler(&mut self) {
        self.dispatch.clear_handler();
    }

    /// Install a tap that sees every raw inbound chunk before decoding,
    /// e.g. to keep a transcript.  `None` removes it.
    pub fn on_raw_chunk(&mut self, tap: Option<Box<dyn FnMut(&[u8])>>) {
        self.dispatch.set_tap(tap);
    }

    // ── State ────────────────────────────────────────────────

    pub fn usb_state(&self) -> TransportState {
        self.usb.state()
    }

    pub fn bluetooth_state(&self) -> TransportState {
        self.ble.state()
    }

    pub fn is_usb_connected(&self) -> bool {
        self.usb.is_connected()
    }

    pub fn is_bluetooth_connected(&self) -> bool {
        self.ble.is_connected()
    }

    pub fn is_connected(&self) -> bool {
        self.active_transport().is_some()
    }

    /// The transport writes are routed to, USB first.
    pub fn active_transport(&self) -> Option<TransportKind> {
        if self.usb.is_connected() {
            Some(TransportKind::Usb)
        } else if self.ble.is_connected() {
            Some(TransportKind::Bluetooth)
        } else {
            None
        }
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Connect USB at `baud_rate` if disconnected, else disconnect it.
    /// Returns the resulting USB connected state.
    pub async fn toggle_usb(&mut self, baud_rate: BaudRate) -> bool {
        if self.usb.is_connected() {
            self.disconnect_usb().await;
        } else if let Err(e) = self.connect_usb(baud_rate).await {
            debug!("USB toggle: {}", e);
        }
        self.usb.is_connected()
    }

    /// Connect Bluetooth if disconnected, else disconnect it.
    /// Returns the resulting Bluetooth connected state.
    pub async fn toggle_bluetooth(&mut self) -> bool {
        if self.ble.is_connected() {
            self.disconnect_bluetooth().await;
        } else if let Err(e) = self.connect_bluetooth().await {
            debug!("Bluetooth toggle: {}", e);
        }
        self.ble.is_connected()
    }

    pub async fn connect_usb(&mut self, baud_rate: BaudRate) -> Result<(), TransportError> {
        self.claim(TransportKind::Usb).await?;
        self.config.baud_rate = baud_rate;
        self.usb
            .connect_usb(&mut self.serial, &self.config, &self.dispatch, &self.executor)
            .await
    }

    pub async fn connect_bluetooth(&mut self) -> Result<(), TransportError> {
        self.claim(TransportKind::Bluetooth).await?;
        self.ble
            .connect_bluetooth(&mut self.bluetooth, &self.config, &self.dispatch, &self.executor)
            .await
    }

    pub async fn disconnect_usb(&mut self) -> TransportState {
        self.usb.disconnect().await
    }

    pub async fn disconnect_bluetooth(&mut self) -> TransportState {
        self.ble.disconnect().await
    }

    pub async fn disconnect_all(&mut self) {
        self.usb.disconnect().await;
        self.ble.disconnect().await;
    }

    /// Apply the exclusivity policy before `kind` connects.
    async fn claim(&mut self, kind: TransportKind) -> Result<(), TransportError> {
        let other = match kind.other() {
            TransportKind::Usb => &mut self.usb,
            TransportKind::Bluetooth => &mut self.ble,
        };
        if !other.state().is_active() {
            return Ok(());
        }
        match self.config.exclusivity {
            ExclusivityPolicy::Refuse => {
                warn!("{}: refused, {} is {:?}", kind, other.kind(), other.state());
                Err(TransportError::Busy)
            }
            ExclusivityPolicy::ForceDisconnect => {
                info!("{}: disconnecting {} first", kind, other.kind());
                other.disconnect().await;
                Ok(())
            }
        }
    }

    // ── Output ───────────────────────────────────────────────

    /// Send `text` plus the delimiter on the connected transport.
    /// No-op when nothing is connected.
    pub async fn write_line(&mut self, text: &str) -> bool {
        let line = encode_line(text, self.config.delimiter);
        self.write_bytes(&line).await
    }

    /// Send `text` as-is on the connected transport.
    pub async fn write_string(&mut self, text: &str) -> bool {
        self.write_bytes(text.as_bytes()).await
    }

    async fn write_bytes(&mut self, data: &[u8]) -> bool {
        match self.active_transport() {
            Some(TransportKind::Usb) => self.usb.send(data).await,
            Some(TransportKind::Bluetooth) => self.ble.send(data).await,
            None => {
                debug!("write: no transport connected");
                false
            }
        }
    }
}
