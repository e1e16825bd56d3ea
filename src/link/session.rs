//! Transport session: one physical connection and its read pump.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  TransportSession                                        │
//!  │                                                          │
//!  │   connect ──▶ open channel ──┬──▶ OutboundChannel (send) │
//!  │                              │                           │
//!  │                              └──▶ read pump (spawned)    │
//!  │                                   ┌──────────────────┐   │
//!  │                 stop signal ─────▶│ or(stop, read)   │   │
//!  │                                   │  → FrameDecoder  │   │
//!  │                                   │  → Dispatcher    │   │
//!  │                 done signal ◀─────│ release channel  │   │
//!  │                                   └──────────────────┘   │
//!  └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The pump runs as a local task on the link executor.  `disconnect` closes
//! the outbound slot and raises the stop signal; the pending read loses the
//! race in `future::or`, its future is dropped (cancelling the platform
//! read) and the pump releases the channel before raising the done signal
//! that `disconnect` awaits.  When the device ends the stream the pump
//! closes the outbound slot itself before releasing, so the port is never
//! closed under a live writer.
//!
//! Each session gets a fresh [`FrameDecoder`], owned by its pump, so bytes
//! from a previous connection are never stitched into a new message.

use core::cell::Cell;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::TransportError;

use super::LinkExecutor;
use super::channel::{self, InboundChannel, OutboundSlot};
use super::codec::FrameDecoder;
use super::dispatch::Dispatcher;
use super::ports::{BluetoothPlatform, GattDevice, SerialPlatform, SerialPort};
use super::state::{TransportKind, TransportState};

type PumpSignal = Signal<NoopRawMutex, ()>;

/// Handles kept by the session to stop and join its pump.
struct PumpHandle {
    stop: Rc<PumpSignal>,
    done: Rc<PumpSignal>,
}

enum PumpEvent {
    Stop,
    Read(Result<Option<Vec<u8>>, TransportError>),
}

pub struct TransportSession<P: SerialPort, D: GattDevice> {
    kind: TransportKind,
    state: Rc<Cell<TransportState>>,
    outbound: Option<Rc<OutboundSlot<P, D>>>,
    pump: Option<PumpHandle>,
}

impl<P, D> TransportSession<P, D>
where
    P: SerialPort + 'static,
    D: GattDevice + 'static,
{
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            state: Rc::new(Cell::new(TransportState::Disconnected)),
            outbound: None,
            pump: None,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn state(&self) -> TransportState {
        self.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state.get() == TransportState::Connected
    }

    /// Open a USB serial session.  Already connected is a no-op.
    pub async fn connect_usb<'a, S>(
        &mut self,
        platform: &mut S,
        config: &LinkConfig,
        dispatch: &Rc<Dispatcher>,
        executor: &LinkExecutor<'a>,
    ) -> Result<(), TransportError>
    where
        S: SerialPlatform<Port = P>,
    {
        debug_assert_eq!(self.kind, TransportKind::Usb);
        if !self.begin_connect().await {
            return Ok(());
        }
        let opened = channel::open_usb::<S, D>(platform, config).await;
        self.finish_connect(opened, config, dispatch, executor)
    }

    /// Open a Bluetooth UART session.  Already connected is a no-op.
    pub async fn connect_bluetooth<'a, B>(
        &mut self,
        platform: &mut B,
        config: &LinkConfig,
        dispatch: &Rc<Dispatcher>,
        executor: &LinkExecutor<'a>,
    ) -> Result<(), TransportError>
    where
        B: BluetoothPlatform<Device = D>,
    {
        debug_assert_eq!(self.kind, TransportKind::Bluetooth);
        if !self.begin_connect().await {
            return Ok(());
        }
        let opened = channel::open_bluetooth::<B, P>(platform, config).await;
        self.finish_connect(opened, config, dispatch, executor)
    }

    /// Returns `false` if a connection is already up.
    async fn begin_connect(&mut self) -> bool {
        if self.state.get().is_active() {
            debug!("{}: already {:?}", self.kind, self.state.get());
            return false;
        }
        // Join a pump that ended on its own before claiming the state cell.
        if self.pump.is_some() {
            self.disconnect().await;
        }
        self.state.set(TransportState::Connecting);
        true
    }

    fn finish_connect<'a>(
        &mut self,
        opened: Result<channel::OpenChannel<P, D>, TransportError>,
        config: &LinkConfig,
        dispatch: &Rc<Dispatcher>,
        executor: &LinkExecutor<'a>,
    ) -> Result<(), TransportError> {
        let (inbound, outbound) = match opened {
            Ok(halves) => halves,
            Err(e) => {
                warn!("{}: couldn't connect: {}", self.kind, e);
                self.state.set(TransportState::Disconnected);
                return Err(e);
            }
        };

        let stop = Rc::new(PumpSignal::new());
        let done = Rc::new(PumpSignal::new());
        let decoder = FrameDecoder::with_delimiter(config.delimiter);

        let outbound = Rc::new(OutboundSlot::new(outbound));
        self.outbound = Some(outbound.clone());
        self.state.set(TransportState::Connected);
        executor
            .spawn(read_pump(
                inbound,
                outbound,
                decoder,
                self.state.clone(),
                dispatch.clone(),
                stop.clone(),
                done.clone(),
            ))
            .detach();
        self.pump = Some(PumpHandle { stop, done });

        info!("{}: connected", self.kind);
        Ok(())
    }

    /// Stop the pump, release the channel and end up `Disconnected`.
    ///
    /// Safe to call in any state.  Teardown failures are logged by the pump.
    pub async fn disconnect(&mut self) -> TransportState {
        // The writer must be gone before the port can close.
        if let Some(outbound) = self.outbound.take() {
            outbound.close().await;
        }

        if let Some(pump) = self.pump.take() {
            if self.state.get() != TransportState::Disconnected {
                self.state.set(TransportState::Disconnecting);
            }
            pump.stop.signal(());
            pump.done.wait().await;
            info!("{}: disconnected", self.kind);
        }

        self.state.set(TransportState::Disconnected);
        TransportState::Disconnected
    }

    /// Write `data` to the channel if connected; otherwise do nothing.
    ///
    /// Returns whether the write went through.  Failures are logged and do
    /// not change the connection state.
    pub async fn send(&mut self, data: &[u8]) -> bool {
        if self.state.get() != TransportState::Connected {
            debug!("{}: not connected, dropping {} bytes", self.kind, data.len());
            return false;
        }
        let Some(outbound) = self.outbound.as_ref() else {
            return false;
        };
        match outbound.write(data).await {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                warn!("{}: {}", self.kind, e);
                false
            }
            None => {
                debug!("{}: writer closed, dropping {} bytes", self.kind, data.len());
                false
            }
        }
    }
}

// ── Read pump ────────────────────────────────────────────────

async fn read_pump<P: SerialPort, D: GattDevice>(
    mut inbound: InboundChannel<P, D>,
    outbound: Rc<OutboundSlot<P, D>>,
    mut decoder: FrameDecoder,
    state: Rc<Cell<TransportState>>,
    dispatch: Rc<Dispatcher>,
    stop: Rc<PumpSignal>,
    done: Rc<PumpSignal>,
) {
    let kind = inbound.kind();
    let message_framed = inbound.is_message_framed();

    loop {
        let event = future::or(
            async {
                stop.wait().await;
                PumpEvent::Stop
            },
            async { PumpEvent::Read(inbound.read().await) },
        )
        .await;

        match event {
            PumpEvent::Stop => {
                debug!("{}: read loop cancelled", kind);
                break;
            }
            PumpEvent::Read(Ok(Some(chunk))) => {
                dispatch.tap(&chunk);
                if message_framed {
                    match decoder.decode_message(&chunk) {
                        Ok(message) => dispatch.dispatch(&message),
                        Err(e) => warn!("{}: dropping {}", kind, e),
                    }
                } else {
                    for message in decoder.feed(&chunk) {
                        dispatch.dispatch(&message);
                    }
                }
            }
            PumpEvent::Read(Ok(None)) => {
                info!("{}: stream closed by device", kind);
                state.set(TransportState::Disconnecting);
                break;
            }
            PumpEvent::Read(Err(e)) => {
                warn!("{}: error reading input: {}", kind, e);
                state.set(TransportState::Disconnecting);
                break;
            }
        }
    }

    if !decoder.pending().is_empty() {
        debug!(
            "{}: discarding {} unterminated bytes",
            kind,
            decoder.pending().len()
        );
    }

    // Same order as `disconnect`: writer first, then reader and port.
    outbound.close().await;
    if let Err(e) = inbound.release().await {
        warn!("{}: error during teardown: {}", kind, e);
    }
    state.set(TransportState::Disconnected);
    done.signal(());
}
