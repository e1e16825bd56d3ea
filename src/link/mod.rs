//! Transport-agnostic micro:bit link.
//!
//! Line-framed text messaging over USB serial or the Bluetooth UART
//! service, with exactly one transport live at a time.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Link Stack                           │
//! │                                                             │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//! │  │  Ports   │──▶│ Session  │──▶│  Codec   │──▶│Dispatcher│  │
//! │  │ (traits) │   │  (pump)  │   │ (lines)  │   │ (1 slot) │  │
//! │  └──────────┘   └──────────┘   └──────────┘   └──────────┘  │
//! │       ▲              ▲                                      │
//! │       │              │                                      │
//! │  ┌──────────┐   ┌──────────────────────┐                    │
//! │  │ Channel  │◀──│ ConnectionCoordinator│◀── write_line      │
//! │  │ (write)  │   │ (USB ⊕ Bluetooth)    │                    │
//! │  └──────────┘   └──────────────────────┘                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one [`LinkExecutor`]; coordinator calls must be made
//! from a future driven by that executor (see [`drive`]) so read pumps make
//! progress while the caller awaits.

pub mod channel;
pub mod codec;
pub mod coordinator;
pub mod dispatch;
pub mod ports;
pub mod session;
pub mod state;

/// Depth of the executor's wake queue.  One read pump per transport plus
/// the driving future.
pub const LINK_TASK_QUEUE: usize = 8;

/// Single-threaded executor the read pumps are spawned on.
pub type LinkExecutor<'a> = edge_executor::LocalExecutor<'a, LINK_TASK_QUEUE>;

/// Block the current thread on `fut`, running spawned read pumps alongside
/// it until `fut` completes.
pub fn drive<F>(executor: &LinkExecutor<'static>, fut: F) -> F::Output
where
    F: core::future::Future + 'static,
{
    futures_lite::future::block_on(executor.run(fut))
}

pub use codec::{FrameDecoder, encode_line};
pub use coordinator::ConnectionCoordinator;
pub use state::{TransportKind, TransportState};
