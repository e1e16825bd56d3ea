//! ubitlink library.
//!
//! The serial/Bluetooth link to a micro:bit and the small pieces of the
//! companion interface that sit next to it:
//!
//! - [`link`]: line framing, transport sessions, USB ⊕ Bluetooth
//!   coordination
//! - [`midi`]: channel-voice encoding and per-message filtering for the
//!   MIDI bridge
//! - [`controls`]: mapping device inputs onto the shader pointer
//!
//! Platform access (Web Serial, Web Bluetooth, native stacks) is injected
//! through the port traits in [`link::ports`].

#![deny(unused_must_use)]

pub mod config;
pub mod controls;
pub mod error;
pub mod link;
pub mod midi;

pub use config::{BaudRate, LinkConfig};
pub use error::{DecodeError, TransportError};
pub use link::{ConnectionCoordinator, FrameDecoder, TransportKind, TransportState};
