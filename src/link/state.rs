//! Connection state shared between a session and its read pump.

use core::fmt;

/// Which physical transport a session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Usb,
    Bluetooth,
}

impl TransportKind {
    pub const fn other(self) -> Self {
        match self {
            Self::Usb => Self::Bluetooth,
            Self::Bluetooth => Self::Usb,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usb => write!(f, "USB"),
            Self::Bluetooth => write!(f, "Bluetooth"),
        }
    }
}

/// Lifecycle of one transport.
///
/// ```text
/// Disconnected ──connect──▶ Connecting ──ok──▶ Connected
///      ▲                        │                  │
///      ├────────failure─────────┘            disconnect / EOF
///      │                                           ▼
///      └─────────────────────────────────── Disconnecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl TransportState {
    /// `Connecting` or `Connected`: the transport holds (or is claiming)
    /// the link.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}
