//! Unified error types for the link layer.
//!
//! Connect-time and write-time failures funnel into [`TransportError`];
//! per-token decode failures are [`DecodeError`].  Neither ever escapes the
//! coordinator as a panic: callers see `Result` values, booleans and log
//! lines.

use core::fmt;

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Every fallible transport operation funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No matching device was found, or the user dismissed the chooser.
    DeviceNotFound,
    /// The platform refused access to the device.
    PermissionDenied,
    /// The port or GATT server could not be opened (port busy, link lost).
    OpenFailure(String),
    /// The requested baud rate is zero or otherwise unusable.
    InvalidBaudRate(u32),
    /// The UART service or one of its characteristics is missing.
    ServiceUnavailable(String),
    /// A write to the active channel failed.
    WriteFailure(String),
    /// A read from the active channel failed.
    ReadFailure(String),
    /// Cancel, close or GATT disconnect failed during teardown.
    TeardownFailure(String),
    /// The other transport holds the link and the policy refuses to preempt it.
    Busy,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound => write!(f, "no micro:bit found"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::OpenFailure(msg) => write!(f, "open failed: {msg}"),
            Self::InvalidBaudRate(baud) => write!(f, "invalid baud rate {baud}"),
            Self::ServiceUnavailable(msg) => write!(f, "UART service unavailable: {msg}"),
            Self::WriteFailure(msg) => write!(f, "write failed: {msg}"),
            Self::ReadFailure(msg) => write!(f, "read failed: {msg}"),
            Self::TeardownFailure(msg) => write!(f, "teardown failed: {msg}"),
            Self::Busy => write!(f, "another transport is connected"),
        }
    }
}

impl std::error::Error for TransportError {}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The token is not valid UTF-8.  Carries the raw token bytes.
    InvalidUtf8 { token: Vec<u8>, valid_up_to: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUtf8 { token, valid_up_to } => write!(
                f,
                "malformed token {:02x?}: invalid UTF-8 after byte {}",
                token, valid_up_to
            ),
        }
    }
}

impl std::error::Error for DecodeError {}
