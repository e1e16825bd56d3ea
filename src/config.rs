//! Link configuration parameters
//!
//! All tunable parameters for a micro:bit link, plus the fixed device
//! identifiers the platform filters on.

use core::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

// --- Fixed device identifiers ---

/// micro:bit USB vendor id (Arm DAPLink interface chip).
pub const USB_VENDOR_ID: u16 = 0x0d28;

/// Nordic UART service exposed by the micro:bit Bluetooth UART.
pub const UART_SERVICE_UUID: u128 = 0x6e400001_b5a3_f393_e0a9_e50e24dcca9e;
/// Characteristic the micro:bit transmits on (we subscribe to notifications).
pub const UART_TX_CHARACTERISTIC_UUID: u128 = 0x6e400002_b5a3_f393_e0a9_e50e24dcca9e;
/// Characteristic the micro:bit receives on (we write to it).
pub const UART_RX_CHARACTERISTIC_UUID: u128 = 0x6e400003_b5a3_f393_e0a9_e50e24dcca9e;

/// Advertised name prefix used to filter the Bluetooth chooser.
pub const BLUETOOTH_NAME_PREFIX: &str = "BBC micro:bit";

/// Largest value the micro:bit UART RX characteristic accepts per write.
pub const DEFAULT_BLUETOOTH_MAX_WRITE: usize = 20;

/// Line feed.
pub const DEFAULT_DELIMITER: u8 = 0x0A;

/// Format a 128-bit UUID in its canonical hyphenated form.
pub fn format_uuid(uuid: u128) -> String {
    let hex = format!("{uuid:032x}");
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

// ---------------------------------------------------------------------------
// Baud rate
// ---------------------------------------------------------------------------

/// USB serial line speed.  Ignored by the Bluetooth transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaudRate(u32);

impl BaudRate {
    pub const DEFAULT: Self = Self(115_200);
    pub const MIDI: Self = Self(31_250);
    pub const SLOW: Self = Self(9_600);

    /// The rates offered to the user, default first.
    pub const SELECTABLE: [Self; 3] = [Self::DEFAULT, Self::MIDI, Self::SLOW];

    /// Returns `None` for zero.
    pub const fn new(bits_per_sec: u32) -> Option<Self> {
        if bits_per_sec == 0 {
            None
        } else {
            Some(Self(bits_per_sec))
        }
    }

    /// Parse a user-supplied rate, falling back to [`BaudRate::DEFAULT`].
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<u32>().ok().and_then(Self::new) {
            Some(rate) => rate,
            None => {
                warn!("Invalid baud rate {:?}, defaulting to {}", text, Self::DEFAULT);
                Self::DEFAULT
            }
        }
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn is_selectable(self) -> bool {
        Self::SELECTABLE.contains(&self)
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What a connect request does while the other transport holds the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExclusivityPolicy {
    /// Refuse the request; the other transport stays connected.
    #[default]
    Refuse,
    /// Disconnect the other transport first, then connect.
    ForceDisconnect,
}

/// How Bluetooth notifications are turned into messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BluetoothFraming {
    /// Notifications are raw chunks, split on the delimiter like USB.
    #[default]
    Delimited,
    /// Every notification is one complete message.
    PerNotification,
}

// ---------------------------------------------------------------------------
// Link configuration
// ---------------------------------------------------------------------------

/// Core link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    // --- USB ---
    /// Line speed used when opening the USB port
    pub baud_rate: BaudRate,
    /// Vendor id the port chooser filters on
    pub usb_vendor_id: u16,

    // --- Bluetooth ---
    /// Name prefix the device chooser filters on
    pub bluetooth_name_prefix: String,
    /// Notification framing
    pub bluetooth_framing: BluetoothFraming,
    /// Outbound writes longer than this are split across several GATT writes
    pub bluetooth_max_write: usize,

    // --- Framing ---
    /// Byte separating messages in both directions
    pub delimiter: u8,

    // --- Coordination ---
    pub exclusivity: ExclusivityPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: BaudRate::DEFAULT,
            usb_vendor_id: USB_VENDOR_ID,
            bluetooth_name_prefix: BLUETOOTH_NAME_PREFIX.to_owned(),
            bluetooth_framing: BluetoothFraming::Delimited,
            bluetooth_max_write: DEFAULT_BLUETOOTH_MAX_WRITE,
            delimiter: DEFAULT_DELIMITER,
            exclusivity: ExclusivityPolicy::Refuse,
        }
    }
}

/// Errors from [`LinkConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl LinkConfig {
    /// Reject values the link cannot operate with.
    ///
    /// A whitespace delimiter other than line feed would be trimmed away from
    /// every message boundary and is refused, as is a zero baud rate (only
    /// reachable through deserialisation).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate.get() == 0 {
            return Err(ConfigError::ValidationFailed("baud_rate must be positive"));
        }
        if self.delimiter != DEFAULT_DELIMITER && self.delimiter.is_ascii_whitespace() {
            return Err(ConfigError::ValidationFailed(
                "delimiter must be line feed or a non-whitespace byte",
            ));
        }
        if self.bluetooth_max_write == 0 {
            return Err(ConfigError::ValidationFailed("bluetooth_max_write must be positive"));
        }
        if self.bluetooth_name_prefix.is_empty() {
            return Err(ConfigError::ValidationFailed("bluetooth_name_prefix is empty"));
        }
        Ok(())
    }

    /// Load from JSON, falling back to defaults for missing fields.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
