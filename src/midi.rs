//! MIDI bridge: channel-voice message encoding and a per-message filter.
//!
//! Messages are three bytes, `[status | channel, data1, data2]`:
//!
//! | Status nibble | Kind           | data1      | data2    |
//! |---------------|----------------|------------|----------|
//! | `0x8`         | Note-off       | pitch      | velocity |
//! | `0x9`         | Note-on        | pitch      | velocity |
//! | `0xB`         | Control change | controller | value    |
//!
//! The filter keys on `(status_byte << 8) | data1`, so "note 60 on channel
//! 0" and "note 60 on channel 1" are independent entries.

use core::fmt;

use heapless::FnvIndexMap;
use log::{debug, warn};

/// Maximum number of distinct signatures the filter remembers.
pub const FILTER_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MidiKind {
    NoteOff = 0x8,
    NoteOn = 0x9,
    ControlChange = 0xB,
}

impl MidiKind {
    pub fn from_status(status: u8) -> Option<Self> {
        match status >> 4 {
            0x8 => Some(Self::NoteOff),
            0x9 => Some(Self::NoteOn),
            0xB => Some(Self::ControlChange),
            _ => None,
        }
    }
}

/// One encoded channel-voice message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiMessage([u8; 3]);

impl MidiMessage {
    fn encode(kind: MidiKind, channel: u8, data1: u8, data2: u8) -> Self {
        Self([((kind as u8) << 4) | (channel & 0x0F), data1 & 0x7F, data2 & 0x7F])
    }

    pub fn note_on(pitch: u8, velocity: u8, channel: u8) -> Self {
        Self::encode(MidiKind::NoteOn, channel, pitch, velocity)
    }

    pub fn note_off(pitch: u8, velocity: u8, channel: u8) -> Self {
        Self::encode(MidiKind::NoteOff, channel, pitch, velocity)
    }

    pub fn control_change(controller: u8, value: u8, channel: u8) -> Self {
        Self::encode(MidiKind::ControlChange, channel, controller, value)
    }

    /// Parse raw bytes; only the three supported kinds are accepted.
    pub fn from_bytes(bytes: [u8; 3]) -> Option<Self> {
        MidiKind::from_status(bytes[0]).map(|_| Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    pub fn kind(&self) -> MidiKind {
        match self.0[0] >> 4 {
            0x8 => MidiKind::NoteOff,
            0x9 => MidiKind::NoteOn,
            _ => MidiKind::ControlChange,
        }
    }

    pub fn channel(&self) -> u8 {
        self.0[0] & 0x0F
    }

    /// Pitch for notes, controller number for control changes.
    pub fn selector(&self) -> u8 {
        self.0[1]
    }

    /// Filter key: `(status_byte << 8) | data1`.
    pub fn signature(&self) -> u16 {
        (u16::from(self.0[0]) << 8) | u16::from(self.0[1])
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            MidiKind::NoteOn => write!(f, "Note-On Chan: {} Pitch: {}", self.channel(), self.selector()),
            MidiKind::NoteOff => write!(f, "Note-Off Chan: {} Pitch: {}", self.channel(), self.selector()),
            MidiKind::ControlChange => write!(
                f,
                "Control-Change Chan: {} Controller: {}",
                self.channel(),
                self.selector()
            ),
        }
    }
}

// ── Filter ───────────────────────────────────────────────────

/// Remembers every message signature seen and whether it may be sent.
///
/// New signatures are allowed by default.  Once the table is full, unseen
/// signatures are still allowed but no longer recorded.
pub struct MessageFilter {
    entries: FnvIndexMap<u16, bool, FILTER_CAPACITY>,
}

impl MessageFilter {
    pub fn new() -> Self {
        Self {
            entries: FnvIndexMap::new(),
        }
    }

    /// Record `msg` if unseen.  Returns `true` if it was new.
    pub fn observe(&mut self, msg: &MidiMessage) -> bool {
        let key = msg.signature();
        if self.entries.contains_key(&key) {
            return false;
        }
        if self.entries.insert(key, true).is_err() {
            warn!("MIDI filter full, not recording {}", msg);
            return false;
        }
        debug!("MIDI filter: new entry {}", msg);
        true
    }

    pub fn is_allowed(&self, msg: &MidiMessage) -> bool {
        self.entries.get(&msg.signature()).copied().unwrap_or(true)
    }

    /// Allow or block a recorded signature.  Returns `false` if unknown.
    pub fn set_allowed(&mut self, signature: u16, allowed: bool) -> bool {
        match self.entries.get_mut(&signature) {
            Some(entry) => {
                *entry = allowed;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn signatures(&self) -> impl Iterator<Item = (u16, bool)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self::new()
    }
}

// ── Bridge ───────────────────────────────────────────────────

/// Errors from [`MidiOutput::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiError {
    PortClosed,
    SendFailed(String),
}

impl fmt::Display for MidiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PortClosed => write!(f, "MIDI port closed"),
            Self::SendFailed(msg) => write!(f, "MIDI send failed: {}", msg),
        }
    }
}

impl std::error::Error for MidiError {}

/// An output port provided by the platform's MIDI access.
pub trait MidiOutput {
    fn is_open(&self) -> bool;
    fn send(&mut self, bytes: &[u8; 3]) -> Result<(), MidiError>;
}

/// Fans allowed messages out to every open output.
pub struct MidiBridge<O: MidiOutput> {
    outputs: Vec<O>,
    filter: MessageFilter,
}

impl<O: MidiOutput> MidiBridge<O> {
    pub fn new(outputs: Vec<O>) -> Self {
        Self {
            outputs,
            filter: MessageFilter::new(),
        }
    }

    pub fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut MessageFilter {
        &mut self.filter
    }

    pub fn outputs(&self) -> &[O] {
        &self.outputs
    }

    /// Record, filter and send `msg`.  Returns the number of ports it
    /// reached.
    pub fn send(&mut self, msg: MidiMessage) -> usize {
        self.filter.observe(&msg);
        if !self.filter.is_allowed(&msg) {
            debug!("MIDI: {} blocked by filter", msg);
            return 0;
        }
        let mut sent = 0;
        for port in self.outputs.iter_mut().filter(|p| p.is_open()) {
            match port.send(msg.as_bytes()) {
                Ok(()) => sent += 1,
                Err(e) => warn!("MIDI: {}", e),
            }
        }
        sent
    }

    pub fn send_note_on(&mut self, pitch: u8, velocity: u8, channel: u8) -> usize {
        self.send(MidiMessage::note_on(pitch, velocity, channel))
    }

    pub fn send_note_off(&mut self, pitch: u8, velocity: u8, channel: u8) -> usize {
        self.send(MidiMessage::note_off(pitch, velocity, channel))
    }

    pub fn send_control_change(&mut self, controller: u8, value: u8, channel: u8) -> usize {
        self.send(MidiMessage::control_change(controller, value, channel))
    }
}
