//! Delimiter line codec.
//!
//! Wire format:
//! ```text
//! ┌──────────────────────────┬───────┬──────────────────────────┬───────┐
//! │ UTF-8 message (N B)      │ delim │ UTF-8 message (M B)      │ delim │ ...
//! └──────────────────────────┴───────┴──────────────────────────┴───────┘
//! ```
//!
//! The decoder accumulates incoming bytes into a token buffer and yields
//! complete messages.  This handles partial reads gracefully: a single
//! chunk may hold part of a message, one message, or many concatenated.
//!
//! The token buffer is unbounded.  A peer that never sends the delimiter
//! grows it until the session ends.

use log::warn;

use crate::config::DEFAULT_DELIMITER;
use crate::error::DecodeError;

/// Streaming line decoder.
pub struct FrameDecoder {
    delimiter: u8,
    token: Vec<u8>,
    malformed: u32,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_delimiter(DEFAULT_DELIMITER)
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            token: Vec::new(),
            malformed: 0,
        }
    }

    /// Feed a chunk and collect every message it completes, in order.
    ///
    /// Malformed tokens are logged and dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.feed_tokens(chunk)
            .into_iter()
            .filter_map(|token| match token {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("Dropping {}", e);
                    None
                }
            })
            .collect()
    }

    /// Like [`feed`](Self::feed), but hands malformed tokens to the caller
    /// instead of logging them.
    pub fn feed_tokens(&mut self, chunk: &[u8]) -> Vec<Result<String, DecodeError>> {
        let mut out = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == self.delimiter) {
            self.token.extend_from_slice(&rest[..pos]);
            let token = core::mem::take(&mut self.token);
            out.push(self.decode(token));
            rest = &rest[pos + 1..];
        }

        self.token.extend_from_slice(rest);
        out
    }

    /// Decode `bytes` as one complete message, bypassing the delimiter scan.
    ///
    /// Used when the transport already frames messages (one Bluetooth
    /// notification per message).  Pending bytes are left untouched.
    pub fn decode_message(&mut self, bytes: &[u8]) -> Result<String, DecodeError> {
        self.decode(bytes.to_vec())
    }

    fn decode(&mut self, token: Vec<u8>) -> Result<String, DecodeError> {
        match String::from_utf8(token) {
            Ok(text) => {
                let trimmed = text.trim_matches(is_trimmed);
                if trimmed.len() == text.len() {
                    Ok(text)
                } else {
                    Ok(trimmed.to_owned())
                }
            }
            Err(e) => {
                self.malformed = self.malformed.saturating_add(1);
                let valid_up_to = e.utf8_error().valid_up_to();
                Err(DecodeError::InvalidUtf8 {
                    token: e.into_bytes(),
                    valid_up_to,
                })
            }
        }
    }

    /// Bytes received since the last delimiter.
    pub fn pending(&self) -> &[u8] {
        &self.token
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Number of tokens dropped as malformed since creation.
    pub fn malformed_count(&self) -> u32 {
        self.malformed
    }

    /// Discard any partially received message.
    pub fn reset(&mut self) {
        self.token.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Characters stripped from both ends of a message: Unicode whitespace
/// plus the byte-order mark.
fn is_trimmed(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Encode one outbound message: the UTF-8 text followed by the delimiter.
pub fn encode_line(text: &str, delimiter: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 1);
    out.extend_from_slice(text.as_bytes());
    out.push(delimiter);
    out
}
