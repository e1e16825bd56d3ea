//! Single-slot observers for decoded messages and raw inbound chunks.
//!
//! The coordinator owns the slots; every read pump holds a clone of the
//! same `Rc<Dispatcher>` so a handler swap takes effect on the next
//! message of whichever session is live.

use core::cell::RefCell;

use log::info;

/// Callback invoked once per decoded message.
pub type MessageHandler = Box<dyn FnMut(&str)>;

/// Callback invoked with every raw inbound chunk, before decoding.
pub type ChunkTap = Box<dyn FnMut(&[u8])>;

#[derive(Default)]
pub struct Dispatcher {
    handler: RefCell<Option<MessageHandler>>,
    tap: RefCell<Option<ChunkTap>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler`, replacing any previous one.
    pub fn set_handler(&self, handler: MessageHandler) {
        *self.handler.borrow_mut() = Some(handler);
    }

    pub fn clear_handler(&self) {
        *self.handler.borrow_mut() = None;
    }

    pub fn set_tap(&self, tap: Option<ChunkTap>) {
        *self.tap.borrow_mut() = tap;
    }

    pub fn tap(&self, chunk: &[u8]) {
        if let Some(tap) = self.tap.borrow_mut().as_mut() {
            tap(chunk);
        }
    }

    /// Hand one message to the handler, or log it when none is installed.
    pub fn dispatch(&self, message: &str) {
        match self.handler.borrow_mut().as_mut() {
            Some(handler) => handler(message),
            None => info!("{}", message),
        }
    }
}
