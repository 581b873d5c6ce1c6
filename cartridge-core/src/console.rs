//! Debug console input.
//!
//! The console feeds single characters from outside the tick loop. They land
//! in a one-slot `Mailbox`; a character posted before the previous one was
//! drained replaces it.

use std::sync::{Arc, Mutex};

/// Single-slot, overwrite-on-full character mailbox.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    slot: Arc<Mutex<Option<char>>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a character, replacing any that has not been taken yet.
    pub fn post(&self, ch: char) {
        // A poisoned slot still holds a valid Option<char>.
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(ch);
    }

    /// Take the pending character, leaving the slot empty.
    pub fn take(&self) -> Option<char> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.take()
    }

    pub fn is_empty(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.is_none()
    }
}

/// Console commands understood by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    EnableEventLog,
    DisableEventLog,
}

impl ConsoleCommand {
    pub fn parse(ch: char) -> Option<Self> {
        match ch.to_ascii_uppercase() {
            'L' => Some(ConsoleCommand::EnableEventLog),
            'S' => Some(ConsoleCommand::DisableEventLog),
            _ => None,
        }
    }
}
