//! Decoupled event bus between the gate, the chat session and the REPL.
//!
//! Components emit events via [`EventBus::emit`] and subscribe via
//! [`EventBus::subscribe`]. Built on [`tokio::sync::broadcast`] so
//! multiple listeners can react independently.

use tokio::sync::broadcast;

use crate::chat::Message;
use crate::gate::AuthState;

/// Events that flow through the system.
#[derive(Debug, Clone)]
pub enum Event {
    /// The auth gate moved to a new state.
    AuthChanged(AuthState),
    /// A message was appended to the transcript.
    MessageAppended(Message),
    /// The transcript was emptied.
    TranscriptCleared,
    /// A send finished (whatever the outcome); the prompt can take input again.
    InputReady,
}

/// A broadcast channel that any component can emit to or subscribe from.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers.
    /// Returns the number of receivers that will see it.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events. Returns a receiver that yields all
    /// future events (does not replay past ones).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
