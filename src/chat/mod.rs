//! Chat transcript and the send/receive cycle against the agent.

mod session;

pub use session::{ChatSession, Ignored, SendOutcome};

use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Who a message is from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Error,
}

impl Role {
    /// Label shown in front of the message.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "YOU",
            Role::Agent => "AGENT",
            Role::Error => "ERROR",
        }
    }
}

/// One transcript entry. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = self.timestamp.with_timezone(&Local).format("%H:%M");
        write!(f, "[{time}] {:<5} {}", self.role.label(), self.content)
    }
}

/// Messages in conversation order. Append-only until cleared.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return a copy of it.
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> Message {
        self.next_id += 1;
        let message = Message {
            id: self.next_id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message; ids start over.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.next_id = 0;
    }
}
