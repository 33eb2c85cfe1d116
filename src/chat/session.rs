use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{Message, Role, Transcript};
use crate::agent::Agent;
use crate::auth::{CredentialExchange, acquire_token};
use crate::consts::AGENT_UNAVAILABLE;
use crate::error::Result;
use crate::events::{Event, EventBus};
use crate::store::TokenStore;

/// Why a send did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// Nothing left after trimming.
    Empty,
    /// Another send is still waiting on the agent.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The agent replied; an agent message was appended.
    Replied,
    /// Something failed; an error message was appended.
    Failed,
    Ignored(Ignored),
}

#[derive(Default)]
struct SessionState {
    transcript: Transcript,
    in_flight: bool,
    last_error: Option<String>,
}

/// A chat with the agent. Cheap to clone; clones share the transcript.
#[derive(Clone)]
pub struct ChatSession {
    state: Arc<Mutex<SessionState>>,
    agent: Arc<dyn Agent>,
    store: Arc<dyn TokenStore>,
    exchange: Arc<dyn CredentialExchange>,
    events: EventBus,
}

/// Clears the in-flight flag and hands input back, however the send ended.
struct InFlight<'a> {
    session: &'a ChatSession,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.session.state.lock() {
            state.in_flight = false;
        }
        self.session.events.emit(Event::InputReady);
    }
}

impl ChatSession {
    pub fn new(
        agent: Arc<dyn Agent>,
        store: Arc<dyn TokenStore>,
        exchange: Arc<dyn CredentialExchange>,
        events: EventBus,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            agent,
            store,
            exchange,
            events,
        }
    }

    /// Send `text` to the agent.
    ///
    /// Appends the user message before any network call, then exactly one
    /// agent or error message. Blank input, or a call while another send is
    /// pending, changes nothing.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let prompt = text.trim();
        if prompt.is_empty() {
            return SendOutcome::Ignored(Ignored::Empty);
        }

        {
            let mut state = self.state.lock().unwrap();
            if state.in_flight {
                return SendOutcome::Ignored(Ignored::Busy);
            }
            state.in_flight = true;
            state.last_error = None;
            let message = state.transcript.push(Role::User, prompt);
            self.events.emit(Event::MessageAppended(message));
        }
        let _in_flight = InFlight { session: self };

        match self.round_trip(prompt).await {
            Ok(reply) => {
                self.append(Role::Agent, reply, None);
                SendOutcome::Replied
            }
            Err(e) => {
                warn!(error = %e, "send failed");
                self.append(Role::Error, AGENT_UNAVAILABLE.to_string(), Some(e.to_string()));
                SendOutcome::Failed
            }
        }
    }

    /// Fire-and-forget variant of [`send`](Self::send).
    pub fn spawn_send(&self, text: &str) -> JoinHandle<SendOutcome> {
        let session = self.clone();
        let text = text.to_string();
        tokio::spawn(async move { session.send(&text).await })
    }

    async fn round_trip(&self, prompt: &str) -> Result<String> {
        let token = acquire_token(self.store.as_ref(), self.exchange.as_ref()).await?;
        self.agent.invoke(prompt, &token).await
    }

    fn append(&self, role: Role, content: String, error: Option<String>) {
        let mut state = self.state.lock().unwrap();
        if error.is_some() {
            state.last_error = error;
        }
        let message = state.transcript.push(role, content);
        self.events.emit(Event::MessageAppended(message));
    }

    /// Empty the transcript and forget the last error. The token is kept.
    pub fn clear_chat(&self) {
        let mut state = self.state.lock().unwrap();
        state.transcript.clear();
        state.last_error = None;
        info!("transcript cleared");
        self.events.emit(Event::TranscriptCleared);
    }

    /// Snapshot of the transcript.
    pub fn transcript(&self) -> Vec<Message> {
        self.state.lock().unwrap().transcript.messages().to_vec()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the agent is still working on a send.
    pub fn is_in_flight(&self) -> bool {
        self.state.lock().unwrap().in_flight
    }

    /// Reason of the last failed send, for diagnostics.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().last_error.clone()
    }
}
