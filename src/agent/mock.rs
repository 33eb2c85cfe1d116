use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

use super::Agent;
use crate::error::{Error, Result};

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Respond as if the endpoint returned this status.
    Reject(u16),
    Malformed,
}

/// A scripted agent for tests. Returns pre-defined replies in order and
/// records every call it receives.
pub struct ScriptedAgent {
    replies: Vec<Reply>,
    index: AtomicUsize,
    calls: Mutex<Vec<(String, String)>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedAgent {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            index: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Every call waits for a `notify_one` on `gate` before replying.
    pub fn gated(replies: Vec<Reply>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(replies)
        }
    }

    /// `(prompt, token)` for each call so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn invoke(&self, prompt: &str, token: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), token.to_string()));

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let i = self.index.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.get(i).ok_or_else(|| {
            Error::MalformedResponse(format!("ScriptedAgent: no more replies (called {} times)", i + 1))
        })?;
        match reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Reject(status) => Err(Error::UpstreamRejected {
                status: *status,
                body: String::new(),
            }),
            Reply::Malformed => Err(Error::MalformedResponse("scripted".to_string())),
        }
    }
}
