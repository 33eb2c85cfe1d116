//! Error type shared by the library components.
//!
//! Every variant is caught at the boundary of the component that issued the
//! call and turned into user-visible state: an error message in the chat
//! transcript, an `Errored` auth state, or a JSON error body from the relay.

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required setting (secret, id, URL) is absent.
    #[error("missing required configuration: {0}")]
    ConfigMissing(&'static str),

    /// The identity provider, relay or agent answered with a non-2xx status.
    #[error("upstream rejected the request ({status})")]
    UpstreamRejected { status: u16, body: String },

    /// A 2xx response whose body did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The relay reported a failure with its `{ error, message }` body.
    #[error("{error}: {message}")]
    Relay { error: String, message: String },

    /// The affordance mount point could not be found.
    #[error("render target not found: {0}")]
    RenderTargetMissing(String),

    /// The affordance never reported readiness.
    #[error("login widget did not become ready within {0:?}")]
    AffordanceUnavailable(Duration),

    /// The user dismissed the login before it succeeded.
    #[error("authentication cancelled")]
    Cancelled,

    /// The `state` returned on the redirect does not match the nonce we sent.
    #[error("login state mismatch")]
    StateMismatch,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Status code of an upstream rejection, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UpstreamRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
