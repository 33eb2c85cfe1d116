//! Project-wide constants.

use std::path::PathBuf;
use std::time::Duration;

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");
pub const REPO: &str = env!("CARGO_PKG_REPOSITORY");

/// Key of the single persisted token slot.
pub const TOKEN_KEY: &str = "userToken";

/// Shown in the transcript whenever a send fails, whatever the cause.
pub const AGENT_UNAVAILABLE: &str =
    "Failed to connect to agent. Please ensure the agent is reachable.";

/// Agent reply used when the response carries an empty text block.
pub const EMPTY_REPLY: &str = "No response received";

/// Header carrying the per-process agent session id.
pub const SESSION_HEADER: &str = "X-Amzn-Bedrock-AgentCore-Runtime-Session-Id";

/// Header carrying the orchestration API key on SDK token requests.
pub const SDK_KEY_HEADER: &str = "X-SK-API-KEY";

/// Error label the relay puts on every `/api/sdktoken` failure.
pub const SDK_TOKEN_FAILED: &str = "Failed to get SDK token";

/// Mount point id the gate asks the affordance for.
pub const WIDGET_TARGET: &str = "davinci-widget-container";

/// How often the gate re-checks whether the affordance is ready.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the gate waits for the affordance before giving up.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_REGION: &str = "com";
pub const DEFAULT_SCOPE: &str = "chatagent";
pub const DEFAULT_RELAY_PORT: u16 = 3001;
pub const DEFAULT_RELAY_URL: &str = "http://localhost:3001";

/// Default database path: `~/.tapgun/tapgun.db`.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".tapgun")
        .join("tapgun.db")
}

/// A fresh agent session id. The agent runtime wants at least 33 characters.
pub fn new_session_id() -> String {
    format!("session-{}", uuid::Uuid::new_v4().simple())
}

/// Nonce used to tie a login round-trip together.
pub fn new_nonce() -> String {
    format!("auth-{}", chrono::Utc::now().timestamp_millis())
}
