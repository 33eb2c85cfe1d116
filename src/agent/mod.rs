pub mod mock;
pub mod remote;

use async_trait::async_trait;

use crate::error::Result;

/// The remote conversational agent. Could be the real endpoint or a test script.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Send one prompt with the given bearer token and return the reply text.
    async fn invoke(&self, prompt: &str, token: &str) -> Result<String>;
}
