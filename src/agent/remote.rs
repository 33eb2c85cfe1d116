use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Agent;
use crate::consts::{EMPTY_REPLY, SESSION_HEADER};
use crate::error::{Error, Result};

/// An agent reached over HTTP.
pub struct RemoteAgent {
    http: reqwest::Client,
    url: String,
    session_id: String,
}

impl RemoteAgent {
    pub fn new(http: reqwest::Client, url: &str, session_id: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
            session_id: session_id.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The first content block's text. An empty or absent text is still a
    /// reply; an absent block is not.
    fn parse_reply(body: &str) -> Result<String> {
        let resp: AgentResponse = serde_json::from_str(body)
            .map_err(|e| Error::MalformedResponse(format!("agent response: {e}")))?;

        let block = resp
            .response
            .content
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedResponse("agent response has no content".to_string()))?;

        Ok(block
            .text
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string()))
    }
}

#[async_trait]
impl Agent for RemoteAgent {
    async fn invoke(&self, prompt: &str, token: &str) -> Result<String> {
        debug!(url = %self.url, "calling agent");
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .header(SESSION_HEADER, &self.session_id)
            .json(&AgentRequest { prompt })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %body, "agent rejected request");
            return Err(Error::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        Self::parse_reply(&body)
    }
}

/// A short name for the agent behind `url`: the runtime name when the URL
/// addresses an agent runtime, else the first label of the host.
pub fn agent_display_name(url: &str) -> String {
    if let Some((_, rest)) = url.split_once("runtime%2F") {
        let name = rest.split('/').next().unwrap_or_default();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.split('.').next().unwrap_or(h).to_string()))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "agent".to_string())
}

// --- API types ---

#[derive(Serialize)]
struct AgentRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct AgentResponse {
    response: ResponseBody,
}

#[derive(Deserialize)]
struct ResponseBody {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}
