//! Client side of the token relay.
//!
//! Every secret-bearing exchange goes through the relay; this client only
//! ever sends the one-time code and PKCE verifier it already holds.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::{CredentialExchange, SdkTokenSource, TokenGrant};
use crate::consts::SDK_TOKEN_FAILED;
use crate::error::{Error, Result};
use crate::relay::{CODE_PATH, ErrorBody, HEALTH_PATH, Health, SDK_TOKEN_PATH, TOKEN_PATH};

#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct CodeRequest<'a> {
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

impl RelayClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<Health> {
        let resp = self.http.get(self.url(HEALTH_PATH)).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| Error::MalformedResponse(e.to_string()))
    }
}

/// Turn a relay response into a grant. `label` names the failure when the
/// relay did not send its own `{ error, message }` body.
async fn read_grant(resp: reqwest::Response, label: Option<&str>) -> Result<TokenGrant> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if status.is_success() {
        return TokenGrant::from_body(&body);
    }

    warn!(status = status.as_u16(), body = %body, "relay request failed");
    if let Ok(err) = serde_json::from_str::<ErrorBody>(&body) {
        return Err(Error::Relay {
            error: err.error,
            message: err.message,
        });
    }
    match label {
        Some(label) => Err(Error::Relay {
            error: label.to_string(),
            message: status.as_u16().to_string(),
        }),
        None => Err(Error::UpstreamRejected {
            status: status.as_u16(),
            body,
        }),
    }
}

#[async_trait]
impl SdkTokenSource for RelayClient {
    async fn sdk_token(&self) -> Result<TokenGrant> {
        let resp = self.http.get(self.url(SDK_TOKEN_PATH)).send().await?;
        read_grant(resp, Some(SDK_TOKEN_FAILED)).await
    }
}

#[async_trait]
impl CredentialExchange for RelayClient {
    async fn authorization_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenGrant> {
        debug!("exchanging authorization code through relay");
        let resp = self
            .http
            .post(self.url(CODE_PATH))
            .json(&CodeRequest {
                code,
                code_verifier,
            })
            .send()
            .await?;
        read_grant(resp, None).await
    }

    async fn client_credentials(&self) -> Result<TokenGrant> {
        debug!("requesting client credentials token through relay");
        let resp = self.http.post(self.url(TOKEN_PATH)).send().await?;
        read_grant(resp, None).await
    }
}
