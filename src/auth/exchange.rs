use async_trait::async_trait;
use tracing::{debug, warn};

use super::{CredentialExchange, TokenGrant};
use crate::config::RelaySettings;
use crate::error::{Error, Result};

/// Talks to the identity provider's token endpoint with the client secret.
///
/// Only the relay builds one of these; the secret must never be shipped to
/// the chat client.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    redirect_uri: Option<String>,
}

impl std::fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityClient")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("scope", &self.scope)
            .finish()
    }
}

impl IdentityClient {
    pub fn from_settings(http: reqwest::Client, settings: &RelaySettings) -> Result<Self> {
        Ok(Self {
            http,
            token_url: settings.token_url()?,
            client_id: settings.client_id()?.to_string(),
            client_secret: settings.client_secret()?.to_string(),
            scope: settings.scope.clone(),
            redirect_uri: settings.redirect_uri.clone().filter(|u| !u.is_empty()),
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    async fn post_form(&self, request: reqwest::RequestBuilder, grant: &str) -> Result<TokenGrant> {
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(grant, status = status.as_u16(), body = %body, "token exchange rejected");
            return Err(Error::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(grant, "token exchange succeeded");
        TokenGrant::from_body(&body)
    }
}

fn code_form<'a>(
    code: &'a str,
    redirect_uri: &'a str,
    code_verifier: Option<&'a str>,
) -> Vec<(&'static str, &'a str)> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];
    if let Some(verifier) = code_verifier {
        form.push(("code_verifier", verifier));
    }
    form
}

#[async_trait]
impl CredentialExchange for IdentityClient {
    async fn authorization_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenGrant> {
        let redirect_uri = self
            .redirect_uri
            .as_deref()
            .ok_or(Error::ConfigMissing("OAUTH_REDIRECT_URI"))?;

        let request = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&code_form(code, redirect_uri, code_verifier));

        self.post_form(request, "authorization_code").await
    }

    async fn client_credentials(&self) -> Result<TokenGrant> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let request = self.http.post(&self.token_url).form(&form);
        self.post_form(request, "client_credentials").await
    }
}
