pub mod exchange;
pub mod redirect;
pub mod relay;

pub use exchange::IdentityClient;
pub use relay::RelayClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::TokenStore;

/// What the identity token endpoint hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenGrant {
    /// Parse a token endpoint body. A missing or empty `access_token` is a
    /// malformed response, not a JSON error.
    pub fn from_body(body: &str) -> Result<Self> {
        let grant: TokenGrant =
            serde_json::from_str(body).map_err(|e| Error::MalformedResponse(e.to_string()))?;
        if grant.access_token.is_empty() {
            return Err(Error::MalformedResponse("empty access_token".to_string()));
        }
        Ok(grant)
    }
}

/// Something that can produce a bearer token.
///
/// Both flows are safe to call repeatedly; neither touches local state.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    /// Trade a one-time authorization code for a token.
    async fn authorization_code(&self, code: &str, code_verifier: Option<&str>)
    -> Result<TokenGrant>;

    /// Machine-to-machine token, no user interaction.
    async fn client_credentials(&self) -> Result<TokenGrant>;
}

/// Source of the short-lived SDK token the login widget is configured with.
#[async_trait]
pub trait SdkTokenSource: Send + Sync {
    async fn sdk_token(&self) -> Result<TokenGrant>;
}

/// Return the stored token, or fetch one with client credentials and store it.
pub async fn acquire_token(
    store: &dyn TokenStore,
    exchange: &dyn CredentialExchange,
) -> Result<String> {
    if let Some(token) = store.get()? {
        return Ok(token);
    }
    debug!("no stored token, using client credentials flow");
    let grant = exchange.client_credentials().await?;
    store.set(&grant.access_token)?;
    Ok(grant.access_token)
}

/// Forget the stored token.
pub fn logout(store: &dyn TokenStore) -> Result<()> {
    store.clear()
}
