//! Hosted login URL, PKCE, and redirect-back handling.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::ClientSettings;
use crate::error::{Error, Result};

/// Query parameters that must not survive a completed exchange.
const ONE_TIME_PARAMS: &[&str] = &["code", "state"];

/// PKCE verifier and challenge pair.
struct Pkce {
    verifier: String,
    challenge: String,
}

/// Generate a PKCE code verifier and S256 challenge.
fn generate_pkce() -> Pkce {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    let verifier = URL_SAFE_NO_PAD.encode(bytes);
    let challenge = challenge_for(&verifier);

    Pkce {
        verifier,
        challenge,
    }
}

fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Check that `challenge` is the S256 challenge of `verifier`.
pub fn verify_pkce(verifier: &str, challenge: &str) -> bool {
    challenge_for(verifier) == challenge
}

/// Build the hosted login URL for the user to visit.
/// Returns (url, pkce_verifier); the caller keeps the verifier for the exchange.
pub fn build_authorize_url(settings: &ClientSettings) -> Result<(String, String)> {
    let client_id = settings
        .client_id
        .as_deref()
        .ok_or(Error::ConfigMissing("OAUTH_CLIENT_ID"))?;
    let redirect_uri = settings
        .redirect_uri
        .as_deref()
        .ok_or(Error::ConfigMissing("OAUTH_REDIRECT_URI"))?;
    let base = format!("{}{}/as/authorize", settings.api_root(), settings.company_id()?);

    let pkce = generate_pkce();
    let mut params = vec![
        ("client_id", client_id),
        ("response_type", "code"),
        ("redirect_uri", redirect_uri),
        ("scope", settings.scope.as_str()),
        ("state", settings.nonce.as_str()),
        ("code_challenge", pkce.challenge.as_str()),
        ("code_challenge_method", "S256"),
    ];
    if let Some(policy) = settings.policy_id.as_deref() {
        params.push(("acr_values", policy));
    }

    let url = Url::parse_with_params(&base, &params)?;
    Ok((url.into(), pkce.verifier))
}

/// What came back on the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectParams {
    pub code: String,
    pub state: Option<String>,
}

impl RedirectParams {
    /// Reject a round-trip whose `state` is present but not ours.
    pub fn check_state(&self, nonce: &str) -> Result<()> {
        match &self.state {
            Some(state) if state != nonce => Err(Error::StateMismatch),
            _ => Ok(()),
        }
    }
}

/// Extract the one-time code from a redirect-back URL, if it carries one.
pub fn authorization_code_from(url: &str) -> Result<Option<RedirectParams>> {
    let url = Url::parse(url)?;
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(code
        .filter(|c| !c.is_empty())
        .map(|code| RedirectParams { code, state }))
}

/// Interpret what the user pasted: a full redirect URL, or the bare code in
/// the form `code` or `code#state`.
pub fn parse_pasted(input: &str) -> Result<Option<RedirectParams>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    if input.contains("://") {
        return authorization_code_from(input);
    }
    let (code, state) = match input.split_once('#') {
        Some((code, state)) => (code, Some(state.to_string())),
        None => (input, None),
    };
    Ok(Some(RedirectParams {
        code: code.to_string(),
        state,
    }))
}

/// The address with the one-time parameters removed, so replaying it cannot
/// re-submit the code.
pub fn strip_code(url: &str) -> Result<String> {
    let mut url = Url::parse(url)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !ONE_TIME_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.set_fragment(None);
    Ok(url.into())
}
