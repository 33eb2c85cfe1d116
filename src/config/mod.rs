//! Runtime settings for the relay server and the chat client.
//!
//! Values come from the command line or the environment (see `main.rs`).
//! Everything secret lives in [`RelaySettings`]; [`ClientSettings`] only
//! carries identifiers that are safe to hand to the login widget.

use crate::consts::{DEFAULT_REGION, DEFAULT_RELAY_URL, DEFAULT_SCOPE};
use crate::error::{Error, Result};

/// Root of the identity provider's auth API for a region, e.g.
/// `https://auth.pingone.com/`.
pub fn auth_api_root(region: &str) -> String {
    format!("https://auth.pingone.{region}/")
}

/// Settings of the token relay. Holds the secrets.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub company_id: Option<String>,
    pub api_key: Option<String>,
    pub region: String,
    /// Overrides `https://orchestrate-api.pingone.{region}`.
    pub orchestrate_base: Option<String>,
    /// Overrides the region's auth API root.
    pub auth_base: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: String,
    pub redirect_uri: Option<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            company_id: None,
            api_key: None,
            region: DEFAULT_REGION.to_string(),
            orchestrate_base: None,
            auth_base: None,
            client_id: None,
            client_secret: None,
            scope: DEFAULT_SCOPE.to_string(),
            redirect_uri: None,
        }
    }
}

impl RelaySettings {
    /// URL of the SDK token endpoint, plus the API key to present to it.
    pub fn sdk_token_request(&self) -> Result<(String, &str)> {
        let company_id = required(&self.company_id, "DAVINCI_COMPANY_ID")?;
        let api_key = required(&self.api_key, "DAVINCI_API_KEY")?;
        let base = match &self.orchestrate_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://orchestrate-api.pingone.{}", self.region),
        };
        Ok((format!("{base}/v1/company/{company_id}/sdktoken"), api_key))
    }

    /// The identity provider's token endpoint.
    pub fn token_url(&self) -> Result<String> {
        let company_id = required(&self.company_id, "DAVINCI_COMPANY_ID")?;
        let root = match &self.auth_base {
            Some(base) => format!("{}/", base.trim_end_matches('/')),
            None => auth_api_root(&self.region),
        };
        Ok(format!("{root}{company_id}/as/token"))
    }

    pub fn client_id(&self) -> Result<&str> {
        required(&self.client_id, "OAUTH_CLIENT_ID")
    }

    pub fn client_secret(&self) -> Result<&str> {
        required(&self.client_secret, "OAUTH_CLIENT_SECRET")
    }

    pub fn redirect_uri(&self) -> Result<&str> {
        required(&self.redirect_uri, "OAUTH_REDIRECT_URI")
    }
}

/// Settings of the chat client. No secrets.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub relay_url: String,
    pub agent_url: Option<String>,
    pub session_id: String,
    pub company_id: Option<String>,
    pub policy_id: Option<String>,
    pub region: String,
    pub include_http_credentials: bool,
    pub nonce: String,
    /// Public client id, used to build the hosted login URL.
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            agent_url: None,
            session_id: crate::consts::new_session_id(),
            company_id: None,
            policy_id: None,
            region: DEFAULT_REGION.to_string(),
            include_http_credentials: false,
            nonce: crate::consts::new_nonce(),
            client_id: None,
            redirect_uri: None,
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

impl ClientSettings {
    pub fn api_root(&self) -> String {
        auth_api_root(&self.region)
    }

    pub fn agent_url(&self) -> Result<&str> {
        required(&self.agent_url, "TAPGUN_AGENT_URL")
    }

    pub fn company_id(&self) -> Result<&str> {
        required(&self.company_id, "DAVINCI_COMPANY_ID")
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(Error::ConfigMissing(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay() -> RelaySettings {
        RelaySettings {
            company_id: Some("company-1".to_string()),
            api_key: Some("sk-key".to_string()),
            ..RelaySettings::default()
        }
    }

    #[test]
    fn sdk_token_url_uses_region() {
        let settings = RelaySettings {
            region: "eu".to_string(),
            ..relay()
        };
        let (url, key) = settings.sdk_token_request().unwrap();
        assert_eq!(
            url,
            "https://orchestrate-api.pingone.eu/v1/company/company-1/sdktoken"
        );
        assert_eq!(key, "sk-key");
    }

    #[test]
    fn sdk_token_url_honors_override() {
        let settings = RelaySettings {
            orchestrate_base: Some("http://127.0.0.1:9000/".to_string()),
            ..relay()
        };
        let (url, _) = settings.sdk_token_request().unwrap();
        assert_eq!(url, "http://127.0.0.1:9000/v1/company/company-1/sdktoken");
    }

    #[test]
    fn sdk_token_requires_api_key() {
        let settings = RelaySettings {
            api_key: None,
            ..relay()
        };
        assert!(matches!(
            settings.sdk_token_request(),
            Err(Error::ConfigMissing("DAVINCI_API_KEY"))
        ));
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let settings = RelaySettings {
            company_id: Some(String::new()),
            ..relay()
        };
        assert!(matches!(
            settings.sdk_token_request(),
            Err(Error::ConfigMissing("DAVINCI_COMPANY_ID"))
        ));
    }

    #[test]
    fn token_url_defaults_to_region_root() {
        assert_eq!(
            relay().token_url().unwrap(),
            "https://auth.pingone.com/company-1/as/token"
        );
    }

    #[test]
    fn token_url_honors_override() {
        let settings = RelaySettings {
            auth_base: Some("http://127.0.0.1:9001".to_string()),
            ..relay()
        };
        assert_eq!(
            settings.token_url().unwrap(),
            "http://127.0.0.1:9001/company-1/as/token"
        );
    }

    #[test]
    fn client_defaults() {
        let settings = ClientSettings::default();
        assert_eq!(settings.relay_url, DEFAULT_RELAY_URL);
        assert_eq!(settings.api_root(), "https://auth.pingone.com/");
        assert!(settings.agent_url().is_err());
        assert!(!settings.include_http_credentials);
    }
}
