//! The login affordance: a widget owned by the identity provider that runs
//! its own multi-step verification and reports back through callbacks.

use std::sync::Arc;

use serde::Serialize;

use crate::config::ClientSettings;
use crate::error::Result;

/// Where the affordance renders itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub id: String,
}

impl RenderTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Configuration handed to the affordance on render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub method: String,
    pub api_root: String,
    pub access_token: String,
    pub company_id: Option<String>,
    pub policy_id: Option<String>,
    pub include_http_credentials: bool,
    pub nonce: String,
    pub use_modal: bool,
}

impl WidgetConfig {
    /// Configuration for running the login flow with the given SDK token.
    pub fn run_flow(settings: &ClientSettings, sdk_token: String) -> Self {
        Self {
            method: "runFlow".to_string(),
            api_root: settings.api_root(),
            access_token: sdk_token,
            company_id: settings.company_id.clone(),
            policy_id: settings.policy_id.clone(),
            include_http_credentials: settings.include_http_credentials,
            nonce: settings.nonce.clone(),
            use_modal: true,
        }
    }
}

/// What the affordance calls when it is done. Exactly one of these fires per
/// render.
pub trait AffordanceCallbacks: Send + Sync {
    fn success(&self, token: String);
    fn error(&self, reason: String);
    /// The user closed the affordance.
    fn cancel(&self);
}

pub trait Affordance: Send + Sync {
    /// Whether the affordance has finished loading and can render.
    fn is_ready(&self) -> bool;

    /// Locate the mount point with the given id.
    fn find_target(&self, id: &str) -> Option<RenderTarget>;

    /// Show the affordance. Returns once it is up; the outcome arrives later
    /// through `callbacks`.
    fn render(
        &self,
        target: &RenderTarget,
        config: WidgetConfig,
        callbacks: Arc<dyn AffordanceCallbacks>,
    ) -> Result<()>;
}
