//! The token relay: a small HTTP server that holds the secrets and hands the
//! chat client short-lived tokens.
//!
//! Routes:
//! - `GET  /api/sdktoken`    SDK token for the login widget
//! - `POST /api/token`       client credentials token for the agent
//! - `POST /api/token/code`  authorization code exchange
//! - `GET  /health`          liveness

pub mod error;

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::auth::{CredentialExchange, IdentityClient, TokenGrant};
use crate::config::RelaySettings;
use crate::consts::SDK_KEY_HEADER;
use crate::error::{Error, Result};
use error::RelayError;

pub const SDK_TOKEN_PATH: &str = "/api/sdktoken";
pub const TOKEN_PATH: &str = "/api/token";
pub const CODE_PATH: &str = "/api/token/code";
pub const HEALTH_PATH: &str = "/health";

/// Body of every relay failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct CodeRequest {
    code: String,
    #[serde(default)]
    code_verifier: Option<String>,
}

/// Shared by all handlers.
#[derive(Clone)]
pub struct RelayState {
    settings: Arc<RelaySettings>,
    http: reqwest::Client,
}

impl RelayState {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            settings: Arc::new(settings),
            http: reqwest::Client::new(),
        }
    }

    fn identity(&self) -> Result<IdentityClient> {
        IdentityClient::from_settings(self.http.clone(), &self.settings)
    }
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route(SDK_TOKEN_PATH, get(sdk_token))
        .route(TOKEN_PATH, post(client_token))
        .route(CODE_PATH, post(code_token))
        .route(HEALTH_PATH, get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the relay until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: RelayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("token relay running on http://{addr}");
        info!("SDK token endpoint: http://{addr}{SDK_TOKEN_PATH}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Fetch a widget SDK token from the orchestration API with the server-held key.
async fn fetch_sdk_token(state: &RelayState) -> Result<serde_json::Value> {
    let (url, api_key) = state.settings.sdk_token_request()?;
    debug!(%url, "requesting SDK token");

    let resp = state
        .http
        .get(&url)
        .header(SDK_KEY_HEADER, api_key)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::UpstreamRejected {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.json().await?)
}

async fn sdk_token(
    State(state): State<RelayState>,
) -> std::result::Result<Json<serde_json::Value>, RelayError> {
    fetch_sdk_token(&state)
        .await
        .map(Json)
        .map_err(RelayError::sdk_token)
}

async fn client_token(
    State(state): State<RelayState>,
) -> std::result::Result<Json<TokenGrant>, RelayError> {
    let identity = state.identity().map_err(RelayError::token)?;
    identity
        .client_credentials()
        .await
        .map(Json)
        .map_err(RelayError::token)
}

async fn code_token(
    State(state): State<RelayState>,
    Json(req): Json<CodeRequest>,
) -> std::result::Result<Json<TokenGrant>, RelayError> {
    let identity = state.identity().map_err(RelayError::token)?;
    identity
        .authorization_code(&req.code, req.code_verifier.as_deref())
        .await
        .map(Json)
        .map_err(RelayError::token)
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}
