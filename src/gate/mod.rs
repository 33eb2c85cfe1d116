//! Gate in front of the chat: nothing is shown until a token is stored.
//!
//! ```text
//! Welcome ──login──▶ Exchanging ──success──▶ Authenticated
//!                       │   ▲
//!              error/cancel  retry
//!                       ▼   │
//!                     Errored
//! ```
//!
//! `Authenticated` is terminal for the process. A token is always written to
//! the store before the gate reports `Authenticated`.

pub mod affordance;
pub mod terminal;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::redirect::{authorization_code_from, strip_code};
use crate::auth::{CredentialExchange, SdkTokenSource};
use crate::config::ClientSettings;
use crate::consts::{READY_POLL_INTERVAL, READY_TIMEOUT, WIDGET_TARGET};
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::store::TokenStore;
use affordance::{Affordance, AffordanceCallbacks, WidgetConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing attempted yet.
    Welcome,
    /// A login attempt is running.
    Exchanging,
    Authenticated,
    /// The last attempt failed; carries the reason shown to the user.
    Errored(String),
}

impl AuthState {
    /// Whether an attempt has come to an end.
    pub fn is_settled(&self) -> bool {
        matches!(self, AuthState::Authenticated | AuthState::Errored(_))
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Welcome => write!(f, "not authenticated"),
            AuthState::Exchanging => write!(f, "authenticating"),
            AuthState::Authenticated => write!(f, "authenticated ✓"),
            AuthState::Errored(reason) => write!(f, "error: {reason}"),
        }
    }
}

struct GateInner {
    state: watch::Sender<AuthState>,
    settings: ClientSettings,
    store: Arc<dyn TokenStore>,
    exchange: Arc<dyn CredentialExchange>,
    sdk: Arc<dyn SdkTokenSource>,
    affordance: Arc<dyn Affordance>,
    events: EventBus,
    ready_timeout: Duration,
}

/// Cheap to clone; clones drive the same state machine.
#[derive(Clone)]
pub struct AuthGate {
    inner: Arc<GateInner>,
}

impl AuthGate {
    pub fn new(
        settings: ClientSettings,
        store: Arc<dyn TokenStore>,
        exchange: Arc<dyn CredentialExchange>,
        sdk: Arc<dyn SdkTokenSource>,
        affordance: Arc<dyn Affordance>,
        events: EventBus,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Welcome);
        Self {
            inner: Arc::new(GateInner {
                state,
                settings,
                store,
                exchange,
                sdk,
                affordance,
                events,
                ready_timeout: READY_TIMEOUT,
            }),
        }
    }

    /// Give up on the affordance after `timeout` instead of the default.
    /// Only takes effect before the gate has been cloned.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.ready_timeout = timeout;
        }
        self
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        *self.inner.state.borrow() == AuthState::Authenticated
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Wait until the current attempt is over, returning where it ended.
    pub async fn wait_settled(&self) -> AuthState {
        let mut rx = self.subscribe();
        match rx.wait_for(AuthState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Apply `next` to the current state; `None` leaves it untouched.
    /// Returns whether the state changed.
    fn transition(&self, next: impl FnOnce(&AuthState) -> Option<AuthState>) -> bool {
        let mut entered = None;
        self.inner.state.send_if_modified(|state| match next(state) {
            Some(new) => {
                *state = new.clone();
                entered = Some(new);
                true
            }
            None => false,
        });

        match entered {
            Some(state) => {
                info!(state = %state, "auth state changed");
                self.inner.events.emit(Event::AuthChanged(state));
                true
            }
            None => false,
        }
    }

    fn fail(&self, reason: String) {
        warn!(%reason, "authentication failed");
        self.transition(|s| (*s == AuthState::Exchanging).then(|| AuthState::Errored(reason)));
    }

    /// Enter `Exchanging` from `Welcome` (and from `Errored` when `retrying`).
    fn begin(&self, retrying: bool) -> bool {
        self.transition(|s| match s {
            AuthState::Welcome => Some(AuthState::Exchanging),
            AuthState::Errored(_) if retrying => Some(AuthState::Exchanging),
            _ => None,
        })
    }

    /// Start a login attempt through the affordance.
    ///
    /// Returns `false` without doing anything if an attempt is already
    /// running or the gate is already open.
    pub async fn login(&self) -> bool {
        self.start(false).await
    }

    /// Start over after a failure. Only valid from `Errored`.
    pub async fn retry(&self) -> bool {
        if !matches!(self.state(), AuthState::Errored(_)) {
            return false;
        }
        self.start(true).await
    }

    async fn start(&self, retrying: bool) -> bool {
        if !self.begin(retrying) {
            debug!(state = %self.state(), "login ignored");
            return false;
        }
        if let Err(e) = self.render_affordance().await {
            self.fail(e.to_string());
        }
        true
    }

    async fn render_affordance(&self) -> Result<()> {
        let inner = &self.inner;
        wait_ready(inner.affordance.as_ref(), inner.ready_timeout).await?;

        let grant = inner.sdk.sdk_token().await?;
        let target = inner
            .affordance
            .find_target(WIDGET_TARGET)
            .ok_or_else(|| Error::RenderTargetMissing(WIDGET_TARGET.to_string()))?;

        let config = WidgetConfig::run_flow(&inner.settings, grant.access_token);
        debug!(target = %target.id, "rendering login widget");
        inner
            .affordance
            .render(&target, config, Arc::new(self.clone()))
    }

    /// Finish an authorization-code redirect.
    ///
    /// Returns `Ok(None)` when the address carries no code (or an attempt is
    /// already running), and the address with the code removed once the
    /// exchange succeeded.
    pub async fn complete_redirect(
        &self,
        address: &str,
        code_verifier: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(params) = authorization_code_from(address)? else {
            return Ok(None);
        };
        if !self.begin(true) {
            return Ok(None);
        }

        info!("exchanging authorization code");
        let result: Result<String> = async {
            let grant = self
                .inner
                .exchange
                .authorization_code(&params.code, code_verifier)
                .await?;
            self.inner.store.set(&grant.access_token)?;
            strip_code(address)
        }
        .await;

        match result {
            Ok(cleaned) => {
                self.transition(|s| {
                    (*s == AuthState::Exchanging).then_some(AuthState::Authenticated)
                });
                Ok(Some(cleaned))
            }
            Err(e) => {
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Open the gate with a token left by an earlier run, if there is one.
    pub fn restore(&self) -> Result<bool> {
        if self.inner.store.get()?.is_none() {
            return Ok(false);
        }
        Ok(self.transition(|s| (*s == AuthState::Welcome).then_some(AuthState::Authenticated)))
    }
}

impl AffordanceCallbacks for AuthGate {
    fn success(&self, token: String) {
        if *self.inner.state.borrow() != AuthState::Exchanging {
            debug!("ignoring success outside of an attempt");
            return;
        }
        if let Err(e) = self.inner.store.set(&token) {
            self.fail(e.to_string());
            return;
        }
        self.transition(|s| (*s == AuthState::Exchanging).then_some(AuthState::Authenticated));
    }

    fn error(&self, reason: String) {
        let reason = if reason.is_empty() {
            "Authentication failed".to_string()
        } else {
            reason
        };
        self.fail(reason);
    }

    fn cancel(&self) {
        self.fail(Error::Cancelled.to_string());
    }
}

/// Poll `affordance` until it reports ready, or give up after `timeout`.
async fn wait_ready(affordance: &dyn Affordance, timeout: Duration) -> Result<()> {
    if affordance.is_ready() {
        return Ok(());
    }
    debug!("waiting for login widget to load");
    let mut ticker = tokio::time::interval(READY_POLL_INTERVAL);
    let poll = async {
        loop {
            ticker.tick().await;
            if affordance.is_ready() {
                return;
            }
        }
    };
    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| Error::AffordanceUnavailable(timeout))
}
