//! Login affordance for a terminal session.
//!
//! Opens the identity provider's hosted login page in the browser, then waits
//! for the user to paste the redirect address (or the bare code) back into
//! the terminal. The code is exchanged through the relay.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use tracing::debug;

use super::affordance::{Affordance, AffordanceCallbacks, RenderTarget, WidgetConfig};
use crate::auth::CredentialExchange;
use crate::auth::redirect::{build_authorize_url, parse_pasted};
use crate::config::ClientSettings;
use crate::error::Result;

pub struct TerminalAffordance {
    settings: ClientSettings,
    exchange: Arc<dyn CredentialExchange>,
}

impl TerminalAffordance {
    pub fn new(settings: ClientSettings, exchange: Arc<dyn CredentialExchange>) -> Self {
        Self { settings, exchange }
    }
}

impl Affordance for TerminalAffordance {
    fn is_ready(&self) -> bool {
        true
    }

    /// Needs an interactive terminal to read the pasted code from.
    fn find_target(&self, id: &str) -> Option<RenderTarget> {
        io::stdin().is_terminal().then(|| RenderTarget::new(id))
    }

    fn render(
        &self,
        target: &RenderTarget,
        config: WidgetConfig,
        callbacks: Arc<dyn AffordanceCallbacks>,
    ) -> Result<()> {
        let settings = ClientSettings {
            nonce: config.nonce.clone(),
            ..self.settings.clone()
        };
        let (url, verifier) = build_authorize_url(&settings)?;
        debug!(target = %target.id, "opening hosted login");

        // Headless or SSH sessions have no browser; the URL is printed anyway.
        let _ = open::that(&url);

        println!("\n[AUTHENTICATE]");
        println!("Open this URL to authenticate:\n");
        println!("  {url}\n");
        print!("Paste the address you were redirected to (empty to cancel): ");
        let _ = io::stdout().flush();

        let exchange = Arc::clone(&self.exchange);
        let nonce = config.nonce;
        tokio::spawn(async move {
            let line = tokio::task::spawn_blocking(|| {
                let mut line = String::new();
                io::stdin().read_line(&mut line).map(|_| line)
            })
            .await;

            let line = match line {
                Ok(Ok(line)) => line,
                Ok(Err(e)) => return callbacks.error(format!("failed to read input: {e}")),
                Err(e) => return callbacks.error(format!("failed to read input: {e}")),
            };

            let params = match parse_pasted(&line) {
                Ok(Some(params)) => params,
                Ok(None) => return callbacks.cancel(),
                Err(e) => return callbacks.error(e.to_string()),
            };
            if let Err(e) = params.check_state(&nonce) {
                return callbacks.error(e.to_string());
            }

            println!("\nExchanging code for token...");
            match exchange
                .authorization_code(&params.code, Some(&verifier))
                .await
            {
                Ok(grant) => callbacks.success(grant.access_token),
                Err(e) => callbacks.error(e.to_string()),
            }
        });

        Ok(())
    }
}
