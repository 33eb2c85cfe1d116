use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tapgun::agent::remote::{RemoteAgent, agent_display_name};
use tapgun::auth::{self, RelayClient};
use tapgun::banner::{BannerInfo, print_banner, print_session_summary, print_welcome};
use tapgun::chat::{ChatSession, Ignored, Role, SendOutcome};
use tapgun::commands::{CommandRegistry, CommandResult, SessionInfo};
use tapgun::config::{ClientSettings, RelaySettings};
use tapgun::consts::{
    DEFAULT_REGION, DEFAULT_RELAY_PORT, DEFAULT_RELAY_URL, DEFAULT_SCOPE, default_db_path,
    new_nonce, new_session_id,
};
use tapgun::events::{Event, EventBus};
use tapgun::gate::terminal::TerminalAffordance;
use tapgun::gate::{AuthGate, AuthState};
use tapgun::relay::{self, RelayState};
use tapgun::spinner::Pending;
use tapgun::store::TokenStore;
use tapgun::store::sqlite::SqliteTokenStore;

#[derive(Parser)]
#[command(
    name = "tapgun",
    version,
    about = "Chat with a hosted agent from the terminal, behind an identity login."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    client: ClientArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Run the token relay that holds the API key and client secret
    Serve(RelayArgs),
    /// Open the chat (the default)
    Chat,
    /// Log in and store the token without opening the chat
    Login,
    /// Forget the stored token
    Logout,
    /// Check that the relay is up
    Health,
}

#[derive(Args)]
struct ClientArgs {
    /// Base URL of the token relay
    #[arg(long, env = "TAPGUN_RELAY_URL", default_value = DEFAULT_RELAY_URL)]
    relay_url: String,

    /// Agent invocation URL
    #[arg(long, env = "TAPGUN_AGENT_URL")]
    agent_url: Option<String>,

    /// Agent session id (generated per run when unset)
    #[arg(long, env = "TAPGUN_SESSION_ID")]
    session_id: Option<String>,

    #[arg(long, env = "DAVINCI_COMPANY_ID")]
    company_id: Option<String>,

    #[arg(long, env = "DAVINCI_POLICY_ID")]
    policy_id: Option<String>,

    #[arg(long, env = "DAVINCI_REGION", default_value = DEFAULT_REGION)]
    region: String,

    #[arg(long, env = "DAVINCI_INCLUDE_HTTP_CREDENTIALS")]
    include_http_credentials: bool,

    /// Nonce tying the login round-trip together
    #[arg(long, env = "DAVINCI_NONCE")]
    nonce: Option<String>,

    /// Public client id for the hosted login page
    #[arg(long, env = "OAUTH_CLIENT_ID")]
    client_id: Option<String>,

    #[arg(long, env = "OAUTH_REDIRECT_URI")]
    redirect_uri: Option<String>,

    #[arg(long, env = "OAUTH_SCOPE", default_value = DEFAULT_SCOPE)]
    scope: String,

    /// Address the login page redirected to; its code is exchanged on startup
    #[arg(long)]
    redirect_url: Option<String>,

    /// SQLite database holding the token (use :memory: to keep nothing)
    #[arg(short, long)]
    db: Option<PathBuf>,
}

impl ClientArgs {
    fn settings(&self) -> ClientSettings {
        ClientSettings {
            relay_url: self.relay_url.clone(),
            agent_url: self.agent_url.clone(),
            session_id: self.session_id.clone().unwrap_or_else(new_session_id),
            company_id: self.company_id.clone(),
            policy_id: self.policy_id.clone(),
            region: self.region.clone(),
            include_http_credentials: self.include_http_credentials,
            nonce: self.nonce.clone().unwrap_or_else(new_nonce),
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scope: self.scope.clone(),
        }
    }

    fn db_path(&self) -> PathBuf {
        self.db.clone().unwrap_or_else(default_db_path)
    }

    fn open_store(&self) -> anyhow::Result<Arc<dyn TokenStore>> {
        let path = self.db_path();
        let store = SqliteTokenStore::open_path(&path)
            .with_context(|| format!("failed to open token store at {}", path.display()))?;
        Ok(Arc::new(store))
    }
}

#[derive(Args)]
struct RelayArgs {
    #[arg(long, env = "PORT", default_value_t = DEFAULT_RELAY_PORT)]
    port: u16,

    /// Interface to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    bind: IpAddr,

    #[arg(long, env = "DAVINCI_COMPANY_ID")]
    company_id: Option<String>,

    #[arg(long, env = "DAVINCI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "DAVINCI_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Override the orchestration API base URL
    #[arg(long)]
    orchestrate_url: Option<String>,

    /// Override the identity provider's auth API base URL
    #[arg(long)]
    auth_url: Option<String>,

    #[arg(long, env = "OAUTH_CLIENT_ID")]
    client_id: Option<String>,

    #[arg(long, env = "OAUTH_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    #[arg(long, env = "OAUTH_SCOPE", default_value = DEFAULT_SCOPE)]
    scope: String,

    #[arg(long, env = "OAUTH_REDIRECT_URI")]
    redirect_uri: Option<String>,
}

impl RelayArgs {
    fn settings(&self) -> RelaySettings {
        RelaySettings {
            company_id: self.company_id.clone(),
            api_key: self.api_key.clone(),
            region: self.region.clone(),
            orchestrate_base: self.orchestrate_url.clone(),
            auth_base: self.auth_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scope: self.scope.clone(),
            redirect_uri: self.redirect_uri.clone(),
        }
    }
}

/// Everything the client side needs, wired once.
struct Client {
    settings: ClientSettings,
    http: reqwest::Client,
    relay: Arc<RelayClient>,
    store: Arc<dyn TokenStore>,
    events: EventBus,
    gate: AuthGate,
}

impl Client {
    fn new(args: &ClientArgs) -> anyhow::Result<Self> {
        let settings = args.settings();
        let http = reqwest::Client::new();
        let relay = Arc::new(RelayClient::new(http.clone(), &settings.relay_url));
        let store = args.open_store()?;
        let events = EventBus::default();
        let affordance = Arc::new(TerminalAffordance::new(settings.clone(), relay.clone()));
        let gate = AuthGate::new(
            settings.clone(),
            store.clone(),
            relay.clone(),
            relay.clone(),
            affordance,
            events.clone(),
        );
        Ok(Self {
            settings,
            http,
            relay,
            store,
            events,
            gate,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve(args)) => {
            init_tracing("tapgun=info");
            serve(args).await
        }
        Some(Command::Login) => {
            init_tracing("tapgun=warn");
            login(&cli.client).await
        }
        Some(Command::Logout) => {
            init_tracing("tapgun=warn");
            logout(&cli.client)
        }
        Some(Command::Health) => {
            init_tracing("tapgun=warn");
            health(&cli.client).await
        }
        Some(Command::Chat) | None => {
            init_tracing("tapgun=warn");
            chat(&cli.client).await
        }
    }
}

/// Logs go to stderr so the chat on stdout stays readable.
fn init_tracing(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn serve(args: RelayArgs) -> anyhow::Result<()> {
    let settings = args.settings();
    if settings.company_id.is_none() || settings.api_key.is_none() {
        warn!("DAVINCI_COMPANY_ID or DAVINCI_API_KEY is not set; /api/sdktoken will fail");
    }
    if settings.client_id.is_none() || settings.client_secret.is_none() {
        warn!("OAUTH_CLIENT_ID or OAUTH_CLIENT_SECRET is not set; /api/token will fail");
    }

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    relay::serve(listener, RelayState::new(settings), async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
    })
    .await?;
    Ok(())
}

async fn health(args: &ClientArgs) -> anyhow::Result<()> {
    let relay = RelayClient::new(reqwest::Client::new(), &args.relay_url);
    let health = relay
        .health()
        .await
        .with_context(|| format!("relay at {} is not reachable", args.relay_url))?;
    println!("{}: {}", health.status, health.message);
    Ok(())
}

fn logout(args: &ClientArgs) -> anyhow::Result<()> {
    let store = args.open_store()?;
    auth::logout(store.as_ref())?;
    println!("✓ Logged out.");
    Ok(())
}

async fn login(args: &ClientArgs) -> anyhow::Result<()> {
    let client = Client::new(args)?;
    if !authenticate(&client.gate, args.redirect_url.as_deref(), false).await? {
        anyhow::bail!("login aborted");
    }
    println!("✓ Logged in.");
    println!("  Token saved to {}", args.db_path().display());
    Ok(())
}

/// Drive the gate until it opens. Returns `false` if the user gave up.
///
/// With `reuse` set, a token left by an earlier run opens the gate directly.
async fn authenticate(gate: &AuthGate, redirect: Option<&str>, reuse: bool) -> anyhow::Result<bool> {
    match redirect {
        Some(address) => match gate.complete_redirect(address, None).await {
            Ok(Some(cleaned)) => info!(address = %cleaned, "redirect completed"),
            Ok(None) => warn!("redirect address carries no code"),
            Err(e) => warn!(error = %e, "redirect exchange failed"),
        },
        None if reuse => {
            gate.restore()?;
        }
        None => {}
    }

    while !gate.is_authenticated() {
        let started = match gate.state() {
            AuthState::Welcome => {
                print_welcome();
                if !confirm("Press Enter to login (q to quit): ")? {
                    return Ok(false);
                }
                gate.login().await
            }
            AuthState::Errored(reason) => {
                eprintln!("✗ {reason}");
                if !confirm("Press Enter to try again (q to quit): ")? {
                    return Ok(false);
                }
                gate.retry().await
            }
            AuthState::Exchanging | AuthState::Authenticated => true,
        };
        if !started {
            continue;
        }

        tokio::select! {
            _ = gate.wait_settled() => {}
            _ = tokio::signal::ctrl_c() => {
                println!();
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Ask on stdout, read a line. EOF or `q` means no.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        println!();
        return Ok(false);
    }
    let answer = line.trim();
    Ok(!(answer.eq_ignore_ascii_case("q") || answer.eq_ignore_ascii_case("quit")))
}

async fn chat(args: &ClientArgs) -> anyhow::Result<()> {
    let client = Client::new(args)?;
    let agent_url = client.settings.agent_url()?.to_string();

    if !authenticate(&client.gate, args.redirect_url.as_deref(), true).await? {
        print_session_summary(0);
        return Ok(());
    }

    let agent_name = agent_display_name(&agent_url);
    let agent = Arc::new(RemoteAgent::new(
        client.http.clone(),
        &agent_url,
        &client.settings.session_id,
    ));
    let session = ChatSession::new(
        agent,
        client.store.clone(),
        client.relay.clone(),
        client.events.clone(),
    );

    let db_path = args.db_path();
    let store_label = db_path.display().to_string();
    print_banner(&BannerInfo {
        agent: &agent_name,
        relay: &client.settings.relay_url,
        auth_status: &client.gate.state().to_string(),
        session_id: &client.settings.session_id,
        store: &store_label,
    });

    let mut events = client.events.subscribe();
    let registry = CommandRegistry::new();

    // Async stdin so Ctrl+C is caught at the prompt too
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print_replies(&mut events);
        print!("\nyou> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            result = lines.next_line() => {
                match result {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        println!();
                        break;
                    }
                    Err(e) => {
                        eprintln!("input error: {e}");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let auth_status = client.gate.state().to_string();
        let info = SessionInfo {
            agent: &agent_name,
            relay: &client.settings.relay_url,
            auth_status: &auth_status,
            session_id: &client.settings.session_id,
            chat: Some(&session),
            store: Some(client.store.as_ref()),
        };
        match registry.dispatch(input, &info).await {
            CommandResult::NotACommand => {}
            CommandResult::Handled => continue,
            CommandResult::LoggedOut => {
                println!("  run tapgun again to log in");
                break;
            }
            CommandResult::Quit => break,
        }

        let pending = Pending::start(&agent_name);
        let send = session.spawn_send(input);

        // Ctrl+C stops waiting; the reply still lands in the transcript
        tokio::select! {
            outcome = send => {
                pending.stop().await;
                match outcome {
                    Ok(SendOutcome::Ignored(Ignored::Busy)) => {
                        eprintln!("  still waiting on the previous message");
                    }
                    Ok(_) => {}
                    Err(e) => eprintln!("\nerror: {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                pending.stop().await;
                println!("\n\ninterrupted");
            }
        }
    }

    print_session_summary(session.len());
    Ok(())
}

/// Print agent and error messages that arrived since the last call.
fn print_replies(events: &mut broadcast::Receiver<Event>) {
    loop {
        match events.try_recv() {
            Ok(Event::MessageAppended(message)) if message.role != Role::User => {
                println!("\n{message}");
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
