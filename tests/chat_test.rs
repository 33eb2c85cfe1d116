use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::Notify;

use tapgun::agent::Agent;
use tapgun::agent::mock::{Reply, ScriptedAgent};
use tapgun::agent::remote::RemoteAgent;
use tapgun::auth::{CredentialExchange, TokenGrant};
use tapgun::chat::{ChatSession, Ignored, Role, SendOutcome};
use tapgun::consts::{AGENT_UNAVAILABLE, EMPTY_REPLY};
use tapgun::error::{Error, Result};
use tapgun::events::{Event, EventBus};
use tapgun::store::{MemoryTokenStore, TokenStore};

/// Hands out numbered client-credentials tokens and counts calls.
#[derive(Default)]
struct FakeExchange {
    calls: AtomicUsize,
    reject: bool,
}

#[async_trait]
impl CredentialExchange for FakeExchange {
    async fn authorization_code(&self, _code: &str, _v: Option<&str>) -> Result<TokenGrant> {
        Err(Error::Cancelled)
    }

    async fn client_credentials(&self) -> Result<TokenGrant> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(Error::UpstreamRejected {
                status: 401,
                body: String::new(),
            });
        }
        Ok(TokenGrant {
            access_token: format!("cc-{n}"),
            token_type: None,
            expires_in: None,
        })
    }
}

fn session_with(
    agent: Arc<dyn Agent>,
    store: Arc<dyn TokenStore>,
    exchange: Arc<dyn CredentialExchange>,
) -> (ChatSession, EventBus) {
    let events = EventBus::default();
    let session = ChatSession::new(agent, store, exchange, events.clone());
    (session, events)
}

fn scripted(replies: Vec<Reply>) -> (ChatSession, Arc<ScriptedAgent>) {
    let agent = Arc::new(ScriptedAgent::new(replies));
    let (session, _) = session_with(
        agent.clone(),
        Arc::new(MemoryTokenStore::with_token("stored")),
        Arc::new(FakeExchange::default()),
    );
    (session, agent)
}

fn text(s: &str) -> Reply {
    Reply::Text(s.to_string())
}

fn shape(session: &ChatSession) -> Vec<(Role, String)> {
    session
        .transcript()
        .into_iter()
        .map(|m| (m.role, m.content))
        .collect()
}

// ── Send cycle ────────────────────────────────────────────────────

#[tokio::test]
async fn each_send_appends_two_messages() {
    let (session, _) = scripted(vec![text("one"), Reply::Reject(500), text("three")]);

    for (i, prompt) in ["a", "b", "c"].into_iter().enumerate() {
        session.send(prompt).await;
        assert_eq!(session.len(), 2 * (i + 1));
    }

    assert_eq!(
        shape(&session),
        vec![
            (Role::User, "a".to_string()),
            (Role::Agent, "one".to_string()),
            (Role::User, "b".to_string()),
            (Role::Error, AGENT_UNAVAILABLE.to_string()),
            (Role::User, "c".to_string()),
            (Role::Agent, "three".to_string()),
        ]
    );
}

#[tokio::test]
async fn ids_increase_and_restart_after_clear() {
    let (session, _) = scripted(vec![text("one"), text("two")]);
    session.send("a").await;
    let ids: Vec<u64> = session.transcript().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2]);

    session.clear_chat();
    session.send("b").await;
    let ids: Vec<u64> = session.transcript().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn user_message_is_visible_before_the_reply() {
    let gate = Arc::new(Notify::new());
    let agent = Arc::new(ScriptedAgent::gated(vec![text("later")], gate.clone()));
    let (session, _) = session_with(
        agent.clone(),
        Arc::new(MemoryTokenStore::with_token("t")),
        Arc::new(FakeExchange::default()),
    );

    let pending = session.spawn_send("  hello  ");
    while agent.calls().is_empty() {
        tokio::task::yield_now().await;
    }

    assert!(session.is_in_flight());
    assert_eq!(shape(&session), vec![(Role::User, "hello".to_string())]);

    gate.notify_one();
    assert_eq!(pending.await.unwrap(), SendOutcome::Replied);
    assert!(!session.is_in_flight());
    assert_eq!(session.len(), 2);
}

#[tokio::test]
async fn send_while_in_flight_is_ignored() {
    let gate = Arc::new(Notify::new());
    let agent = Arc::new(ScriptedAgent::gated(vec![text("first")], gate.clone()));
    let (session, _) = session_with(
        agent.clone(),
        Arc::new(MemoryTokenStore::with_token("t")),
        Arc::new(FakeExchange::default()),
    );

    let pending = session.spawn_send("first");
    while agent.calls().is_empty() {
        tokio::task::yield_now().await;
    }

    assert_eq!(
        session.send("second").await,
        SendOutcome::Ignored(Ignored::Busy)
    );
    assert_eq!(session.len(), 1);

    gate.notify_one();
    pending.await.unwrap();
    assert_eq!(agent.calls().len(), 1);
    assert_eq!(session.len(), 2);
}

#[tokio::test]
async fn blank_input_changes_nothing() {
    let (session, agent) = scripted(vec![]);
    assert_eq!(session.send("").await, SendOutcome::Ignored(Ignored::Empty));
    assert_eq!(
        session.send(" \t\n").await,
        SendOutcome::Ignored(Ignored::Empty)
    );
    assert!(session.is_empty());
    assert!(agent.calls().is_empty());
}

#[tokio::test]
async fn clear_then_send_matches_a_fresh_session() {
    let (used, _) = scripted(vec![text("x"), text("reply")]);
    used.send("warm up").await;
    used.clear_chat();
    used.send("hi").await;

    let (fresh, _) = scripted(vec![text("reply")]);
    fresh.send("hi").await;

    let ids = |s: &ChatSession| s.transcript().iter().map(|m| m.id).collect::<Vec<_>>();
    assert_eq!(shape(&used), shape(&fresh));
    assert_eq!(ids(&used), ids(&fresh));
}

#[tokio::test]
async fn clear_keeps_the_token() {
    let store = Arc::new(MemoryTokenStore::with_token("keep-me"));
    let (session, _) = session_with(
        Arc::new(ScriptedAgent::new(vec![text("ok")])),
        store.clone(),
        Arc::new(FakeExchange::default()),
    );
    session.send("hi").await;
    session.clear_chat();
    assert!(session.is_empty());
    assert_eq!(store.get().unwrap().as_deref(), Some("keep-me"));
}

// ── Failures ──────────────────────────────────────────────────────

#[tokio::test]
async fn rejected_call_appends_one_error_and_leaves_history() {
    let (session, _) = scripted(vec![text("fine"), Reply::Reject(401)]);
    session.send("first").await;
    let before = session.transcript();

    assert_eq!(session.send("second").await, SendOutcome::Failed);

    let after = session.transcript();
    assert_eq!(after.len(), 4);
    assert_eq!(&after[..2], &before[..]);
    assert_eq!(after[3].role, Role::Error);
    assert_eq!(after[3].content, AGENT_UNAVAILABLE);
    assert!(!session.is_in_flight());
    assert!(session.last_error().unwrap().contains("401"));
}

#[tokio::test]
async fn malformed_reply_takes_failure_path() {
    let (session, _) = scripted(vec![Reply::Malformed]);
    assert_eq!(session.send("hi").await, SendOutcome::Failed);
    assert_eq!(session.transcript()[1].role, Role::Error);
}

#[tokio::test]
async fn missing_token_uses_client_credentials_once() {
    let store = Arc::new(MemoryTokenStore::new());
    let exchange = Arc::new(FakeExchange::default());
    let agent = Arc::new(ScriptedAgent::new(vec![text("a"), text("b")]));
    let (session, _) = session_with(agent.clone(), store.clone(), exchange.clone());

    session.send("one").await;
    session.send("two").await;

    assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.get().unwrap().as_deref(), Some("cc-0"));
    let tokens: Vec<String> = agent.calls().into_iter().map(|(_, t)| t).collect();
    assert_eq!(tokens, vec!["cc-0", "cc-0"]);
}

#[tokio::test]
async fn failed_token_exchange_is_an_error_message() {
    let agent = Arc::new(ScriptedAgent::new(vec![text("never")]));
    let (session, _) = session_with(
        agent.clone(),
        Arc::new(MemoryTokenStore::new()),
        Arc::new(FakeExchange {
            reject: true,
            ..FakeExchange::default()
        }),
    );

    assert_eq!(session.send("hi").await, SendOutcome::Failed);
    assert!(agent.calls().is_empty());
    assert_eq!(
        shape(&session),
        vec![
            (Role::User, "hi".to_string()),
            (Role::Error, AGENT_UNAVAILABLE.to_string()),
        ]
    );
}

// ── Events ────────────────────────────────────────────────────────

#[tokio::test]
async fn send_emits_messages_then_input_ready() {
    let (session, events) = session_with(
        Arc::new(ScriptedAgent::new(vec![text("hey")])),
        Arc::new(MemoryTokenStore::with_token("t")),
        Arc::new(FakeExchange::default()),
    );
    let mut rx = events.subscribe();

    session.send("hi").await;

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    assert!(matches!(&seen[0], Event::MessageAppended(m) if m.role == Role::User));
    assert!(matches!(&seen[1], Event::MessageAppended(m) if m.role == Role::Agent));
    assert!(matches!(seen[2], Event::InputReady));
}

#[tokio::test]
async fn failed_send_still_returns_input() {
    let (session, events) = session_with(
        Arc::new(ScriptedAgent::new(vec![Reply::Reject(503)])),
        Arc::new(MemoryTokenStore::with_token("t")),
        Arc::new(FakeExchange::default()),
    );
    let mut rx = events.subscribe();

    session.send("hi").await;

    let last = std::iter::from_fn(|| rx.try_recv().ok()).last();
    assert!(matches!(last, Some(Event::InputReady)));
}

// ── Remote agent over HTTP ────────────────────────────────────────

async fn spawn_agent(status: StatusCode, reply: Value) -> String {
    let handler = move |headers: HeaderMap, Json(body): Json<Value>| {
        let reply = reply.clone();
        async move {
            let authorized = headers.get("authorization").and_then(|v| v.to_str().ok())
                == Some("Bearer secret-token");
            let session = headers
                .get("x-amzn-bedrock-agentcore-runtime-session-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if !authorized || session != "session-test" || body != json!({ "prompt": "hello" }) {
                return (StatusCode::BAD_REQUEST, Json(json!({ "message": "bad request" })));
            }
            (status, Json(reply))
        }
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new().route("/invocations", post(handler));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/invocations")
}

fn remote(url: &str) -> RemoteAgent {
    RemoteAgent::new(reqwest::Client::new(), url, "session-test")
}

#[tokio::test]
async fn remote_agent_sends_token_session_and_prompt() {
    let url = spawn_agent(
        StatusCode::OK,
        json!({ "response": { "content": [{ "text": "hi" }] } }),
    )
    .await;
    let reply = remote(&url).invoke("hello", "secret-token").await.unwrap();
    assert_eq!(reply, "hi");
}

#[tokio::test]
async fn remote_agent_empty_text_is_placeholder() {
    let url = spawn_agent(
        StatusCode::OK,
        json!({ "response": { "content": [{ "text": "" }] } }),
    )
    .await;
    let reply = remote(&url).invoke("hello", "secret-token").await.unwrap();
    assert_eq!(reply, EMPTY_REPLY);
}

#[tokio::test]
async fn remote_agent_missing_content_is_malformed() {
    let url = spawn_agent(StatusCode::OK, json!({ "response": {} })).await;
    let err = remote(&url).invoke("hello", "secret-token").await.unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)));
}

#[tokio::test]
async fn remote_agent_401_is_rejected() {
    let url = spawn_agent(StatusCode::UNAUTHORIZED, json!({ "message": "expired" })).await;
    let err = remote(&url).invoke("hello", "secret-token").await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn session_over_http_shows_agent_text() {
    let url = spawn_agent(
        StatusCode::OK,
        json!({ "response": { "content": [{ "text": "hi" }] } }),
    )
    .await;
    let (session, _) = session_with(
        Arc::new(remote(&url)),
        Arc::new(MemoryTokenStore::with_token("secret-token")),
        Arc::new(FakeExchange::default()),
    );

    assert_eq!(session.send("hello").await, SendOutcome::Replied);
    assert_eq!(
        shape(&session),
        vec![
            (Role::User, "hello".to_string()),
            (Role::Agent, "hi".to_string()),
        ]
    );
}

#[tokio::test]
async fn session_over_http_401_shows_generic_error() {
    let url = spawn_agent(StatusCode::UNAUTHORIZED, json!({ "message": "expired" })).await;
    let (session, _) = session_with(
        Arc::new(remote(&url)),
        Arc::new(MemoryTokenStore::with_token("secret-token")),
        Arc::new(FakeExchange::default()),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(5), session.send("hello"))
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Failed);
    let last = session.transcript().pop().unwrap();
    assert_eq!(last.role, Role::Error);
    assert_eq!(last.content, AGENT_UNAVAILABLE);
    assert!(!last.content.contains("expired"));
    assert!(!session.is_in_flight());
}
