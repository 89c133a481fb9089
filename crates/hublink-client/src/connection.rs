//! The hub connection wrapper.
//!
//! One [`HubConnection`] owns one logical channel to one hub endpoint
//! and exposes a uniform start/stop/on/off/invoke surface independent
//! of which hub it targets. Cheaply cloneable via an `Arc` inner.
//!
//! `start()` never returns an error: connection-establishment failures
//! are classified for the log line and fed to the retry policy, and
//! callers observe the outcome through [`state_changes`]
//! (a `watch` subscription) instead of polling.
//!
//! [`state_changes`]: HubConnection::state_changes

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::negotiate::{self, TransportKind};
use crate::protocol::{self, HubMessage};
use crate::reconnect::{ReconnectPolicy, StartRetry};
use crate::transport::TransportConfig;

const OUTBOUND_CHANNEL_SIZE: usize = 64;
const TRANSPORT_CHANNEL_SIZE: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

// ── Configuration ────────────────────────────────────────────────────

/// Configuration for a single hub connection.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Full hub endpoint, e.g. `https://app.example.com/hubs/chat`.
    pub url: Url,
    pub transport: TransportConfig,
    /// Automatic schedule for error-triggered closures.
    pub reconnect: ReconnectPolicy,
    /// Manual backoff for failed `start()` attempts.
    pub start_retry: StartRetry,
    /// Connect straight over WebSockets without the negotiate request.
    pub skip_negotiation: bool,
    /// Interval between client keepalive pings.
    pub keepalive: Duration,
}

impl HubConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            transport: TransportConfig::default(),
            reconnect: ReconnectPolicy::default(),
            start_retry: StartRetry::default(),
            skip_negotiation: false,
            keepalive: Duration::from_secs(15),
        }
    }
}

// ── Handler registry types ───────────────────────────────────────────

/// Callback invoked with the positional arguments of a server event.
pub type EventHandler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Token identifying one handler registration, for targeted removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

struct RegisteredHandler {
    id: u64,
    callback: EventHandler,
}

struct PendingInvocation {
    target: String,
    tx: oneshot::Sender<Result<Value, Error>>,
}

// ── HubConnection ────────────────────────────────────────────────────

/// A persistent connection to one hub endpoint.
#[derive(Clone)]
pub struct HubConnection {
    inner: Arc<Inner>,
}

struct Inner {
    config: HubConfig,
    http: reqwest::Client,
    state_tx: watch::Sender<ConnectionState>,
    handlers: Mutex<HashMap<String, Vec<RegisteredHandler>>>,
    pending: DashMap<String, PendingInvocation>,
    next_invocation: AtomicU64,
    next_handler: AtomicU64,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    session_cancel: Mutex<Option<CancellationToken>>,
}

impl HubConnection {
    /// Create a connection for `config`. Does not connect -- call
    /// [`start()`](Self::start).
    pub fn new(config: HubConfig) -> Result<Self, Error> {
        let http = config.transport.build_client(&http_form(&config.url))?;
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http,
                state_tx,
                handlers: Mutex::new(HashMap::new()),
                pending: DashMap::new(),
                next_invocation: AtomicU64::new(1),
                next_handler: AtomicU64::new(1),
                outbound: Mutex::new(None),
                session_cancel: Mutex::new(None),
            }),
        })
    }

    /// The configured hub endpoint.
    pub fn url(&self) -> &Url {
        &self.inner.config.url
    }

    // ── State queries ────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state(), ConnectionState::Connected)
    }

    /// Subscribe to connection state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Establish the channel. No-op when a session is already active.
    ///
    /// Never returns an error: a failed attempt is logged, the manual
    /// retry backoff takes over in the background, and the state watch
    /// reflects the outcome.
    pub async fn start(&self) {
        let cancel = {
            let mut slot = lock(&self.inner.session_cancel);
            if slot.is_some() {
                tracing::debug!(url = %self.inner.config.url, "start() ignored -- session already active");
                return;
            }
            let cancel = CancellationToken::new();
            *slot = Some(cancel.clone());
            cancel
        };

        self.inner.state_tx.send_replace(ConnectionState::Connecting);

        match connect_once(&self.inner).await {
            Ok(channel) => {
                // `stop()` may have landed while the connect was in
                // flight; the channel must not be adopted then.
                if cancel.is_cancelled() {
                    tracing::debug!(url = %self.inner.config.url, "stopped while connecting, discarding channel");
                    settle_stopped(&self.inner);
                    return;
                }
                adopt_channel(&self.inner, &channel);
                tracing::info!(url = %self.inner.config.url, "hub connected");
                let inner = Arc::clone(&self.inner);
                tokio::spawn(run_connection(inner, channel, cancel));
            }
            Err(e) => {
                log_start_failure(&e, 0);
                let inner = Arc::clone(&self.inner);
                tokio::spawn(start_retry_task(inner, cancel));
            }
        }
    }

    /// Gracefully tear the channel down. Idempotent; no reconnect is
    /// scheduled for a deliberate stop.
    pub fn stop(&self) {
        let Some(cancel) = lock(&self.inner.session_cancel).take() else {
            tracing::debug!(url = %self.inner.config.url, "stop() ignored -- not started");
            return;
        };
        cancel.cancel();
        // The session task finishes the transport teardown; reflect the
        // terminal state immediately for callers.
        *lock(&self.inner.outbound) = None;
        fail_pending(&self.inner);
        self.inner
            .state_tx
            .send_replace(ConnectionState::Disconnected);
        tracing::info!(url = %self.inner.config.url, "hub connection stopped");
    }

    // ── Event subscription ───────────────────────────────────────

    /// Register a callback for a named server event.
    ///
    /// Registrations add; they never replace. All handlers for a name
    /// fire on each delivery, in registration order, and they survive
    /// reconnection cycles.
    pub fn on(
        &self,
        event: &str,
        handler: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.inner.next_handler.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.handlers)
            .entry(event.to_owned())
            .or_default()
            .push(RegisteredHandler {
                id,
                callback: Arc::new(handler),
            });
        HandlerId(id)
    }

    /// Remove one handler by id, or every handler for `event` when the
    /// id is omitted. Removing never aborts in-flight invocations.
    pub fn off(&self, event: &str, id: Option<HandlerId>) {
        let mut handlers = lock(&self.inner.handlers);
        match id {
            Some(HandlerId(id)) => {
                if let Some(list) = handlers.get_mut(event) {
                    list.retain(|h| h.id != id);
                    if list.is_empty() {
                        handlers.remove(event);
                    }
                }
            }
            None => {
                handlers.remove(event);
            }
        }
    }

    // ── Invocations ──────────────────────────────────────────────

    /// Send a remote invocation and await the server's completion.
    ///
    /// Fails with [`Error::NotConnected`] when the channel is not
    /// currently connected. No retry and no client-side timeout are
    /// applied; a hung server call holds this future open.
    pub async fn invoke(&self, target: &str, arguments: Vec<Value>) -> Result<Value, Error> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let outbound = lock(&self.inner.outbound).clone();
        let Some(outbound) = outbound else {
            return Err(Error::NotConnected);
        };

        let id = self
            .inner
            .next_invocation
            .fetch_add(1, Ordering::Relaxed)
            .to_string();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(
            id.clone(),
            PendingInvocation {
                target: target.to_owned(),
                tx,
            },
        );

        let frame = protocol::encode_invocation(&id, target, &arguments);
        if outbound.send(frame).await.is_err() {
            self.inner.pending.remove(&id);
            return Err(Error::NotConnected);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::InvocationDropped {
                target: target.to_owned(),
            }),
        }
    }
}

// ── Transport channel plumbing ───────────────────────────────────────

enum TransportEvent {
    Payload(String),
    Closed { error: Option<String> },
}

/// An established, handshaken transport: frames out via `outbound_tx`,
/// payloads and closure in via `events_rx`.
struct Channel {
    outbound_tx: mpsc::Sender<String>,
    events_rx: mpsc::Receiver<TransportEvent>,
}

fn adopt_channel(inner: &Arc<Inner>, channel: &Channel) {
    *lock(&inner.outbound) = Some(channel.outbound_tx.clone());
    inner.state_tx.send_replace(ConnectionState::Connected);
}

/// Re-publish the stopped state unless a newer session has started
/// since the stop landed.
fn settle_stopped(inner: &Inner) {
    if lock(&inner.session_cancel).is_none() {
        inner.state_tx.send_replace(ConnectionState::Disconnected);
    }
}

fn end_session(inner: &Arc<Inner>) {
    *lock(&inner.outbound) = None;
    *lock(&inner.session_cancel) = None;
    fail_pending(inner);
    inner.state_tx.send_replace(ConnectionState::Disconnected);
}

fn fail_pending(inner: &Inner) {
    let ids: Vec<String> = inner.pending.iter().map(|e| e.key().clone()).collect();
    for id in ids {
        if let Some((_, PendingInvocation { target, tx })) = inner.pending.remove(&id) {
            let _ = tx.send(Err(Error::InvocationDropped { target }));
        }
    }
}

fn log_start_failure(error: &Error, attempt: u32) {
    use crate::error::StartFailureKind;
    match error.start_failure_kind() {
        StartFailureKind::RateLimited => {
            tracing::warn!(attempt, error = %error, "hub connection rate limited");
        }
        StartFailureKind::AuthFailed => {
            tracing::error!(attempt, error = %error, "hub authentication failed");
        }
        StartFailureKind::NetworkUnreachable => {
            tracing::warn!(attempt, error = %error, "hub unreachable");
        }
        StartFailureKind::Unknown => {
            tracing::warn!(attempt, error = %error, "hub connection failed");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── URL forms ────────────────────────────────────────────────────────

/// The HTTP(S) form of the hub URL, for negotiate and long polling.
fn http_form(url: &Url) -> Url {
    let mut out = url.clone();
    let scheme = match url.scheme() {
        "ws" => "http",
        "wss" => "https",
        other => other,
    };
    let _ = out.set_scheme(scheme);
    out
}

/// The WS(S) form of the hub URL, for the WebSocket upgrade.
fn ws_form(url: &Url) -> Url {
    let mut out = url.clone();
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => other,
    };
    let _ = out.set_scheme(scheme);
    out
}

// ── Connection establishment ─────────────────────────────────────────

/// Negotiate, select a transport, establish it, and run the protocol
/// handshake. One attempt; retries are the caller's business.
async fn connect_once(inner: &Arc<Inner>) -> Result<Channel, Error> {
    let config = &inner.config;

    if config.skip_negotiation {
        return connect_websocket(inner, ws_form(&config.url)).await;
    }

    let hub_http_url = http_form(&config.url);
    let negotiated = negotiate::negotiate(
        &inner.http,
        &hub_http_url,
        config.transport.negotiate_timeout,
    )
    .await?;
    let transport = negotiate::select_transport(&negotiated)?;
    let token = negotiated.token().ok_or_else(|| Error::Negotiate {
        message: "server sent no connection token".into(),
        status: 200,
    })?;

    let mut endpoint = hub_http_url;
    endpoint.query_pairs_mut().append_pair("id", token);

    tracing::debug!(%transport, "transport negotiated");

    match transport {
        TransportKind::WebSockets => connect_websocket(inner, ws_form(&endpoint)).await,
        TransportKind::ServerSentEvents | TransportKind::LongPolling => {
            connect_long_polling(inner, endpoint).await
        }
    }
}

/// Open a WebSocket, run the handshake, and spawn reader/writer tasks.
///
/// The session cookie is injected as a `Cookie` header on the upgrade
/// request; the upgrade bypasses reqwest's jar.
async fn connect_websocket(inner: &Arc<Inner>, ws_url: Url) -> Result<Channel, Error> {
    let uri: tungstenite::http::Uri = ws_url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocket(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(cookie) = inner.config.transport.cookie_header_for(&http_form(&ws_url)) {
        request = request.with_header("Cookie", cookie);
    }

    let (mut ws, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))?;

    // Protocol handshake before any records flow.
    ws.send(tungstenite::Message::Text(
        protocol::handshake_request().into(),
    ))
    .await
    .map_err(|e| Error::WebSocket(e.to_string()))?;

    let response = loop {
        match ws.next().await {
            Some(Ok(tungstenite::Message::Text(text))) => break text,
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(Error::WebSocket(e.to_string())),
            None => {
                return Err(Error::WebSocket(
                    "connection closed during handshake".into(),
                ));
            }
        }
    };
    let record = protocol::split_records(&response)
        .next()
        .ok_or_else(|| Error::Handshake("empty handshake response".into()))?;
    protocol::parse_handshake_response(record)?;

    let (mut write, mut read) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CHANNEL_SIZE);
    let (event_tx, events_rx) = mpsc::channel::<TransportEvent>(TRANSPORT_CHANNEL_SIZE);

    // Writer: frames from the session, then a close frame on teardown.
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if write
                .send(tungstenite::Message::Text(frame.into()))
                .await
                .is_err()
            {
                return;
            }
        }
        let _ = write.send(tungstenite::Message::Close(None)).await;
    });

    // Reader: raw frames become transport events for the session loop.
    tokio::spawn(async move {
        loop {
            match read.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    if event_tx
                        .send(TransportEvent::Payload(text.to_string()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Some(Ok(tungstenite::Message::Close(_))) => {
                    let _ = event_tx.send(TransportEvent::Closed { error: None }).await;
                    return;
                }
                Some(Ok(_)) => {
                    // Ping/pong and binary frames are not part of the
                    // hub protocol surface.
                }
                Some(Err(e)) => {
                    let _ = event_tx
                        .send(TransportEvent::Closed {
                            error: Some(e.to_string()),
                        })
                        .await;
                    return;
                }
                None => {
                    let _ = event_tx
                        .send(TransportEvent::Closed {
                            error: Some("stream ended without close frame".into()),
                        })
                        .await;
                    return;
                }
            }
        }
    });

    Ok(Channel {
        outbound_tx,
        events_rx,
    })
}

/// Establish the long-polling transport: handshake over POST/GET, then
/// a poll loop feeding the session and a sender task for outbound
/// frames.
async fn connect_long_polling(inner: &Arc<Inner>, poll_url: Url) -> Result<Channel, Error> {
    let http = inner.http.clone();

    post_frame(&http, &poll_url, protocol::handshake_request()).await?;

    // Poll until the handshake response arrives.
    let first_body = loop {
        let response = http.get(poll_url.clone()).send().await?;
        match response.status().as_u16() {
            200 => {
                let body = response.text().await?;
                if !body.is_empty() {
                    break body;
                }
            }
            204 => {
                return Err(Error::Handshake(
                    "server terminated the connection during handshake".into(),
                ));
            }
            code => {
                return Err(Error::Negotiate {
                    message: "poll request rejected".into(),
                    status: code,
                });
            }
        }
    };

    let mut records = protocol::split_records(&first_body);
    let handshake_record = records
        .next()
        .ok_or_else(|| Error::Handshake("empty handshake response".into()))?;
    protocol::parse_handshake_response(handshake_record)?;
    let leftover: String = records
        .map(|r| format!("{r}{sep}", sep = protocol::RECORD_SEPARATOR))
        .collect();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CHANNEL_SIZE);
    let (event_tx, events_rx) = mpsc::channel::<TransportEvent>(TRANSPORT_CHANNEL_SIZE);

    // Sender: each outbound frame is one POST; a DELETE signals the
    // graceful close once the session drops the sender.
    {
        let http = http.clone();
        let url = poll_url.clone();
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = post_frame(&http, &url, frame).await {
                    tracing::warn!(error = %e, "long-poll send failed");
                    return;
                }
            }
            let _ = http.delete(url).send().await;
        });
    }

    // Poller: repeated GETs held open by the server.
    tokio::spawn(async move {
        if !leftover.is_empty() {
            let _ = event_tx.send(TransportEvent::Payload(leftover)).await;
        }
        loop {
            let outcome = match http.get(poll_url.clone()).send().await {
                Ok(response) => match response.status().as_u16() {
                    200 => match response.text().await {
                        Ok(body) if body.is_empty() => continue,
                        Ok(body) => Some(TransportEvent::Payload(body)),
                        Err(e) => Some(TransportEvent::Closed {
                            error: Some(e.to_string()),
                        }),
                    },
                    204 => Some(TransportEvent::Closed { error: None }),
                    code => Some(TransportEvent::Closed {
                        error: Some(format!("poll request rejected with HTTP {code}")),
                    }),
                },
                Err(e) => Some(TransportEvent::Closed {
                    error: Some(e.to_string()),
                }),
            };

            if let Some(event) = outcome {
                let terminal = matches!(event, TransportEvent::Closed { .. });
                if event_tx.send(event).await.is_err() || terminal {
                    return;
                }
            }
        }
    });

    Ok(Channel {
        outbound_tx,
        events_rx,
    })
}

async fn post_frame(http: &reqwest::Client, url: &Url, frame: String) -> Result<(), Error> {
    let response = http.post(url.clone()).body(frame).send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Negotiate {
            message: "send request rejected".into(),
            status: status.as_u16(),
        })
    }
}

// ── Session loop and reconnection ────────────────────────────────────

enum SessionEnd {
    /// Deliberate `stop()`; no reconnect.
    Stopped,
    /// Server closed without an error; no reconnect.
    Clean,
    /// Error-triggered closure; the automatic schedule applies.
    Error(String),
}

/// Outer connection task: runs sessions and applies the automatic
/// reconnect schedule between them.
async fn run_connection(inner: Arc<Inner>, mut channel: Channel, cancel: CancellationToken) {
    loop {
        match run_session(&inner, &mut channel, &cancel).await {
            SessionEnd::Stopped => {
                // `stop()` already reset the public state, unless this
                // session adopted its channel after the cancel landed.
                // Withdraw only what this session published; a newer
                // session's channel stays untouched.
                let owned = {
                    let mut outbound = lock(&inner.outbound);
                    let owned = outbound
                        .as_ref()
                        .is_some_and(|tx| tx.same_channel(&channel.outbound_tx));
                    if owned {
                        *outbound = None;
                    }
                    owned
                };
                if owned {
                    fail_pending(&inner);
                }
                settle_stopped(&inner);
                return;
            }
            SessionEnd::Clean => {
                tracing::info!(url = %inner.config.url, "hub closed the connection gracefully");
                end_session(&inner);
                return;
            }
            SessionEnd::Error(reason) => {
                *lock(&inner.outbound) = None;
                fail_pending(&inner);
                tracing::warn!(url = %inner.config.url, error = %reason, "hub connection lost");

                match reconnect(&inner, &cancel).await {
                    Some(new_channel) => {
                        if cancel.is_cancelled() {
                            settle_stopped(&inner);
                            return;
                        }
                        adopt_channel(&inner, &new_channel);
                        tracing::info!(url = %inner.config.url, "hub reconnected");
                        channel = new_channel;
                    }
                    None => {
                        // `stop()` owns the teardown when it caused the
                        // abort; exhaustion ends the session here.
                        if cancel.is_cancelled() {
                            settle_stopped(&inner);
                        } else {
                            end_session(&inner);
                        }
                        return;
                    }
                }
            }
        }
    }
}

/// Read transport events and dispatch records until the session ends.
async fn run_session(
    inner: &Arc<Inner>,
    channel: &mut Channel,
    cancel: &CancellationToken,
) -> SessionEnd {
    let outbound = channel.outbound_tx.clone();
    let mut keepalive = tokio::time::interval(inner.config.keepalive);
    keepalive.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionEnd::Stopped,
            _ = keepalive.tick() => {
                let _ = outbound.send(protocol::encode_ping()).await;
            }
            event = channel.events_rx.recv() => {
                match event {
                    Some(TransportEvent::Payload(payload)) => {
                        if let Some(end) = dispatch_payload(inner, &payload) {
                            return end;
                        }
                    }
                    Some(TransportEvent::Closed { error: Some(reason) }) => {
                        return SessionEnd::Error(reason);
                    }
                    Some(TransportEvent::Closed { error: None }) | None => {
                        return SessionEnd::Clean;
                    }
                }
            }
        }
    }
}

/// Apply the automatic reconnect schedule. `Some(channel)` on success,
/// `None` once the schedule is exhausted or the session was stopped.
async fn reconnect(inner: &Arc<Inner>, cancel: &CancellationToken) -> Option<Channel> {
    let mut attempt: u32 = 0;
    loop {
        let Some(delay) = inner.config.reconnect.next_delay(attempt) else {
            tracing::error!(
                url = %inner.config.url,
                attempts = attempt,
                "automatic reconnect schedule exhausted, giving up"
            );
            return None;
        };

        inner
            .state_tx
            .send_replace(ConnectionState::Reconnecting { attempt });
        tracing::info!(
            url = %inner.config.url,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            () = tokio::time::sleep(delay) => {}
        }

        match connect_once(inner).await {
            Ok(channel) => return Some(channel),
            Err(e) => {
                log_start_failure(&e, attempt);
                attempt += 1;
            }
        }
    }
}

/// Manual backoff after a failed `start()`: retry until connected or
/// the attempt budget is spent.
async fn start_retry_task(inner: Arc<Inner>, cancel: CancellationToken) {
    let retry = inner.config.start_retry.clone();
    let mut attempt: u32 = 0;

    loop {
        let Some(delay) = retry.delay(attempt) else {
            tracing::error!(
                url = %inner.config.url,
                attempts = attempt,
                "giving up on hub connection after repeated start failures"
            );
            end_session(&inner);
            return;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }

        inner.state_tx.send_replace(ConnectionState::Connecting);
        match connect_once(&inner).await {
            Ok(channel) => {
                if cancel.is_cancelled() {
                    settle_stopped(&inner);
                    return;
                }
                adopt_channel(&inner, &channel);
                tracing::info!(url = %inner.config.url, attempt, "hub connected");
                run_connection(inner, channel, cancel).await;
                return;
            }
            Err(e) => {
                attempt += 1;
                log_start_failure(&e, attempt);
            }
        }
    }
}

// ── Record dispatch ──────────────────────────────────────────────────

/// Split and dispatch one transport payload. Returns a session end when
/// the payload carried a protocol close.
fn dispatch_payload(inner: &Arc<Inner>, payload: &str) -> Option<SessionEnd> {
    for record in protocol::split_records(payload) {
        match protocol::parse_record(record) {
            Ok(HubMessage::Invocation {
                target, arguments, ..
            }) => dispatch_event(inner, &target, &arguments),
            Ok(HubMessage::Completion {
                invocation_id,
                result,
                error,
            }) => complete_invocation(inner, &invocation_id, result, error),
            Ok(HubMessage::Ping) => tracing::trace!("hub ping"),
            Ok(HubMessage::Close {
                error,
                allow_reconnect,
            }) => {
                tracing::debug!(?error, allow_reconnect, "hub close record");
                return Some(match error {
                    Some(reason) => SessionEnd::Error(reason),
                    None => SessionEnd::Clean,
                });
            }
            Ok(HubMessage::Other { kind }) => {
                tracing::trace!(kind, "ignoring unhandled record type");
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed hub record");
            }
        }
    }
    None
}

/// Fan a server event out to every registered handler, in registration
/// order.
fn dispatch_event(inner: &Arc<Inner>, target: &str, arguments: &[Value]) {
    let callbacks: Vec<EventHandler> = lock(&inner.handlers)
        .get(target)
        .map(|list| list.iter().map(|h| Arc::clone(&h.callback)).collect())
        .unwrap_or_default();

    if callbacks.is_empty() {
        tracing::trace!(target, "server event with no registered handler");
        return;
    }

    for callback in callbacks {
        callback(arguments);
    }
}

fn complete_invocation(
    inner: &Arc<Inner>,
    invocation_id: &str,
    result: Option<Value>,
    error: Option<String>,
) {
    let Some((_, PendingInvocation { target, tx })) = inner.pending.remove(invocation_id) else {
        tracing::warn!(invocation_id, "completion with no pending invocation");
        return;
    };

    let outcome = match error {
        Some(message) => Err(Error::InvocationRejected { target, message }),
        None => Ok(result.unwrap_or(Value::Null)),
    };
    let _ = tx.send(outcome);
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn connection() -> HubConnection {
        let config = HubConfig::new("https://app.example.com/hubs/chat".parse().expect("url"));
        HubConnection::new(config).expect("connection")
    }

    #[tokio::test]
    async fn fresh_connection_is_disconnected() {
        let conn = connection();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn invoke_without_connection_is_not_connected() {
        let conn = connection();
        let err = conn.invoke("SendMessage", vec![json!("hi")]).await;
        assert!(matches!(err, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn handlers_fan_out_in_registration_order() {
        let conn = connection();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_a = Arc::clone(&seen);
        conn.on("ReceiveMessage", move |_args| {
            lock(&seen_a).push("first");
        });
        let seen_b = Arc::clone(&seen);
        conn.on("ReceiveMessage", move |_args| {
            lock(&seen_b).push("second");
        });

        dispatch_event(&conn.inner, "ReceiveMessage", &[json!({"id": "m1"})]);

        assert_eq!(*lock(&seen), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn off_with_id_removes_only_that_handler() {
        let conn = connection();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_a = Arc::clone(&seen);
        let first = conn.on("UserOnline", move |_| lock(&seen_a).push("first"));
        let seen_b = Arc::clone(&seen);
        conn.on("UserOnline", move |_| lock(&seen_b).push("second"));

        conn.off("UserOnline", Some(first));
        dispatch_event(&conn.inner, "UserOnline", &[]);

        assert_eq!(*lock(&seen), vec!["second"]);
    }

    #[tokio::test]
    async fn off_without_id_removes_all_handlers() {
        let conn = connection();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_a = Arc::clone(&seen);
        conn.on("UserOffline", move |_| lock(&seen_a).push("first"));
        let seen_b = Arc::clone(&seen);
        conn.on("UserOffline", move |_| lock(&seen_b).push("second"));

        conn.off("UserOffline", None);
        dispatch_event(&conn.inner, "UserOffline", &[]);

        assert!(lock(&seen).is_empty());
    }

    #[tokio::test]
    async fn completion_resolves_pending_invocation() {
        let conn = connection();
        let (tx, rx) = oneshot::channel();
        conn.inner.pending.insert(
            "7".into(),
            PendingInvocation {
                target: "GetOnlineUsers".into(),
                tx,
            },
        );

        complete_invocation(&conn.inner, "7", Some(json!(["u1", "u2"])), None);

        assert_eq!(rx.await.expect("completion").expect("ok"), json!(["u1", "u2"]));
        assert!(conn.inner.pending.is_empty());
    }

    #[tokio::test]
    async fn completion_error_rejects_pending_invocation() {
        let conn = connection();
        let (tx, rx) = oneshot::channel();
        conn.inner.pending.insert(
            "3".into(),
            PendingInvocation {
                target: "JoinRoom".into(),
                tx,
            },
        );

        complete_invocation(&conn.inner, "3", None, Some("room not found".into()));

        let err = rx.await.expect("completion").unwrap_err();
        assert!(matches!(
            err,
            Error::InvocationRejected { target, message }
                if target == "JoinRoom" && message == "room not found"
        ));
    }

    #[tokio::test]
    async fn unknown_completion_is_ignored() {
        let conn = connection();
        // No pending entry; must log and not panic.
        complete_invocation(&conn.inner, "99", Some(json!(null)), None);
    }

    #[tokio::test]
    async fn close_record_without_error_ends_clean() {
        let conn = connection();
        let payload = format!("{{\"type\":7}}{}", protocol::RECORD_SEPARATOR);
        let end = dispatch_payload(&conn.inner, &payload);
        assert!(matches!(end, Some(SessionEnd::Clean)));
    }

    #[tokio::test]
    async fn close_record_with_error_ends_errored() {
        let conn = connection();
        let payload = format!(
            "{{\"type\":7,\"error\":\"server restarting\"}}{}",
            protocol::RECORD_SEPARATOR
        );
        let end = dispatch_payload(&conn.inner, &payload);
        assert!(matches!(end, Some(SessionEnd::Error(reason)) if reason == "server restarting"));
    }

    #[tokio::test]
    async fn malformed_record_does_not_end_session() {
        let conn = connection();
        let payload = format!("not json{}", protocol::RECORD_SEPARATOR);
        assert!(dispatch_payload(&conn.inner, &payload).is_none());
    }

    #[test]
    fn url_forms_swap_schemes() {
        let https: Url = "https://host/hubs/chat".parse().expect("url");
        assert_eq!(ws_form(&https).scheme(), "wss");
        assert_eq!(http_form(&ws_form(&https)).scheme(), "https");

        let ws: Url = "ws://host/hubs/chat".parse().expect("url");
        assert_eq!(http_form(&ws).scheme(), "http");
    }
}
