use thiserror::Error;

/// Top-level error type for the `hublink-client` crate.
///
/// Covers every failure mode across the protocol surface: negotiation,
/// transport establishment, the wire codec, and remote invocations.
/// `hublink-core` maps these into domain-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Negotiation ─────────────────────────────────────────────────
    /// The negotiate request was rejected (non-auth, non-rate-limit).
    #[error("Negotiation failed (HTTP {status}): {message}")]
    Negotiate { message: String, status: u16 },

    /// Session cookie missing, expired, or rejected by the hub.
    #[error("Hub authentication failed: {message}")]
    AuthFailed { message: String },

    /// Rate limited by the server. Includes retry-after in seconds when sent.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The server offered no transport this client can carry.
    #[error("No usable transport offered by server (offered: {offered})")]
    NoUsableTransport { offered: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// WebSocket connection failed or dropped with an error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    // ── Protocol ────────────────────────────────────────────────────
    /// The hub rejected the protocol handshake.
    #[error("Handshake rejected: {0}")]
    Handshake(String),

    /// The server closed the connection via a protocol close record.
    #[error("Server closed the connection: {reason}")]
    ServerClosed { reason: String },

    /// A wire record could not be decoded.
    #[error("Malformed hub record: {message}")]
    MalformedRecord { message: String, record: String },

    // ── Invocations ─────────────────────────────────────────────────
    /// `invoke()` was called while the channel is not connected.
    #[error("Not connected to hub")]
    NotConnected,

    /// The server completed an invocation with an error.
    #[error("Invocation '{target}' rejected by server: {message}")]
    InvocationRejected { target: String, message: String },

    /// The connection dropped before the invocation completed.
    #[error("Connection dropped while invocation '{target}' was in flight")]
    InvocationDropped { target: String },
}

/// Coarse classification of a connection-start failure.
///
/// Used for logging only -- every class feeds the same retry policy
/// (none is fatal, none short-circuits the backoff schedule).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFailureKind {
    RateLimited,
    AuthFailed,
    NetworkUnreachable,
    Unknown,
}

impl Error {
    /// Classify a failed connection start for the log line.
    pub fn start_failure_kind(&self) -> StartFailureKind {
        match self {
            Self::RateLimited { .. } => StartFailureKind::RateLimited,
            Self::AuthFailed { .. } => StartFailureKind::AuthFailed,
            Self::Http(e) if e.is_connect() || e.is_timeout() => {
                StartFailureKind::NetworkUnreachable
            }
            Self::WebSocket(_) | Self::Tls(_) => StartFailureKind::NetworkUnreachable,
            _ => StartFailureKind::Unknown,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } | Self::WebSocket(_) => true,
            _ => false,
        }
    }
}
