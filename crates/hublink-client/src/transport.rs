// Shared transport configuration for hub connections.
//
// The negotiate request and the long-polling fallback share one
// `reqwest::Client`; the WebSocket upgrade reads the session cookie out
// of the same jar so all three paths present identical credentials.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (development servers).
    DangerAcceptInvalid,
}

/// Transport configuration for a hub connection.
///
/// Authentication is cookie-based: the session cookie is seeded into a
/// shared jar and sent automatically with the negotiate request, every
/// long-poll request, and the WebSocket upgrade. No bearer token is
/// attached to hub traffic.
#[derive(Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Timeout for the negotiate request only. Long-poll and invocation
    /// waits are deliberately unbounded (the hub layer has no timeouts).
    pub negotiate_timeout: Duration,
    /// Session cookie in `name=value` form, seeded into the jar at
    /// client build time. `None` when the process already holds a jar
    /// populated by an earlier login on the same client.
    pub session_cookie: Option<SecretString>,
    cookie_jar: Arc<Jar>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::default(),
            negotiate_timeout: Duration::from_secs(30),
            session_cookie: None,
            cookie_jar: Arc::new(Jar::default()),
        }
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("tls", &self.tls)
            .field("negotiate_timeout", &self.negotiate_timeout)
            .field("session_cookie", &self.session_cookie.as_ref().map(|_| "…"))
            .finish_non_exhaustive()
    }
}

impl TransportConfig {
    /// Set the session cookie (`name=value`) used for hub authentication.
    pub fn with_session_cookie(mut self, cookie: SecretString) -> Self {
        self.session_cookie = Some(cookie);
        self
    }

    /// Build the `reqwest::Client` shared by negotiate and long-polling,
    /// seeding the session cookie into the jar for `origin`.
    ///
    /// No global timeout is set: long-poll requests are held open by the
    /// server far longer than any sane request timeout. The negotiate
    /// call applies [`negotiate_timeout`](Self::negotiate_timeout) per
    /// request instead.
    pub fn build_client(&self, origin: &Url) -> Result<reqwest::Client, Error> {
        if let Some(ref cookie) = self.session_cookie {
            self.cookie_jar.add_cookie_str(cookie.expose_secret(), origin);
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("hublink/", env!("CARGO_PKG_VERSION")))
            .cookie_provider(Arc::clone(&self.cookie_jar));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Read the `Cookie` header value the jar would send to `url`.
    ///
    /// The WebSocket upgrade bypasses reqwest, so the cookies have to be
    /// copied onto the upgrade request by hand.
    pub fn cookie_header_for(&self, url: &Url) -> Option<String> {
        self.cookie_jar
            .cookies(url)
            .and_then(|value| value.to_str().ok().map(String::from))
    }
}
