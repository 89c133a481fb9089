//! Transport negotiation.
//!
//! Before opening a channel the client POSTs to `{hub}/negotiate` and
//! the server answers with a connection token and the transports it is
//! willing to carry. Preference order: a persistent full-duplex socket,
//! then a server-push stream, then long polling.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::Error;

/// A transport the server may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TransportKind {
    WebSockets,
    ServerSentEvents,
    LongPolling,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::WebSockets => "WebSockets",
            Self::ServerSentEvents => "ServerSentEvents",
            Self::LongPolling => "LongPolling",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTransport {
    pub transport: TransportKind,
    #[serde(default)]
    pub transfer_formats: Vec<String>,
}

/// Server response to the negotiate request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    /// Token identifying the reserved connection slot; appended as the
    /// `id` query parameter on the chosen transport.
    #[serde(default)]
    pub connection_token: Option<String>,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub available_transports: Vec<AvailableTransport>,
}

impl NegotiateResponse {
    /// The token to carry on the transport URL (newer servers send
    /// `connectionToken`, older ones only `connectionId`).
    pub fn token(&self) -> Option<&str> {
        self.connection_token
            .as_deref()
            .or(self.connection_id.as_deref())
    }

    fn offers(&self, kind: TransportKind) -> bool {
        self.available_transports
            .iter()
            .any(|t| t.transport == kind)
    }
}

/// POST the negotiate request for `hub_url`.
///
/// The session cookie rides along automatically via the client's jar.
/// Failures are classified for the start-failure log line: 401/403 map
/// to [`Error::AuthFailed`], 429 to [`Error::RateLimited`], anything
/// else non-success to [`Error::Negotiate`].
pub async fn negotiate(
    http: &reqwest::Client,
    hub_url: &Url,
    timeout: Duration,
) -> Result<NegotiateResponse, Error> {
    let mut negotiate_url = hub_url.clone();
    {
        let mut path = negotiate_url.path().trim_end_matches('/').to_owned();
        path.push_str("/negotiate");
        negotiate_url.set_path(&path);
    }
    negotiate_url.set_query(Some("negotiateVersion=1"));

    tracing::debug!(url = %negotiate_url, "negotiating hub transport");

    let response = http
        .post(negotiate_url)
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    match status.as_u16() {
        200 => {
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| Error::Negotiate {
                message: format!("invalid negotiate response: {e}"),
                status: 200,
            })
        }
        401 | 403 => Err(Error::AuthFailed {
            message: format!("negotiate rejected with HTTP {status}"),
        }),
        429 => {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            Err(Error::RateLimited { retry_after_secs })
        }
        code => Err(Error::Negotiate {
            message: response.text().await.unwrap_or_default(),
            status: code,
        }),
    }
}

/// Pick the transport to carry, in preference order.
///
/// WebSockets wins when offered. The server-push tier degrades to long
/// polling on this client: every server that streams events over a
/// one-way push channel also accepts poll requests on the same
/// endpoint, and the polling receiver reuses the HTTP client the
/// negotiate call already built.
pub fn select_transport(response: &NegotiateResponse) -> Result<TransportKind, Error> {
    if response.offers(TransportKind::WebSockets) {
        return Ok(TransportKind::WebSockets);
    }
    if response.offers(TransportKind::ServerSentEvents)
        || response.offers(TransportKind::LongPolling)
    {
        return Ok(TransportKind::LongPolling);
    }

    let offered = response
        .available_transports
        .iter()
        .map(|t| t.transport.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(Error::NoUsableTransport { offered })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with(kinds: &[TransportKind]) -> NegotiateResponse {
        NegotiateResponse {
            connection_token: Some("tok".into()),
            connection_id: None,
            available_transports: kinds
                .iter()
                .map(|&transport| AvailableTransport {
                    transport,
                    transfer_formats: vec!["Text".into()],
                })
                .collect(),
        }
    }

    #[test]
    fn websockets_preferred_when_offered() {
        let response = response_with(&[
            TransportKind::LongPolling,
            TransportKind::WebSockets,
            TransportKind::ServerSentEvents,
        ]);
        assert_eq!(
            select_transport(&response).unwrap(),
            TransportKind::WebSockets
        );
    }

    #[test]
    fn push_stream_degrades_to_polling() {
        let response = response_with(&[TransportKind::ServerSentEvents]);
        assert_eq!(
            select_transport(&response).unwrap(),
            TransportKind::LongPolling
        );
    }

    #[test]
    fn no_transports_is_an_error() {
        let response = response_with(&[]);
        assert!(matches!(
            select_transport(&response),
            Err(Error::NoUsableTransport { .. })
        ));
    }

    #[test]
    fn token_falls_back_to_connection_id() {
        let response = NegotiateResponse {
            connection_token: None,
            connection_id: Some("legacy-id".into()),
            available_transports: Vec::new(),
        };
        assert_eq!(response.token(), Some("legacy-id"));
    }

    #[test]
    fn negotiate_response_deserializes_server_shape() {
        let body = r#"{
            "connectionToken": "abc",
            "connectionId": "def",
            "negotiateVersion": 1,
            "availableTransports": [
                { "transport": "WebSockets", "transferFormats": ["Text", "Binary"] },
                { "transport": "LongPolling", "transferFormats": ["Text"] }
            ]
        }"#;
        let response: NegotiateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.token(), Some("abc"));
        assert_eq!(response.available_transports.len(), 2);
        assert_eq!(
            response.available_transports[0].transport,
            TransportKind::WebSockets
        );
    }
}
