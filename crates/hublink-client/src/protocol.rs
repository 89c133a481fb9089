//! JSON hub wire protocol.
//!
//! Records are JSON objects delimited by a `0x1e` record separator.
//! The first record on a fresh channel is the handshake; after that,
//! every record carries a numeric `type` discriminant:
//!
//! - `1` invocation (both directions; server→client invocations without
//!   an `invocationId` are the "named events" consumers subscribe to)
//! - `2` stream item (not consumed by this client)
//! - `3` completion (resolves a pending client invocation)
//! - `6` ping (keepalive, both directions)
//! - `7` close (server-initiated teardown, optionally carrying an error)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Record separator between wire records.
pub const RECORD_SEPARATOR: char = '\u{1e}';

const TYPE_INVOCATION: u8 = 1;
const TYPE_STREAM_ITEM: u8 = 2;
const TYPE_COMPLETION: u8 = 3;
const TYPE_PING: u8 = 6;
const TYPE_CLOSE: u8 = 7;

// ── Messages ─────────────────────────────────────────────────────────

/// A decoded hub record.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// A named call. Server→client invocations are dispatched to event
    /// handlers; the `invocation_id` is set only on calls that expect a
    /// completion.
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    /// Resolution of a client-issued invocation.
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    /// Keepalive.
    Ping,
    /// Server-initiated close. `error` present means the closure was not
    /// graceful and the reconnect policy applies.
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// A record type this client does not consume (stream items, future
    /// message kinds). Logged and skipped by the dispatcher.
    Other { kind: u8 },
}

/// On-the-wire shape shared by every record kind.
///
/// The protocol multiplexes all message types through one object with a
/// numeric discriminant, so decoding goes through this raw form first.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRecord {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    invocation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_reconnect: Option<bool>,
}

// ── Encoding ─────────────────────────────────────────────────────────

/// Encode the channel handshake record.
pub fn handshake_request() -> String {
    format!("{{\"protocol\":\"json\",\"version\":1}}{RECORD_SEPARATOR}")
}

/// Encode a client invocation that expects a completion.
pub fn encode_invocation(invocation_id: &str, target: &str, arguments: &[Value]) -> String {
    let record = RawRecord {
        kind: TYPE_INVOCATION,
        invocation_id: Some(invocation_id.to_owned()),
        target: Some(target.to_owned()),
        arguments: Some(arguments.to_vec()),
        ..RawRecord::default()
    };
    encode_record(&record)
}

/// Encode a keepalive ping.
pub fn encode_ping() -> String {
    format!("{{\"type\":{TYPE_PING}}}{RECORD_SEPARATOR}")
}

fn encode_record(record: &RawRecord) -> String {
    // RawRecord contains only JSON-representable fields, so
    // serialization cannot fail.
    let mut text = serde_json::to_string(record).unwrap_or_default();
    text.push(RECORD_SEPARATOR);
    text
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Parse the handshake response record. An empty object means success;
/// anything else carries an `error` field.
pub fn parse_handshake_response(record: &str) -> Result<(), Error> {
    #[derive(Deserialize)]
    struct HandshakeResponse {
        #[serde(default)]
        error: Option<String>,
    }

    let response: HandshakeResponse =
        serde_json::from_str(record).map_err(|e| Error::Handshake(e.to_string()))?;

    match response.error {
        None => Ok(()),
        Some(reason) => Err(Error::Handshake(reason)),
    }
}

/// Split a transport payload into individual records.
///
/// A single WebSocket frame or long-poll body may carry several records;
/// the trailing separator produces an empty fragment which is dropped.
pub fn split_records(payload: &str) -> impl Iterator<Item = &str> {
    payload
        .split(RECORD_SEPARATOR)
        .filter(|fragment| !fragment.is_empty())
}

/// Decode one record into a [`HubMessage`].
pub fn parse_record(record: &str) -> Result<HubMessage, Error> {
    let raw: RawRecord = serde_json::from_str(record).map_err(|e| Error::MalformedRecord {
        message: e.to_string(),
        record: record.to_owned(),
    })?;

    let message = match raw.kind {
        TYPE_INVOCATION => HubMessage::Invocation {
            invocation_id: raw.invocation_id,
            target: raw.target.unwrap_or_default(),
            arguments: raw.arguments.unwrap_or_default(),
        },
        TYPE_COMPLETION => HubMessage::Completion {
            invocation_id: raw.invocation_id.unwrap_or_default(),
            result: raw.result,
            error: raw.error,
        },
        TYPE_PING => HubMessage::Ping,
        TYPE_CLOSE => HubMessage::Close {
            error: raw.error,
            allow_reconnect: raw.allow_reconnect.unwrap_or(false),
        },
        TYPE_STREAM_ITEM => HubMessage::Other {
            kind: TYPE_STREAM_ITEM,
        },
        kind => HubMessage::Other { kind },
    };

    Ok(message)
}

// ── Tests ────────────────────────────────────────────────────────────
