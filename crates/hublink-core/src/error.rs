// ── Core error types ──
//
// User-facing errors from hublink-core. Consumers never see transport
// details (HTTP status codes, WebSocket close codes) directly; the
// `From<hublink_client::Error>` impl translates connection-layer errors
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Hub is not connected")]
    NotConnected,

    #[error("Hub call '{target}' failed: {message}")]
    InvocationFailed { target: String, message: String },

    #[error("Malformed payload for event '{event}': {reason}")]
    MalformedPayload { event: String, reason: String },

    #[error("No room joined")]
    NoRoomJoined,

    #[error("Connection error: {message}")]
    Connection { message: String },
}

impl From<hublink_client::Error> for CoreError {
    fn from(err: hublink_client::Error) -> Self {
        use hublink_client::Error as ClientError;
        match err {
            ClientError::NotConnected => Self::NotConnected,
            ClientError::InvocationRejected { target, message } => {
                Self::InvocationFailed { target, message }
            }
            ClientError::InvocationDropped { target } => Self::InvocationFailed {
                target,
                message: "connection lost before the call completed".into(),
            },
            other => Self::Connection {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_translate_to_domain_variants() {
        let err: CoreError = hublink_client::Error::NotConnected.into();
        assert!(matches!(err, CoreError::NotConnected));

        let err: CoreError = hublink_client::Error::InvocationRejected {
            target: "JoinRoom".into(),
            message: "room not found".into(),
        }
        .into();
        assert!(matches!(
            err,
            CoreError::InvocationFailed { target, .. } if target == "JoinRoom"
        ));
    }
}
