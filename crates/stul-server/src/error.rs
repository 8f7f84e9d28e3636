//! Session and transport error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Why a receive on a connection did not yield a value.
///
/// These end a session's relay loop. They are the normal way disconnects are
/// detected and are never reported back to the peer.
#[derive(Debug, Error)]
pub enum ReadFailure {
    /// The peer closed the transport (close frame or end of stream).
    #[error("peer closed the connection")]
    Closed,
    /// The bounded receive wait expired.
    #[error("receive wait expired")]
    TimedOut,
    /// A data frame was not valid JSON (or not the expected shape).
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A binary frame arrived where a JSON text frame was expected.
    #[error("binary frames are not accepted")]
    BinaryFrame,
    /// The transport reported a protocol or I/O error.
    #[error("transport error: {0}")]
    Transport(String),
    /// The connection's own writer failed, so the transport is unusable.
    #[error("outbound transport failed")]
    WriterFailed,
    /// The server is shutting down.
    #[error("server shutting down")]
    Shutdown,
}

/// Why an envelope could not be queued for a connection.
#[derive(Debug, Error)]
pub enum SendError {
    /// The connection's writer has stopped.
    #[error("connection closed")]
    Closed,
    /// The connection's outbound queue is full; the frame was dropped.
    #[error("send queue full")]
    QueueFull,
    /// The connection is being torn down.
    #[error("connection cancelled")]
    Cancelled,
    /// The envelope could not be serialized.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why a host was not admitted.
#[derive(Debug, Error)]
pub enum AuthFailure {
    /// The auth message arrived but the password did not match.
    #[error("wrong password")]
    WrongPassword,
    /// No usable auth message arrived (closed, malformed, or too late).
    #[error("no auth request: {0}")]
    NoRequest(#[source] ReadFailure),
}

/// Failures that end a connection before or instead of relaying.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested channel is not configured.
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
    /// A host connection failed to authenticate.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(#[from] AuthFailure),
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        match self {
            Self::ChannelNotFound(_) => (StatusCode::NOT_FOUND, "Channel not found").into_response(),
            Self::AuthenticationFailed(_) => {
                (StatusCode::UNAUTHORIZED, "Authentication failed").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_not_found_is_404() {
        let resp = SessionError::ChannelNotFound("nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn auth_failure_is_401() {
        let resp = SessionError::from(AuthFailure::WrongPassword).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn auth_failure_display_includes_reason() {
        let err = SessionError::from(AuthFailure::NoRequest(ReadFailure::TimedOut));
        assert_eq!(
            err.to_string(),
            "authentication failed: no auth request: receive wait expired"
        );
    }

    #[test]
    fn send_error_display() {
        assert_eq!(SendError::QueueFull.to_string(), "send queue full");
        assert_eq!(SendError::Closed.to_string(), "connection closed");
    }

    #[test]
    fn malformed_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let failure: ReadFailure = json_err.into();
        assert!(failure.to_string().starts_with("malformed payload"));
    }
}
