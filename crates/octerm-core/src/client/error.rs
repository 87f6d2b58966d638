//! Structured errors for the catalog client and event feed.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of client errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientErrorKind {
    /// Non-success HTTP status (4xx, 5xx)
    HttpStatus,
    /// Request timed out
    Timeout,
    /// Server unreachable
    Connect,
    /// Response body could not be decoded
    Parse,
    /// Event feed broke mid-stream
    Stream,
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErrorKind::HttpStatus => write!(f, "http_status"),
            ClientErrorKind::Timeout => write!(f, "timeout"),
            ClientErrorKind::Connect => write!(f, "connect"),
            ClientErrorKind::Parse => write!(f, "parse"),
            ClientErrorKind::Stream => write!(f, "stream"),
        }
    }
}

/// Error from the agent server with kind and details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientError {
    pub kind: ClientErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Raw response body, when there was one
    pub details: Option<String>,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, lifting a `message` field out of a JSON body when present.
    pub fn http_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        if body.is_empty() {
            return Self::new(ClientErrorKind::HttpStatus, format!("HTTP {status}"));
        }

        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| {
                json.get("message")
                    .or_else(|| json.get("error").and_then(|e| e.get("message")))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .map_or_else(|| format!("HTTP {status}"), |msg| format!("HTTP {status}: {msg}"));

        Self {
            kind: ClientErrorKind::HttpStatus,
            message,
            details: Some(body.to_string()),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Parse, message)
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Stream, message)
    }

    pub(crate) fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::new(ClientErrorKind::Timeout, format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::new(ClientErrorKind::Connect, format!("Connection failed: {e}"))
        } else if e.is_decode() {
            Self::parse(format!("Invalid response body: {e}"))
        } else {
            Self::new(ClientErrorKind::HttpStatus, format!("Network error: {e}"))
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ClientError {}

/// Result type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_extracts_json_message() {
        let err = ClientError::http_status(404, r#"{"message":"session not found"}"#);
        assert_eq!(err.kind, ClientErrorKind::HttpStatus);
        assert_eq!(err.message, "HTTP 404: session not found");
        assert!(err.details.is_some());
    }

    #[test]
    fn test_http_status_nested_error_message() {
        let err = ClientError::http_status(500, r#"{"error":{"message":"boom"}}"#);
        assert_eq!(err.to_string(), "HTTP 500: boom");
    }

    #[test]
    fn test_http_status_plain_body_kept_as_details() {
        let err = ClientError::http_status(502, "bad gateway");
        assert_eq!(err.message, "HTTP 502");
        assert_eq!(err.details.as_deref(), Some("bad gateway"));

        let empty = ClientError::http_status(503, "");
        assert_eq!(empty.details, None);
    }
}
