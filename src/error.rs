//! Error types for the Gradium client.
//!
//! REST calls map terminal HTTP statuses onto a fixed taxonomy via
//! [`Error::from_response`]. Streaming sessions surface errors through two
//! paths: a failed handshake is returned by the open call itself, while a
//! mid-stream failure is captured once per session and returned by the next
//! `wait_ready`/collect call after the result channels close.

use serde::Deserialize;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Detail entry of a 422 validation response.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationDetail {
    /// Location of the offending field (path segments as sent by the server).
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    /// Human-readable description.
    pub msg: String,
    /// Server-side error category.
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Errors returned by the Gradium client.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The API key is missing or was rejected (HTTP 401/403).
    #[error("{0}")]
    Authentication(String),

    /// The request failed validation (HTTP 422).
    #[error("{}", format_validation(.errors))]
    Validation {
        /// HTTP status, always 422.
        status: u16,
        /// Per-field details, possibly empty.
        errors: Vec<ValidationDetail>,
    },

    /// The requested resource does not exist (HTTP 404).
    #[error("{0}")]
    NotFound(String),

    /// Rate limit exceeded (HTTP 429).
    #[error("{message}")]
    RateLimit {
        /// Server-provided description.
        message: String,
        /// Seconds to wait, from the Retry-After header.
        retry_after: Option<u64>,
    },

    /// Server-side failure (HTTP 5xx).
    #[error("internal server error ({status}): {message}")]
    InternalServer { status: u16, message: String },

    /// Any other non-success HTTP response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The transport could not be established or the request never completed.
    #[error("{0}")]
    Connection(String),

    /// A structured error on the stream, or a failure on an open stream.
    #[error("{}", format_websocket(.message, .code))]
    WebSocket {
        /// Human-readable message.
        message: String,
        /// Numeric code from the server's error frame, if any.
        code: Option<i64>,
    },

    /// A caller-supplied deadline elapsed. The session itself is unaffected.
    #[error("request timed out: {0}")]
    Timeout(String),
}

fn format_validation(errors: &[ValidationDetail]) -> String {
    if errors.is_empty() {
        return "validation error".to_string();
    }
    let msgs: Vec<&str> = errors.iter().map(|e| e.msg.as_str()).collect();
    format!("validation error: {}", msgs.join("; "))
}

fn format_websocket(message: &str, code: &Option<i64>) -> String {
    match code {
        Some(code) => format!("websocket error ({code}): {message}"),
        None => format!("websocket error: {message}"),
    }
}

/// Shape of a 422 response body.
#[derive(Debug, Deserialize)]
struct HttpValidationBody {
    #[serde(default)]
    detail: Vec<ValidationDetail>,
}

impl Error {
    /// Map a terminal HTTP response onto the error taxonomy.
    ///
    /// Consumes the response body. The `detail` field is preferred as the
    /// message when it is a plain string; otherwise the raw body is used.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
            .unwrap_or_else(|| body.clone());

        match status {
            422 => {
                let errors = serde_json::from_str::<HttpValidationBody>(&body)
                    .map(|b| b.detail)
                    .unwrap_or_default();
                Error::Validation { status, errors }
            }
            401 | 403 => Error::Authentication(message),
            404 => Error::NotFound(message),
            429 => Error::RateLimit {
                message,
                retry_after,
            },
            500.. => Error::InternalServer { status, message },
            _ => Error::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else {
            Error::Connection(err.to_string())
        }
    }
}
