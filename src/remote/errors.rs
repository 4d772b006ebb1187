use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the remote record store.
///
/// Variants are `Clone` so that coalesced cache waiters can all observe the
/// failure of a single shared fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("{0}")]
    Unknown(String),
}

impl StoreError {
    /// Transient failures consume retry budget; everything else propagates
    /// to the caller immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout(_)
                | StoreError::Network(_)
                | StoreError::Server { .. }
                | StoreError::RateLimited(_)
        )
    }

    /// Classify an HTTP status, carrying along whatever message the backend
    /// provided.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 | 422 => StoreError::Validation(message),
            401 | 403 => StoreError::Permission(message),
            404 => StoreError::NotFound(message),
            408 => StoreError::Timeout(message),
            429 => StoreError::RateLimited(message),
            500..=599 => StoreError::Server { status, message },
            _ => StoreError::Unknown(format!("HTTP {status}: {message}")),
        }
    }

    /// Classify an error response, extracting the backend's `{message}` body
    /// when it has one.
    pub fn from_error_body(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<Value>(body) {
            Ok(value) => normalize_message(&value),
            Err(_) if !body.trim().is_empty() => body.trim().to_string(),
            Err(_) => format!("HTTP {status}"),
        };
        Self::from_status(status, message)
    }
}

/// Coalesce error shapes into a single string: structured `{message}` objects,
/// plain strings, and anything else down to its JSON representation.
pub fn normalize_message(value: &Value) -> String {
    match value {
        Value::Object(map) => match map.get("message") {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => value.to_string(),
        },
        Value::String(message) => message.clone(),
        other => other.to_string(),
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            StoreError::Network(err.to_string())
        } else {
            StoreError::Unknown(err.to_string())
        }
    }
}
