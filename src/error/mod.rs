//! Error types for the AutoPart client.

pub mod unified;

pub use unified::{ApiError, ErrorCategory, GENERIC_ERROR_MESSAGE};

use thiserror::Error;

/// Primary error type for all transport, auth, and façade operations.
///
/// UI-facing code should not match on this directly; convert it to the
/// normalized [`ApiError`] instead (the query layer does this for you).
#[derive(Error, Debug)]
pub enum AutoPartError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A 401 that survived its one permitted retry.
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Token refresh failed: {message}")]
    RefreshFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Token storage error: {0}")]
    Storage(String),
}

impl AutoPartError {
    /// Create an API error from a status and message, without a body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            body: None,
        }
    }

    /// Build an API error from a non-2xx response body.
    ///
    /// The body is kept verbatim when it parses as JSON; the message prefers
    /// the backend's `message` / `error` fields and falls back to the raw text.
    pub fn from_response_body(status: u16, raw: &str) -> Self {
        let body = serde_json::from_str::<serde_json::Value>(raw).ok();
        let message = body
            .as_ref()
            .and_then(unified::backend_message)
            .unwrap_or_else(|| {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    format!("Request failed with status code {status}")
                } else {
                    trimmed.to_string()
                }
            });
        Self::Api {
            status,
            message,
            body,
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Authentication(_) => Some(401),
            Self::RefreshFailed { status, .. } => *status,
            Self::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::NoRefreshToken | Self::RefreshFailed { .. } => ErrorCategory::SessionExpired,
            Self::Network(err) if err.is_timeout() => ErrorCategory::Timeout,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                404 => ErrorCategory::NotFound,
                400 | 409 | 422 => ErrorCategory::Validation,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AutoPartError>;
