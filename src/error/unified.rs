//! Normalized error shape handed to UI code.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::AutoPartError;

/// Fallback message when neither the backend nor the transport said anything useful.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Broad error category used for routing and for the normalized `code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    SessionExpired,
    NotFound,
    Validation,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Storage,
}

/// Uniform error presented to callers regardless of the underlying failure.
///
/// Only `message` is guaranteed; `details` is whatever the backend sent and
/// has no promised structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: if message.trim().is_empty() {
                GENERIC_ERROR_MESSAGE.to_string()
            } else {
                message
            },
            status: None,
            code: None,
            details: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

impl From<AutoPartError> for ApiError {
    fn from(error: AutoPartError) -> Self {
        let status = error.status();
        let category = error.category();
        match error {
            AutoPartError::Api { message, body, .. } => {
                let code = body
                    .as_ref()
                    .and_then(|b| b.get("code"))
                    .and_then(|c| match c {
                        serde_json::Value::String(s) => Some(s.clone()),
                        serde_json::Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .unwrap_or_else(|| category.to_string());
                let mut normalized = ApiError::new(message).with_code(code);
                normalized.status = status;
                normalized.details = body;
                normalized
            }
            other => {
                let mut normalized = ApiError::new(other.to_string()).with_code(category.to_string());
                normalized.status = status;
                normalized
            }
        }
    }
}

/// Pull a human-readable message out of a backend error body.
///
/// Prefers `message`, then `error` (string or `{message}` object).
pub(crate) fn backend_message(body: &serde_json::Value) -> Option<String> {
    let non_empty = |v: &serde_json::Value| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    if let Some(message) = body.get("message").and_then(non_empty) {
        return Some(message);
    }
    match body.get("error")? {
        serde_json::Value::Object(inner) => inner.get("message").and_then(non_empty),
        other => non_empty(other),
    }
}
