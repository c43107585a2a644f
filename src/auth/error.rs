use thiserror::Error;

use crate::error::AutoPartError;

/// Errors raised by token persistence.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Unsupported token file version {0}")]
    UnsupportedVersion(u32),
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<AuthError> for AutoPartError {
    fn from(error: AuthError) -> Self {
        AutoPartError::Storage(error.to_string())
    }
}
