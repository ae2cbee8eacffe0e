//! Application error types with proper error chaining.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures surfaced by a wallet provider or the facade in front of it.
///
/// Provider messages are carried verbatim so the display layer can show
/// them as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("provider not initialized yet")]
    NotConnected,
    #[error("{message}")]
    ProviderRejected {
        message: String,
        cause: Option<String>,
    },
    #[error("{0}")]
    InsufficientFunds(String),
    #[error("{0}")]
    InvalidRequest(String),
}

/// Serializable discriminant of [`RpcError`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RpcErrorKind {
    NotConnected,
    ProviderRejected,
    InsufficientFunds,
    InvalidRequest,
}

impl RpcError {
    /// Provider rejection without further context.
    pub fn rejected(message: impl Into<String>) -> Self {
        RpcError::ProviderRejected {
            message: message.into(),
            cause: None,
        }
    }

    /// Provider rejection carrying the underlying cause.
    pub fn rejected_with_cause(message: impl Into<String>, cause: impl ToString) -> Self {
        RpcError::ProviderRejected {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> RpcErrorKind {
        match self {
            RpcError::NotConnected => RpcErrorKind::NotConnected,
            RpcError::ProviderRejected { .. } => RpcErrorKind::ProviderRejected,
            RpcError::InsufficientFunds(_) => RpcErrorKind::InsufficientFunds,
            RpcError::InvalidRequest(_) => RpcErrorKind::InvalidRequest,
        }
    }

    #[must_use]
    pub fn cause(&self) -> Option<&str> {
        match self {
            RpcError::ProviderRejected { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}

impl RpcErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcErrorKind::NotConnected => "not_connected",
            RpcErrorKind::ProviderRejected => "provider_rejected",
            RpcErrorKind::InsufficientFunds => "insufficient_funds",
            RpcErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },
    #[error("Validation failed: {0}")]
    Multiple(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(ValidationError::Multiple(err.to_string()))
    }
}
