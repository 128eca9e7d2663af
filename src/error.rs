//! Crate-wide error taxonomy (§7).
//!
//! Component-level errors are small plain enums in the teacher's style
//! (see `services::order::OrderError`, `payments::gateway::GatewayError`)
//! and convert into `AppError` at the service boundary, which the HTTP
//! layer renders into the `{success, error: {code, message, details}}`
//! envelope of §6.

use serde_json::Value;
use thiserror::Error;

/// The six-way taxonomy of §7.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },
    #[error("{message}")]
    State {
        message: String,
        details: Option<Value>,
    },
    #[error("{message}")]
    NotFound {
        message: String,
        details: Option<Value>,
    },
    #[error("{message}")]
    Forbidden {
        message: String,
        details: Option<Value>,
    },
    #[error("{message}")]
    Contention {
        message: String,
        details: Option<Value>,
    },
    #[error("{message}")]
    Internal {
        message: String,
        details: Option<Value>,
    },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            details: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            details: None,
        }
    }

    pub fn contention(message: impl Into<String>) -> Self {
        Self::Contention {
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(self, details: Value) -> Self {
        match self {
            Self::Validation { message, .. } => Self::Validation {
                message,
                details: Some(details),
            },
            Self::State { message, .. } => Self::State {
                message,
                details: Some(details),
            },
            Self::NotFound { message, .. } => Self::NotFound {
                message,
                details: Some(details),
            },
            Self::Forbidden { message, .. } => Self::Forbidden {
                message,
                details: Some(details),
            },
            Self::Contention { message, .. } => Self::Contention {
                message,
                details: Some(details),
            },
            Self::Internal { message, .. } => Self::Internal {
                message,
                details: Some(details),
            },
        }
    }

    /// Stable machine-readable error code for the `{error: {code, ...}}`
    /// envelope field (§6).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::State { .. } => "invalid_state",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::Contention { .. } => "busy",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// HTTP status derivation per §6.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } | Self::State { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Forbidden { .. } => 403,
            Self::Contention { .. } => 409,
            Self::Internal { .. } => 500,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Validation { details, .. }
            | Self::State { details, .. }
            | Self::NotFound { details, .. }
            | Self::Forbidden { details, .. }
            | Self::Contention { details, .. }
            | Self::Internal { details, .. } => details.as_ref(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
