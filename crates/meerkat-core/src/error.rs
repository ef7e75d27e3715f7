//! Error taxonomy surfaced to automation callers.
//!
//! Every variant maps to one HTTP status and renders into the uniform
//! `{ "success": false, "error": ... }` envelope. Database failures only ever
//! enter this type through [`GatewayError::unexpected`], which sanitizes them.

use crate::sanitize::sanitize_error;
use serde_json::{Map, Value, json};
use std::fmt::Display;
use thiserror::Error;

/// Extra machine-readable fields attached to an error envelope,
/// e.g. `("allowed_types", [...])`.
pub type Hint = (&'static str, Value);

/// Errors returned by the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing, unconfigured or mismatched API key.
    #[error("Authentication failed")]
    Auth,

    /// Missing, unparsable or stale request timestamp.
    #[error("Invalid or expired request")]
    Replay,

    /// A caller-supplied identifier, type or field failed validation.
    #[error("{message}")]
    Validation { message: String, hint: Option<Hint> },

    /// The request could not be routed (missing or unknown action).
    #[error("{message}")]
    BadRequest { message: String, hint: Option<Hint> },

    /// A referenced table or column does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The table already exists.
    #[error("{0}")]
    Conflict(String),

    /// A required server-side secret or connection string is missing.
    /// The detail is logged, never returned.
    #[error("Configuration error")]
    Configuration(String),

    /// Anything else. The message is already sanitized.
    #[error("{0}")]
    Unexpected(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation {
            message: message.into(),
            hint: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, key: &'static str, value: Value) -> Self {
        GatewayError::Validation {
            message: message.into(),
            hint: Some((key, value)),
        }
    }

    pub fn bad_request(message: impl Into<String>, hint: Option<Hint>) -> Self {
        GatewayError::BadRequest {
            message: message.into(),
            hint,
        }
    }

    /// Wrap an arbitrary failure, redacting connection strings, addresses and
    /// credentials from its message.
    pub fn unexpected(err: impl Display) -> Self {
        GatewayError::Unexpected(sanitize_error(&err.to_string()))
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Auth | GatewayError::Replay => 401,
            GatewayError::Validation { .. } | GatewayError::BadRequest { .. } => 400,
            GatewayError::NotFound(_) => 404,
            GatewayError::Conflict(_) => 409,
            GatewayError::Configuration(_) | GatewayError::Unexpected(_) => 500,
        }
    }

    /// Stable name of the error class, used in logs and audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Auth => "AuthError",
            GatewayError::Replay => "ReplayError",
            GatewayError::Validation { .. } => "ValidationError",
            GatewayError::BadRequest { .. } => "BadRequestError",
            GatewayError::NotFound(_) => "NotFoundError",
            GatewayError::Conflict(_) => "ConflictError",
            GatewayError::Configuration(_) => "ConfigurationError",
            GatewayError::Unexpected(_) => "UnexpectedError",
        }
    }

    /// JSON envelope returned to the caller.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("success".to_string(), json!(false));
        body.insert("error".to_string(), json!(self.to_string()));
        if let GatewayError::Validation {
            hint: Some((key, value)),
            ..
        }
        | GatewayError::BadRequest {
            hint: Some((key, value)),
            ..
        } = self
        {
            body.insert((*key).to_string(), value.clone());
        }
        Value::Object(body)
    }
}
