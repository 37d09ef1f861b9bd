//! Error types and handling for the PowerShades bridge
//!
//! This module defines the error types used throughout the crate. The
//! authentication kinds mirror the session protocol: each of them except
//! [`ShadesError::MissingRefreshToken`] has already been counted against the
//! auth failure streak by the time it reaches a caller.

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, ShadesError>;

/// Main error type for the bridge
#[derive(Debug, Error)]
pub enum ShadesError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Transport-level failures (connect, TLS, body read)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Authentication attempts are refused until the backoff window closes
    #[error("Authentication backoff active, retry in {retry_in_ms} ms")]
    AuthBackoffActive { retry_in_ms: u64 },

    /// Credential exchange failed against every base URL candidate
    #[error("Login failed: {message}")]
    LoginFailed { message: String },

    /// A refresh was requested while no refresh token is held
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// The refresh exchange was rejected or malformed
    #[error("Token refresh failed: {message}")]
    TokenRefreshFailed { message: String },

    /// A fresh login after a 401 did not succeed
    #[error("Re-login failed: {message}")]
    ReloginFailed { message: String },

    /// Non-success response from the remote API
    #[error("API error {status} on {path}: {body}")]
    Api {
        status: u16,
        path: String,
        body: String,
    },
}

impl ShadesError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ShadesError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ShadesError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ShadesError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        ShadesError::Network {
            message: message.into(),
        }
    }

    /// Create a new login failure
    pub fn login_failed<S: Into<String>>(message: S) -> Self {
        ShadesError::LoginFailed {
            message: message.into(),
        }
    }

    /// Create a new token refresh failure
    pub fn token_refresh_failed<S: Into<String>>(message: S) -> Self {
        ShadesError::TokenRefreshFailed {
            message: message.into(),
        }
    }

    /// Create a new re-login failure
    pub fn relogin_failed<S: Into<String>>(message: S) -> Self {
        ShadesError::ReloginFailed {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<P: Into<String>, B: Into<String>>(status: u16, path: P, body: B) -> Self {
        ShadesError::Api {
            status,
            path: path.into(),
            body: body.into(),
        }
    }

    /// Whether this error belongs to the authentication family
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ShadesError::AuthBackoffActive { .. }
                | ShadesError::LoginFailed { .. }
                | ShadesError::MissingRefreshToken
                | ShadesError::TokenRefreshFailed { .. }
                | ShadesError::ReloginFailed { .. }
        ) || self.status() == Some(401)
    }

    /// HTTP status carried by an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            ShadesError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ShadesError {
    fn from(err: std::io::Error) -> Self {
        ShadesError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ShadesError {
    fn from(err: serde_yaml::Error) -> Self {
        ShadesError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ShadesError {
    fn from(err: serde_json::Error) -> Self {
        ShadesError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ShadesError {
    fn from(err: reqwest::Error) -> Self {
        ShadesError::network(err.to_string())
    }
}
