//! # Error Types for the Chat Token Service
//!
//! This module defines all error types used throughout the system.
//! Validation and configuration messages are shown to callers verbatim,
//! so their `Display` output is the bare message.

use thiserror::Error;

/// Main error type for the entire system
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================

    /// Application id or certificate missing, or another startup setting is unusable
    #[error("{0}")]
    ConfigurationError(String),

    /// Environment variable present but not parseable
    #[error("Invalid value for environment variable {name}: {reason}")]
    InvalidEnvVar { name: String, reason: String },

    // =========================================================================
    // REQUEST VALIDATION
    // =========================================================================

    /// A request precondition failed (app key shape, username presence)
    #[error("{0}")]
    ValidationError(String),

    // =========================================================================
    // USER DIRECTORY ERRORS
    // =========================================================================

    /// Transport or protocol failure while looking a user up
    #[error("Failed to look up chat user: {0}")]
    UpstreamLookupFailure(String),

    /// Transport or protocol failure while registering a user
    #[error("Failed to register chat user: {0}")]
    UpstreamCreateFailure(String),

    /// The directory refused registration because the username is taken
    #[error("Chat user already exists: {0}")]
    UserAlreadyExists(String),

    // =========================================================================
    // SIGNING ERRORS
    // =========================================================================

    /// The token signer failed
    #[error("Failed to sign token: {0}")]
    SigningFailure(String),

    // =========================================================================
    // GENERIC ERRORS
    // =========================================================================

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type alias using TokenError
pub type TokenResult<T> = Result<T, TokenError>;

impl From<serde_json::Error> for TokenError {
    fn from(err: serde_json::Error) -> Self {
        TokenError::SerializationError(err.to_string())
    }
}

// =============================================================================
// ERROR CATEGORIES (for logging)
// =============================================================================

impl TokenError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TokenError::ConfigurationError(_) | TokenError::InvalidEnvVar { .. } => "config",

            TokenError::ValidationError(_) => "validation",

            TokenError::UpstreamLookupFailure(_)
            | TokenError::UpstreamCreateFailure(_)
            | TokenError::UserAlreadyExists(_) => "directory",

            TokenError::SigningFailure(_) => "signing",

            TokenError::SerializationError(_) => "internal",
        }
    }

    /// Check if the error is transient.
    ///
    /// Nothing in the service retries; this only informs callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TokenError::UpstreamLookupFailure(_) | TokenError::UpstreamCreateFailure(_)
        )
    }
}
