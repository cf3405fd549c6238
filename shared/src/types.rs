//! # Shared Data Types for the Chat Token Service
//!
//! Identity records, the user directory wire schema, and API payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// CHAT USER IDENTITY
// =============================================================================

/// A chat user as known to the upstream directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatUserIdentity {
    /// Caller-supplied username
    pub username: String,

    /// Stable identifier assigned by the directory, embedded in user tokens
    pub uuid: String,
}

impl ChatUserIdentity {
    /// Create a new ChatUserIdentity
    pub fn new(username: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            uuid: uuid.into(),
        }
    }
}

// =============================================================================
// USER DIRECTORY WIRE SCHEMA
// =============================================================================

/// Body of a user registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUserRequest {
    pub username: String,
    pub password: String,
}

/// Response envelope of the user resources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryResponse {
    /// Matching or created users; absent is the same as empty
    #[serde(default)]
    pub entities: Vec<DirectoryEntity>,
}

impl DirectoryResponse {
    /// Identifier of the first entity, if any
    pub fn first_uuid(&self) -> Option<&str> {
        self.entities.first().map(|e| e.uuid.as_str())
    }
}

/// A single user entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntity {
    /// Stable identifier
    pub uuid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated: Option<bool>,
}

/// Error body returned by the directory on rejected requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryErrorBody {
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub error_description: Option<String>,
}

// =============================================================================
// API PAYLOADS
// =============================================================================

/// Issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Opaque signed token
    pub token: String,

    /// When the token stops being valid
    pub expires_at: DateTime<Utc>,
}

/// Health check payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_response_parsing() {
        let body = r#"{"action":"get","entities":[{"uuid":"u-1","type":"user","username":"bob","activated":true}]}"#;
        let response: DirectoryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.first_uuid(), Some("u-1"));
        assert_eq!(response.entities[0].username.as_deref(), Some("bob"));
    }

    #[test]
    fn test_directory_response_without_entities() {
        let response: DirectoryResponse = serde_json::from_str(r#"{"action":"get"}"#).unwrap();
        assert!(response.first_uuid().is_none());
    }

    #[test]
    fn test_entity_without_uuid_is_rejected() {
        let body = r#"{"entities":[{"username":"bob"}]}"#;
        assert!(serde_json::from_str::<DirectoryResponse>(body).is_err());
    }
}
