//! # Configuration for the Chat Token Service
//!
//! This module handles configuration loading and validation. Configuration
//! is read once from environment variables at startup and is immutable
//! afterwards; the service receives it as a value.

use crate::constants::*;
use crate::error::{TokenError, TokenResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Application credentials used to sign every token
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// Application identifier
    pub app_id: String,

    /// Application certificate (secret)
    #[serde(skip_serializing)]
    pub app_certificate: String,
}

impl Credentials {
    /// Create credentials from an id and certificate
    pub fn new(app_id: impl Into<String>, app_certificate: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_certificate: app_certificate.into(),
        }
    }

    /// Fail with a configuration error unless both fields carry text
    pub fn ensure_present(&self) -> TokenResult<()> {
        if !has_text(&self.app_id) || !has_text(&self.app_certificate) {
            return Err(TokenError::ConfigurationError(MSG_CREDENTIALS_MISSING.into()));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_certificate", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// DIRECTORY KEY
// =============================================================================

/// Organization/application pair identifying the directory tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryKey {
    pub organization: String,
    pub application: String,
}

impl DirectoryKey {
    /// Parse an `org#app` key.
    ///
    /// The delimiter must appear exactly once with text on both sides.
    pub fn parse(raw: &str) -> TokenResult<Self> {
        let illegal = || TokenError::ValidationError(MSG_APP_KEY_ILLEGAL.into());

        let (organization, application) = raw.split_once(APP_KEY_DELIMITER).ok_or_else(illegal)?;
        if application.contains(APP_KEY_DELIMITER)
            || !has_text(organization)
            || !has_text(application)
        {
            return Err(illegal());
        }

        Ok(Self {
            organization: organization.to_string(),
            application: application.to_string(),
        })
    }
}

impl fmt::Display for DirectoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.organization, APP_KEY_DELIMITER, self.application)
    }
}

// =============================================================================
// DIRECTORY CONFIGURATION
// =============================================================================

/// What to do when a user lookup fails in transport or protocol
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LookupFailurePolicy {
    /// Treat the failure as "user not found" and go on to register
    #[default]
    TreatAsAbsent,
    /// Surface the failure to the caller
    Fail,
}

impl FromStr for LookupFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "absent" | "treat_as_absent" => Ok(LookupFailurePolicy::TreatAsAbsent),
            "fail" => Ok(LookupFailurePolicy::Fail),
            other => Err(format!("unknown lookup failure policy '{other}'")),
        }
    }
}

/// Upstream user directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// App key in `org#app` form
    pub app_key: String,

    /// Directory host (and optional port)
    pub host: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Lookup failure handling
    pub lookup_failure_policy: LookupFailurePolicy,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            host: String::new(),
            request_timeout_secs: DEFAULT_DIRECTORY_TIMEOUT_SECS,
            lookup_failure_policy: LookupFailurePolicy::default(),
        }
    }
}

impl DirectoryConfig {
    /// Check presence and shape of the app key and host
    pub fn directory_key(&self) -> TokenResult<DirectoryKey> {
        if !has_text(&self.app_key) || !has_text(&self.host) {
            return Err(TokenError::ValidationError(MSG_DIRECTORY_MISSING.into()));
        }
        DirectoryKey::parse(&self.app_key)
    }

    /// Base URL of the tenant's directory resources
    pub fn base_url(&self) -> TokenResult<String> {
        let key = self.directory_key()?;
        Ok(format!(
            "http://{}/{}/{}",
            self.host, key.organization, key.application
        ))
    }
}

// =============================================================================
// API CONFIGURATION
// =============================================================================

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: TOKEN_SERVICE_PORT,
            enable_cors: true,
        }
    }
}

impl ApiConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// SERVICE CONFIGURATION
// =============================================================================

/// Configuration for the token service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTokenConfig {
    /// Signing credentials
    pub credentials: Credentials,

    /// Validity of issued tokens, also the app token cache TTL
    pub token_ttl_secs: u32,

    /// User directory configuration
    pub directory: DirectoryConfig,

    /// API server configuration
    pub api: ApiConfig,
}

impl Default for ChatTokenConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            directory: DirectoryConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl ChatTokenConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> TokenResult<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_vars<F>(lookup: F) -> TokenResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(app_id) = lookup(ENV_APP_ID) {
            config.credentials.app_id = app_id;
        }
        if let Some(app_certificate) = lookup(ENV_APP_CERTIFICATE) {
            config.credentials.app_certificate = app_certificate;
        }
        if let Some(ttl) = lookup(ENV_TOKEN_EXPIRE_SECS) {
            config.token_ttl_secs = parse_var(ENV_TOKEN_EXPIRE_SECS, &ttl)?;
        }

        // Directory
        if let Some(app_key) = lookup(ENV_APP_KEY) {
            config.directory.app_key = app_key;
        }
        if let Some(host) = lookup(ENV_DOMAIN) {
            config.directory.host = host;
        }
        if let Some(timeout) = lookup(ENV_DIRECTORY_TIMEOUT_SECS) {
            config.directory.request_timeout_secs = parse_var(ENV_DIRECTORY_TIMEOUT_SECS, &timeout)?;
        }
        if let Some(policy) = lookup(ENV_LOOKUP_FAILURE_POLICY) {
            config.directory.lookup_failure_policy = parse_var(ENV_LOOKUP_FAILURE_POLICY, &policy)?;
        }

        // API
        if let Some(host) = lookup(ENV_API_HOST) {
            config.api.host = host;
        }
        if let Some(port) = lookup(ENV_API_PORT) {
            config.api.port = parse_var(ENV_API_PORT, &port)?;
        }
        if let Some(cors) = lookup(ENV_API_CORS) {
            config.api.enable_cors = parse_var(ENV_API_CORS, &cors)?;
        }

        Ok(config)
    }

    /// Validate the settings every operation depends on
    pub fn validate(&self) -> TokenResult<()> {
        self.credentials.ensure_present()?;

        if self.token_ttl_secs == 0 {
            return Err(TokenError::ConfigurationError(
                "token expiry must be a positive number of seconds".into(),
            ));
        }

        if self.directory.request_timeout_secs == 0 {
            return Err(TokenError::InvalidEnvVar {
                name: ENV_DIRECTORY_TIMEOUT_SECS.into(),
                reason: "directory timeout must be a positive number of seconds".into(),
            });
        }

        Ok(())
    }

    /// Non-fatal problems worth logging at startup.
    ///
    /// A missing or malformed directory setting only disables user tokens.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Err(e) = self.directory.directory_key() {
            warnings.push(format!("user tokens unavailable: {e}"));
        }
        warnings
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// True when the string holds at least one non-whitespace character
pub fn has_text(value: &str) -> bool {
    !value.trim().is_empty()
}

fn parse_var<T>(name: &str, raw: &str) -> TokenResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| TokenError::InvalidEnvVar {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
