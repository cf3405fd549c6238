//! # Constants for the Chat Token Service
//!
//! This module contains all constants used throughout the system:
//! defaults, environment variable names, token encoding codes and the
//! human-readable messages surfaced to callers.

// =============================================================================
// TOKEN CONFIGURATION
// =============================================================================

/// Default validity of issued tokens (1 hour)
pub const DEFAULT_TOKEN_TTL_SECS: u32 = 60 * 60;

/// AccessToken2 version prefix
pub const ACCESS_TOKEN_VERSION: &str = "007";

/// Length of an application id / certificate in hex characters
pub const APP_CREDENTIAL_HEX_LEN: usize = 32;

/// Upper bound (inclusive) for the random salt mixed into the signing key
pub const TOKEN_SALT_MAX: u32 = 99_999_999;

/// Service type of the chat service inside an AccessToken2
pub const SERVICE_TYPE_CHAT: u16 = 5;

/// Chat privilege: user-level access
pub const PRIVILEGE_CHAT_USER: u16 = 1;

/// Chat privilege: application-level access
pub const PRIVILEGE_CHAT_APP: u16 = 2;

// =============================================================================
// USER DIRECTORY
// =============================================================================

/// Delimiter between organization and application in the app key
pub const APP_KEY_DELIMITER: char = '#';

/// Password assigned to users registered on demand
pub const PLACEHOLDER_PASSWORD: &str = "123";

/// Default timeout for directory requests (seconds)
pub const DEFAULT_DIRECTORY_TIMEOUT_SECS: u64 = 10;

/// Error code the directory returns when a username is already taken
pub const DIRECTORY_DUPLICATE_ERROR: &str = "duplicate_unique_property_exists";

// =============================================================================
// API CONFIGURATION
// =============================================================================

/// Default service port
pub const TOKEN_SERVICE_PORT: u16 = 8080;

// =============================================================================
// CALLER-FACING MESSAGES
// =============================================================================

/// Application id or certificate missing
pub const MSG_CREDENTIALS_MISSING: &str = "appid or appcert is not empty";

/// App key or directory host missing
pub const MSG_DIRECTORY_MISSING: &str = "appkey or domain is not empty";

/// App key not in `org#app` form
pub const MSG_APP_KEY_ILLEGAL: &str = "appkey is illegal";

/// Username missing
pub const MSG_USERNAME_MISSING: &str = "chatUserName is not empty";

// =============================================================================
// ENVIRONMENT VARIABLE NAMES
// =============================================================================

/// Application id
pub const ENV_APP_ID: &str = "CHAT_APP_ID";

/// Application certificate (secret)
pub const ENV_APP_CERTIFICATE: &str = "CHAT_APP_CERTIFICATE";

/// Token validity in seconds
pub const ENV_TOKEN_EXPIRE_SECS: &str = "CHAT_TOKEN_EXPIRE_SECS";

/// App key in `org#app` form
pub const ENV_APP_KEY: &str = "CHAT_APP_KEY";

/// User directory host
pub const ENV_DOMAIN: &str = "CHAT_DOMAIN";

/// Directory request timeout in seconds
pub const ENV_DIRECTORY_TIMEOUT_SECS: &str = "CHAT_DIRECTORY_TIMEOUT_SECS";

/// How lookup failures are handled (`absent` or `fail`)
pub const ENV_LOOKUP_FAILURE_POLICY: &str = "CHAT_LOOKUP_FAILURE_POLICY";

/// Host the API binds to
pub const ENV_API_HOST: &str = "CHAT_API_HOST";

/// Port the API listens on
pub const ENV_API_PORT: &str = "CHAT_API_PORT";

/// Whether permissive CORS is enabled
pub const ENV_API_CORS: &str = "CHAT_API_CORS";
