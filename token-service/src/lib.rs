//! # Chat Token Service
//!
//! This service provides:
//! - Application tokens (administrative access to the chat backend)
//! - User tokens, minted for the stable identifier the user directory
//!   assigns to a username (registering the user on first use)
//! - A single-entry, single-flight cache for the app token that
//!   authenticates directory calls
//! - REST API exposing both token kinds

pub mod api;
pub mod cache;
pub mod directory;
pub mod issuance;
pub mod signer;

#[cfg(test)]
pub(crate) mod testutil;

use shared::config::ChatTokenConfig;

/// Application state shared across handlers
pub struct AppState {
    /// Configuration
    pub config: ChatTokenConfig,
    /// Token issuance
    pub issuer: issuance::TokenIssuanceService,
}
