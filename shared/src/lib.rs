//! # Shared Module for the Chat Token Service
//!
//! This crate provides common configuration, errors, constants and
//! types used by the token service.
//!
//! ## Tokens
//!
//! - **App token**: application-level (administrative) access to the chat backend
//! - **User token**: access for a single end user under the stable identifier
//!   the user directory assigned to them

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use config::*;
pub use constants::*;
pub use error::*;
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
