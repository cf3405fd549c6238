//! # Token Issuance
//!
//! Caller-facing operations: issue an app token, issue a user token, and
//! resolve (or register) the chat user a user token is minted for.
//!
//! ## User Token Flow
//!
//! ```text
//! validate -> lookup -> found ----------------> sign
//!                    -> absent -> register ---> sign
//! ```
//!
//! Preconditions are checked in a fixed order (credentials, app key,
//! username) before any directory or signer call. Lookup strictly precedes
//! registration, and both precede signing.
//!
//! Lookup and registration are not atomic: two first requests for the same
//! new username can both see "absent" and both try to register. The loser
//! gets `UserAlreadyExists` from the directory and reads the winner's
//! identifier back with one more lookup.

use std::sync::Arc;
use tracing::{debug, info, warn};

use shared::{
    config::{has_text, ChatTokenConfig, Credentials, DirectoryConfig},
    constants::{MSG_USERNAME_MISSING, PLACEHOLDER_PASSWORD},
    error::{TokenError, TokenResult},
    types::ChatUserIdentity,
};

use crate::cache::AppTokenCache;
use crate::directory::{HttpUserDirectory, UserDirectory};
use crate::signer::{ChatTokenBuilder, TokenSigner};

/// Orchestrates signing, caching and the user directory
pub struct TokenIssuanceService {
    credentials: Credentials,
    token_ttl_secs: u32,
    directory_config: DirectoryConfig,
    signer: Arc<dyn TokenSigner>,
    directory: Arc<dyn UserDirectory>,
    app_tokens: Arc<AppTokenCache>,
}

impl TokenIssuanceService {
    /// Create a service from explicit collaborators
    pub fn new(
        config: &ChatTokenConfig,
        signer: Arc<dyn TokenSigner>,
        directory: Arc<dyn UserDirectory>,
        app_tokens: Arc<AppTokenCache>,
    ) -> Self {
        Self {
            credentials: config.credentials.clone(),
            token_ttl_secs: config.token_ttl_secs,
            directory_config: config.directory.clone(),
            signer,
            directory,
            app_tokens,
        }
    }

    /// Wire the production signer, cache and HTTP directory client
    pub fn from_config(config: &ChatTokenConfig) -> TokenResult<Self> {
        let signer: Arc<dyn TokenSigner> = Arc::new(ChatTokenBuilder::new());
        let app_tokens = Arc::new(AppTokenCache::new(
            Arc::clone(&signer),
            config.credentials.clone(),
            config.token_ttl_secs,
        ));
        let directory: Arc<dyn UserDirectory> = Arc::new(HttpUserDirectory::new(
            &config.directory,
            Arc::clone(&app_tokens),
        )?);

        Ok(Self::new(config, signer, directory, app_tokens))
    }

    /// Validity of issued tokens in seconds
    pub fn token_ttl_secs(&self) -> u32 {
        self.token_ttl_secs
    }

    /// The app token cache used for directory authentication
    pub fn app_token_cache(&self) -> &AppTokenCache {
        &self.app_tokens
    }

    // =========================================================================
    // APP TOKENS
    // =========================================================================

    /// Sign a fresh app token.
    ///
    /// Always signs; the cache is reserved for directory authentication and
    /// [`cached_app_token`](Self::cached_app_token).
    pub fn issue_app_token(&self) -> TokenResult<String> {
        self.credentials.ensure_present()?;

        info!("Issuing app token");
        self.signer
            .build_app_token(&self.credentials, self.token_ttl_secs)
    }

    /// The current cached app token, signed on miss
    pub async fn cached_app_token(&self) -> TokenResult<String> {
        self.app_tokens.get().await
    }

    // =========================================================================
    // USER TOKENS
    // =========================================================================

    /// Resolve or register `username`, then sign a user token for it
    pub async fn issue_user_token(&self, username: &str) -> TokenResult<String> {
        self.validate_user_request(username)?;

        let identity = self.resolve_user(username).await?;

        info!(username = %identity.username, uuid = %identity.uuid, "Issuing user token");
        self.signer
            .build_user_token(&self.credentials, &identity.uuid, self.token_ttl_secs)
    }

    /// Find `username` in the directory, registering it when absent.
    ///
    /// Registration failures are fatal. Lookup failures count as absence
    /// unless the configured policy says otherwise.
    pub async fn resolve_or_create_user(&self, username: &str) -> TokenResult<ChatUserIdentity> {
        self.validate_user_request(username)?;
        self.resolve_user(username).await
    }

    fn validate_user_request(&self, username: &str) -> TokenResult<()> {
        self.credentials.ensure_present()?;
        self.directory_config.directory_key()?;

        if !has_text(username) {
            return Err(TokenError::ValidationError(MSG_USERNAME_MISSING.into()));
        }

        Ok(())
    }

    async fn resolve_user(&self, username: &str) -> TokenResult<ChatUserIdentity> {
        let policy = self.directory_config.lookup_failure_policy;

        if let Some(uuid) = self.directory.find(username, policy).await? {
            debug!(username = %username, uuid = %uuid, "Chat user found");
            return Ok(ChatUserIdentity::new(username, uuid));
        }

        match self.directory.create(username, PLACEHOLDER_PASSWORD).await {
            Ok(uuid) => Ok(ChatUserIdentity::new(username, uuid)),
            Err(err @ TokenError::UserAlreadyExists(_)) => {
                warn!(username = %username, "Chat user registered concurrently, looking it up again");
                match self.directory.find(username, policy).await? {
                    Some(uuid) => Ok(ChatUserIdentity::new(username, uuid)),
                    None => Err(err),
                }
            }
            Err(err) => {
                warn!(username = %username, error = %err, "Chat user registration failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemoryDirectory, RecordingSigner};
    use shared::config::LookupFailurePolicy;
    use shared::constants::*;
    use std::sync::atomic::Ordering;

    fn config(app_id: &str, app_cert: &str, app_key: &str) -> ChatTokenConfig {
        ChatTokenConfig {
            credentials: Credentials::new(app_id, app_cert),
            token_ttl_secs: 3600,
            directory: DirectoryConfig {
                app_key: app_key.into(),
                host: "directory.local".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn service(
        config: &ChatTokenConfig,
        signer: &Arc<RecordingSigner>,
        directory: &Arc<MemoryDirectory>,
    ) -> TokenIssuanceService {
        let signer_dyn: Arc<dyn TokenSigner> = signer.clone();
        let app_tokens = Arc::new(AppTokenCache::new(
            Arc::clone(&signer_dyn),
            config.credentials.clone(),
            config.token_ttl_secs,
        ));
        TokenIssuanceService::new(config, signer_dyn, directory.clone(), app_tokens)
    }

    #[tokio::test]
    async fn test_user_token_registers_unknown_user() {
        let config = config("A", "B", "org1#app1");
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new().assign("bob", "u-42"));
        let service = service(&config, &signer, &directory);

        let token = service.issue_user_token("bob").await.unwrap();

        assert_eq!(directory.lookups(), 1);
        assert_eq!(directory.creates(), vec![("bob".to_string(), "123".to_string())]);
        assert_eq!(signer.user_calls(), vec![("u-42".to_string(), 3600)]);
        assert_eq!(token, "user-token:u-42:3600");
    }

    #[tokio::test]
    async fn test_user_token_for_existing_user() {
        let config = config("A", "B", "org1#app1");
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new().with_user("alice", "u-1"));
        let service = service(&config, &signer, &directory);

        assert_eq!(
            service.issue_user_token("alice").await.unwrap(),
            "user-token:u-1:3600"
        );
        assert!(directory.creates().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let config = config("A", "B", "org1#app1");
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new());
        let service = service(&config, &signer, &directory);

        let first = service.resolve_or_create_user("alice").await.unwrap();
        let second = service.resolve_or_create_user("alice").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.username, "alice");
        assert_eq!(directory.creates().len(), 1);
        assert_eq!(directory.lookups(), 2);
    }

    #[tokio::test]
    async fn test_credentials_checked_first() {
        let config = config("", "", "orgapp");
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new());
        let service = service(&config, &signer, &directory);

        let err = service.issue_user_token("").await.unwrap_err();
        assert_eq!(err.to_string(), MSG_CREDENTIALS_MISSING);
        assert!(matches!(err, TokenError::ConfigurationError(_)));
    }

    #[tokio::test]
    async fn test_validation_order() {
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new());

        let mut missing_host = config("A", "B", "org1#app1");
        missing_host.directory.host = String::new();
        let err = service(&missing_host, &signer, &directory)
            .issue_user_token("")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), MSG_DIRECTORY_MISSING);

        let err = service(&config("A", "B", "org1#app1"), &signer, &directory)
            .issue_user_token("   ")
            .await
            .unwrap_err();
        assert_eq!(err, TokenError::ValidationError(MSG_USERNAME_MISSING.into()));
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_app_key_makes_no_calls() {
        let config = config("A", "B", "orgapp");
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new());
        let service = service(&config, &signer, &directory);

        let err = service.issue_user_token("bob").await.unwrap_err();
        assert_eq!(err, TokenError::ValidationError(MSG_APP_KEY_ILLEGAL.into()));
        assert_eq!(directory.calls(), 0);
        assert!(signer.user_calls().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_falls_through_to_registration() {
        let config = config("A", "B", "org1#app1");
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new().assign("bob", "u-9"));
        directory.lookup_fails.store(true, Ordering::SeqCst);
        let service = service(&config, &signer, &directory);

        assert_eq!(
            service.issue_user_token("bob").await.unwrap(),
            "user-token:u-9:3600"
        );
        assert_eq!(directory.creates().len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_with_fail_policy() {
        let mut config = config("A", "B", "org1#app1");
        config.directory.lookup_failure_policy = LookupFailurePolicy::Fail;
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new());
        directory.lookup_fails.store(true, Ordering::SeqCst);
        let service = service(&config, &signer, &directory);

        assert!(matches!(
            service.issue_user_token("bob").await,
            Err(TokenError::UpstreamLookupFailure(_))
        ));
        assert!(directory.creates().is_empty());
    }

    #[tokio::test]
    async fn test_registration_failure_is_surfaced() {
        let config = config("A", "B", "org1#app1");
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new());
        directory.create_fails.store(true, Ordering::SeqCst);
        let service = service(&config, &signer, &directory);

        assert!(matches!(
            service.issue_user_token("bob").await,
            Err(TokenError::UpstreamCreateFailure(_))
        ));
        assert!(signer.user_calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_registration_reads_winner() {
        let config = config("A", "B", "org1#app1");
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new().with_user("bob", "u-winner"));
        directory.stale_lookups.store(1, Ordering::SeqCst);
        let service = service(&config, &signer, &directory);

        let identity = service.resolve_or_create_user("bob").await.unwrap();

        assert_eq!(identity.uuid, "u-winner");
        assert_eq!(directory.lookups(), 2);
        assert_eq!(directory.creates().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_without_readable_user_is_surfaced() {
        let config = config("A", "B", "org1#app1");
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new().with_user("bob", "u-winner"));
        directory.stale_lookups.store(2, Ordering::SeqCst);
        let service = service(&config, &signer, &directory);

        assert_eq!(
            service.resolve_or_create_user("bob").await.unwrap_err(),
            TokenError::UserAlreadyExists("bob".into())
        );
    }

    #[tokio::test]
    async fn test_signing_failure_is_surfaced() {
        let config = config("A", "B", "org1#app1");
        let signer = Arc::new(RecordingSigner::default());
        signer.fail.store(true, Ordering::SeqCst);
        let directory = Arc::new(MemoryDirectory::new().with_user("bob", "u-1"));
        let service = service(&config, &signer, &directory);

        assert!(matches!(
            service.issue_user_token("bob").await,
            Err(TokenError::SigningFailure(_))
        ));
        assert!(matches!(service.issue_app_token(), Err(TokenError::SigningFailure(_))));
    }

    #[tokio::test]
    async fn test_app_token_bypasses_cache() {
        let config = config("A", "B", "");
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new());
        let service = service(&config, &signer, &directory);

        assert_eq!(service.issue_app_token().unwrap(), "app-token-1");
        assert_eq!(service.issue_app_token().unwrap(), "app-token-2");
        assert_eq!(service.app_token_cache().stats().await.computations, 0);

        assert_eq!(service.cached_app_token().await.unwrap(), "app-token-3");
        assert_eq!(service.cached_app_token().await.unwrap(), "app-token-3");
        assert_eq!(signer.app_calls(), 3);
    }

    #[tokio::test]
    async fn test_app_token_requires_credentials() {
        let config = config("A", "", "org1#app1");
        let signer = Arc::new(RecordingSigner::default());
        let directory = Arc::new(MemoryDirectory::new());
        let service = service(&config, &signer, &directory);

        assert_eq!(
            service.issue_app_token().unwrap_err().to_string(),
            MSG_CREDENTIALS_MISSING
        );
        assert_eq!(signer.app_calls(), 0);
    }

    #[test]
    fn test_from_config_wires_http_directory() {
        let config = config("A", "B", "org1#app1");
        let service = TokenIssuanceService::from_config(&config).unwrap();
        assert_eq!(service.token_ttl_secs(), 3600);
    }
}
