//! # User Directory Client
//!
//! Resolves chat usernames to the stable identifiers assigned by the
//! upstream user directory, registering users on demand.
//!
//! ## Endpoints
//!
//! - `GET  http://{host}/{org}/{app}/users/{username}` - look a user up
//! - `POST http://{host}/{org}/{app}/users` - register a user
//!
//! Both calls carry the cached app token as bearer credential.

use async_trait::async_trait;
use reqwest::{header::ACCEPT, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use shared::{
    config::{DirectoryConfig, LookupFailurePolicy},
    constants::DIRECTORY_DUPLICATE_ERROR,
    error::{TokenError, TokenResult},
    types::{DirectoryErrorBody, DirectoryResponse, DirectoryUserRequest},
};

use crate::cache::AppTokenCache;

/// Upstream user directory
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look a user up.
    ///
    /// `Ok(None)` means the directory reported no match. Transport and
    /// protocol failures are `UpstreamLookupFailure`.
    async fn lookup(&self, username: &str) -> TokenResult<Option<String>>;

    /// Register a user and return its identifier
    async fn create(&self, username: &str, password: &str) -> TokenResult<String>;

    /// Look a user up, applying the lookup failure policy.
    ///
    /// Under [`LookupFailurePolicy::TreatAsAbsent`] an `UpstreamLookupFailure`
    /// becomes `Ok(None)`. Other errors (for instance an unavailable app
    /// token) always propagate.
    async fn find(&self, username: &str, policy: LookupFailurePolicy) -> TokenResult<Option<String>> {
        match self.lookup(username).await {
            Err(TokenError::UpstreamLookupFailure(reason))
                if policy == LookupFailurePolicy::TreatAsAbsent =>
            {
                warn!(
                    username = %username,
                    reason = %reason,
                    "Chat user lookup failed, treating user as absent"
                );
                Ok(None)
            }
            other => other,
        }
    }
}

/// HTTP client for the user directory
pub struct HttpUserDirectory {
    config: DirectoryConfig,
    app_tokens: Arc<AppTokenCache>,
    http_client: reqwest::Client,
}

impl HttpUserDirectory {
    /// Create a new HttpUserDirectory
    pub fn new(config: &DirectoryConfig, app_tokens: Arc<AppTokenCache>) -> TokenResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TokenError::ConfigurationError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config: config.clone(),
            app_tokens,
            http_client,
        })
    }

    fn users_url(&self) -> TokenResult<String> {
        Ok(format!("{}/users", self.config.base_url()?))
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn lookup(&self, username: &str) -> TokenResult<Option<String>> {
        let url = format!("{}/{}", self.users_url()?, urlencoding::encode(username));
        let token = self.app_tokens.get().await?;

        debug!(username = %username, "Looking up chat user");

        let response = self
            .http_client
            .get(&url)
            .header(ACCEPT, "application/json")
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| TokenError::UpstreamLookupFailure(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(username = %username, "Chat user not found");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::UpstreamLookupFailure(format!(
                "directory returned {status}: {body}"
            )));
        }

        let body: DirectoryResponse = response
            .json()
            .await
            .map_err(|e| TokenError::UpstreamLookupFailure(format!("unexpected response: {e}")))?;

        Ok(body.first_uuid().map(str::to_string))
    }

    async fn create(&self, username: &str, password: &str) -> TokenResult<String> {
        let url = self.users_url()?;
        let token = self.app_tokens.get().await?;

        let request = DirectoryUserRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = self
            .http_client
            .post(&url)
            .header(ACCEPT, "application/json")
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| TokenError::UpstreamCreateFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_duplicate(status, &body) {
                return Err(TokenError::UserAlreadyExists(username.to_string()));
            }
            return Err(TokenError::UpstreamCreateFailure(format!(
                "directory returned {status}: {body}"
            )));
        }

        let body: DirectoryResponse = response
            .json()
            .await
            .map_err(|e| TokenError::UpstreamCreateFailure(format!("unexpected response: {e}")))?;

        let uuid = body.first_uuid().ok_or_else(|| {
            TokenError::UpstreamCreateFailure("directory returned no entities".into())
        })?;

        info!(username = %username, uuid = %uuid, "Chat user registered");
        Ok(uuid.to_string())
    }
}

/// Whether a rejected registration means the username is taken
fn is_duplicate(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::CONFLICT {
        return true;
    }
    status == StatusCode::BAD_REQUEST
        && serde_json::from_str::<DirectoryErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .is_some_and(|code| code == DIRECTORY_DUPLICATE_ERROR)
}
