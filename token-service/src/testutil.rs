//! In-memory fakes for the signer and the user directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use shared::{
    config::Credentials,
    error::{TokenError, TokenResult},
};

use crate::directory::UserDirectory;
use crate::signer::TokenSigner;

/// Signer returning readable tokens and recording user-token requests
#[derive(Default)]
pub struct RecordingSigner {
    app_calls: AtomicU64,
    user_calls: Mutex<Vec<(String, u32)>>,
    pub fail: AtomicBool,
}

impl RecordingSigner {
    pub fn app_calls(&self) -> u64 {
        self.app_calls.load(Ordering::SeqCst)
    }

    /// `(uuid, expire_secs)` of every user token requested
    pub fn user_calls(&self) -> Vec<(String, u32)> {
        self.user_calls.lock().unwrap().clone()
    }
}

impl TokenSigner for RecordingSigner {
    fn build_app_token(&self, _credentials: &Credentials, _expire_secs: u32) -> TokenResult<String> {
        let n = self.app_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(TokenError::SigningFailure("signer down".into()));
        }
        Ok(format!("app-token-{n}"))
    }

    fn build_user_token(
        &self,
        _credentials: &Credentials,
        user_uuid: &str,
        expire_secs: u32,
    ) -> TokenResult<String> {
        self.user_calls
            .lock()
            .unwrap()
            .push((user_uuid.to_string(), expire_secs));
        if self.fail.load(Ordering::SeqCst) {
            return Err(TokenError::SigningFailure("signer down".into()));
        }
        Ok(format!("user-token:{user_uuid}:{expire_secs}"))
    }
}

/// Directory that persists registered users in memory
#[derive(Default)]
pub struct MemoryDirectory {
    users: Mutex<HashMap<String, String>>,
    assigned: Mutex<HashMap<String, String>>,
    creates: Mutex<Vec<(String, String)>>,
    lookups: AtomicUsize,
    next_id: AtomicU64,
    /// Number of upcoming lookups that report "absent" regardless of state
    pub stale_lookups: AtomicUsize,
    pub lookup_fails: AtomicBool,
    pub create_fails: AtomicBool,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `uuid` when `username` gets registered
    pub fn assign(self, username: &str, uuid: &str) -> Self {
        self.assigned
            .lock()
            .unwrap()
            .insert(username.to_string(), uuid.to_string());
        self
    }

    /// Seed an existing user
    pub fn with_user(self, username: &str, uuid: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(username.to_string(), uuid.to_string());
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// `(username, password)` of every registration attempt
    pub fn creates(&self) -> Vec<(String, String)> {
        self.creates.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.lookups() + self.creates().len()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn lookup(&self, username: &str) -> TokenResult<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.lookup_fails.load(Ordering::SeqCst) {
            return Err(TokenError::UpstreamLookupFailure("connection refused".into()));
        }
        let stale = self
            .stale_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(None);
        }
        Ok(self.users.lock().unwrap().get(username).cloned())
    }

    async fn create(&self, username: &str, password: &str) -> TokenResult<String> {
        self.creates
            .lock()
            .unwrap()
            .push((username.to_string(), password.to_string()));
        if self.create_fails.load(Ordering::SeqCst) {
            return Err(TokenError::UpstreamCreateFailure("directory returned 503".into()));
        }

        let mut users = self.users.lock().unwrap();
        if users.contains_key(username) {
            return Err(TokenError::UserAlreadyExists(username.to_string()));
        }
        let uuid = self
            .assigned
            .lock()
            .unwrap()
            .get(username)
            .cloned()
            .unwrap_or_else(|| format!("uuid-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1));
        users.insert(username.to_string(), uuid.clone());
        Ok(uuid)
    }
}
