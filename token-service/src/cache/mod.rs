//! # App Token Cache
//!
//! Holds at most one application token, valid for the configured token TTL
//! from the moment it was computed.
//!
//! Concurrent misses are collapsed into a single signer call: the slot is an
//! async mutex held across the computation, so late arrivals wait on the lock
//! and then take the outcome of that computation instead of signing again.
//! A failed outcome is only handed to callers that were already waiting when
//! it was produced; the next call after it starts from a clean miss.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use shared::{
    config::Credentials,
    error::{TokenError, TokenResult},
};

use crate::signer::TokenSigner;

/// The single cached entry
#[derive(Debug, Clone)]
struct CachedAppToken {
    value: String,
    computed_at: Instant,
}

impl CachedAppToken {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now < self.computed_at + ttl
    }
}

/// Guarded state: the token, and the failure of the latest computation
#[derive(Debug, Default)]
struct Slot {
    token: Option<CachedAppToken>,
    failure: Option<(u64, TokenError)>,
}

/// Single-entry, single-flight cache for the application token
pub struct AppTokenCache {
    signer: Arc<dyn TokenSigner>,
    credentials: Credentials,
    ttl_secs: u32,
    ttl: Duration,
    slot: Mutex<Slot>,
    /// Finished computations; read before locking to tell waiters from late callers
    outcomes: AtomicU64,
    hits: AtomicU64,
    computations: AtomicU64,
}

impl AppTokenCache {
    /// Create an empty cache.
    ///
    /// `ttl_secs` is used both as cache lifetime and as token validity.
    pub fn new(signer: Arc<dyn TokenSigner>, credentials: Credentials, ttl_secs: u32) -> Self {
        info!(ttl = ttl_secs, "Initializing app token cache");

        Self {
            signer,
            credentials,
            ttl_secs,
            ttl: Duration::from_secs(u64::from(ttl_secs)),
            slot: Mutex::new(Slot::default()),
            outcomes: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            computations: AtomicU64::new(0),
        }
    }

    /// Return the cached token, signing a new one on miss or expiry
    pub async fn get(&self) -> TokenResult<String> {
        let seen = self.outcomes.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.token.as_ref() {
            if cached.is_fresh(self.ttl, Instant::now()) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(cached.value.clone());
            }
            debug!("Cached app token expired");
        }

        // A computation finished while we waited and failed: share its error.
        if let Some((outcome, err)) = slot.failure.as_ref() {
            if *outcome > seen {
                debug!("Sharing failure of concurrent app token computation");
                return Err(err.clone());
            }
        }

        self.credentials.ensure_present()?;

        let result = self.signer.build_app_token(&self.credentials, self.ttl_secs);
        let outcome = self.outcomes.fetch_add(1, Ordering::AcqRel) + 1;

        match result {
            Ok(value) => {
                self.computations.fetch_add(1, Ordering::Relaxed);
                slot.failure = None;
                slot.token = Some(CachedAppToken {
                    value: value.clone(),
                    computed_at: Instant::now(),
                });
                debug!("Cached new app token");
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "App token computation failed");
                slot.token = None;
                slot.failure = Some((outcome, err.clone()));
                Err(err)
            }
        }
    }

    /// Drop the cached token so the next call signs a fresh one
    pub async fn invalidate(&self) {
        info!("Invalidating cached app token");
        let mut slot = self.slot.lock().await;
        slot.token = None;
        slot.failure = None;
    }

    /// Get cache statistics
    pub async fn stats(&self) -> AppTokenCacheStats {
        let cached = self
            .slot
            .lock()
            .await
            .token
            .as_ref()
            .is_some_and(|c| c.is_fresh(self.ttl, Instant::now()));

        AppTokenCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            cached,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppTokenCacheStats {
    /// Reads served from the cached entry
    pub hits: u64,
    /// Successful signer calls
    pub computations: u64,
    /// Whether an unexpired token is held
    pub cached: bool,
}
